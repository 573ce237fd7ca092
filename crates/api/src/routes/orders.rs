//! Order submission endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{ItemDraft, Money, Order, OrderRequest, UserId};
use engine::{EngineHandle, submit_and_collect};
use serde::{Deserialize, Serialize};
use store::StockCache;

use crate::error::{ApiError, submit_error_status};

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub stock: StockCache,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SubmitOrdersRequest {
    pub orders: Vec<OrderDraftRequest>,
}

#[derive(Deserialize)]
pub struct OrderDraftRequest {
    pub user_id: Option<String>,
    pub trace_token: Option<String>,
    pub items: Vec<ItemRequest>,
}

#[derive(Deserialize)]
pub struct ItemRequest {
    pub product_id: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderOutcomeResponse {
    /// Position of the order in the submitted list.
    pub index: usize,
    pub order_id: Option<String>,
    /// HTTP-style status for this order alone.
    pub status: u16,
    pub order: Option<OrderResponse>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub items: Vec<ItemResponse>,
    pub total_cents: i64,
    pub trace_token: Option<String>,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub product_id: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            items: order
                .items
                .iter()
                .map(|item| ItemResponse {
                    product_id: item.product_id.to_string(),
                    unit_price_cents: item.unit_price.cents(),
                    quantity: item.quantity,
                })
                .collect(),
            total_cents: order.total_amount().cents(),
            trace_token: order.trace_token.clone(),
        }
    }
}

// -- Handlers --

/// POST /orders — submit one or more orders and wait for their outcomes.
///
/// Orders succeed or fail independently; the response carries one entry
/// per submitted order, in submission order. The overall status is 201
/// only when every order was accepted.
#[tracing::instrument(skip(state, req), fields(orders = req.orders.len()))]
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitOrdersRequest>,
) -> Result<(StatusCode, Json<Vec<OrderOutcomeResponse>>), ApiError> {
    if req.orders.is_empty() {
        return Err(ApiError::BadRequest("no orders in submission".to_string()));
    }

    let mut responses: Vec<Option<OrderOutcomeResponse>> = Vec::new();
    responses.resize_with(req.orders.len(), || None);

    let mut built = Vec::new();
    let mut indices = Vec::new();
    for (index, draft) in req.orders.into_iter().enumerate() {
        match build_request(draft) {
            Ok((request, receiver)) => {
                indices.push((request.id, index));
                built.push((request, receiver));
            }
            Err(message) => {
                responses[index] = Some(OrderOutcomeResponse {
                    index,
                    order_id: None,
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    order: None,
                    error: Some(message),
                });
            }
        }
    }

    let mut results = submit_and_collect(&state.engine, built).await;
    for (order_id, index) in indices {
        let entry = match results.remove(&order_id) {
            Some(Ok(order)) => OrderOutcomeResponse {
                index,
                order_id: Some(order_id.to_string()),
                status: StatusCode::CREATED.as_u16(),
                order: Some(OrderResponse::from_order(&order)),
                error: None,
            },
            Some(Err(err)) => OrderOutcomeResponse {
                index,
                order_id: Some(order_id.to_string()),
                status: submit_error_status(&err).as_u16(),
                order: None,
                error: Some(err.to_string()),
            },
            None => OrderOutcomeResponse {
                index,
                order_id: Some(order_id.to_string()),
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                order: None,
                error: Some("no outcome collected".to_string()),
            },
        };
        responses[index] = Some(entry);
    }

    let responses: Vec<OrderOutcomeResponse> = responses.into_iter().flatten().collect();
    let all_created = responses
        .iter()
        .all(|entry| entry.status == StatusCode::CREATED.as_u16());
    let status = if all_created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(responses)))
}

fn build_request(
    draft: OrderDraftRequest,
) -> Result<(OrderRequest, domain::CompletionReceiver), String> {
    let user_id = match draft.user_id {
        Some(raw) => {
            let uuid =
                uuid::Uuid::parse_str(&raw).map_err(|e| format!("invalid user_id: {e}"))?;
            UserId::from_uuid(uuid)
        }
        None => UserId::new(),
    };

    let items = draft
        .items
        .into_iter()
        .map(|item| {
            ItemDraft::new(
                item.product_id,
                Money::from_cents(item.unit_price_cents),
                item.quantity,
            )
        })
        .collect();

    let (mut request, receiver) = OrderRequest::new(user_id, items).map_err(|e| e.to_string())?;
    if let Some(token) = draft.trace_token {
        request = request.with_trace_token(token);
    }
    Ok((request, receiver))
}
