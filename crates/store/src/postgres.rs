use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderItem, OrderItemId, OrderStatus, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{ReservationStore, ReservationTx, decrements_for};

/// PostgreSQL-backed reservation store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL reservation store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running reservation store migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Sets or replaces the available quantity for a product.
    pub async fn upsert_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_entries (product_id, quantity, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn quantity_from_db(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|_| StoreError::Invalid(format!("quantity out of range: {raw}")))
}

#[async_trait]
impl ReservationStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx, savepoints: 0 })
    }

    async fn read_quantity(&self, product_id: &ProductId) -> Result<Option<u32>> {
        let quantity: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM stock_entries WHERE product_id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        quantity.map(quantity_from_db).transpose()
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE stock_entries SET quantity = quantity + $2, updated_at = now() WHERE product_id = $1",
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StockConflict {
                product_id: product_id.clone(),
            });
        }
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, user_id, status, trace_token, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::Invalid(format!("unknown order status: {status_raw}")))?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, unit_price_cents, quantity, created_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status,
            items,
            trace_token: row.try_get("trace_token")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }
}

/// PostgreSQL reservation transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    savepoints: usize,
}

impl PostgresTx {
    async fn apply_order_inner(&mut self, order: &Order) -> Result<()> {
        for (product_id, quantity) in decrements_for(order) {
            let result = sqlx::query(
                r#"
                UPDATE stock_entries
                SET quantity = quantity - $2, updated_at = now()
                WHERE product_id = $1 AND quantity >= $2
                "#,
            )
            .bind(product_id.as_str())
            .bind(i64::from(quantity))
            .execute(&mut *self.tx)
            .await?;

            // The planner already validated against locked quantities, so
            // a miss here means the plan and the ledger diverged.
            if result.rows_affected() == 0 {
                return Err(StoreError::StockConflict { product_id });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, trace_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.trace_token)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, unit_price_cents, quantity, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(item.unit_price.cents())
            .bind(i64::from(item.quantity))
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ReservationTx for PostgresTx {
    async fn lock_quantities(&mut self, product_ids: &[ProductId]) -> Result<BTreeMap<ProductId, u32>> {
        if product_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        // Ascending product order is the global lock-acquisition order;
        // ORDER BY inside FOR UPDATE makes Postgres take the row locks in
        // that sequence.
        let mut ids: Vec<String> = product_ids.iter().map(|p| p.as_str().to_string()).collect();
        ids.sort();
        ids.dedup();

        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM stock_entries
            WHERE product_id = ANY($1)
            ORDER BY product_id ASC
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut quantities = BTreeMap::new();
        for row in rows {
            let product_id = ProductId::new(row.try_get::<String, _>("product_id")?);
            let quantity = quantity_from_db(row.try_get("quantity")?)?;
            quantities.insert(product_id, quantity);
        }
        Ok(quantities)
    }

    async fn apply_order(&mut self, order: &Order) -> Result<()> {
        self.savepoints += 1;
        let name = format!("order_apply_{}", self.savepoints);

        sqlx::query(&format!("SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;

        match self.apply_order_inner(order).await {
            Ok(()) => {
                sqlx::query(&format!("RELEASE SAVEPOINT {name}"))
                    .execute(&mut *self.tx)
                    .await?;
                Ok(())
            }
            Err(err) => {
                // Scope the failure to this order; the transaction stays
                // usable for the rest of the batch.
                sqlx::query(&format!("ROLLBACK TO SAVEPOINT {name}"))
                    .execute(&mut *self.tx)
                    .await?;
                Err(err)
            }
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
