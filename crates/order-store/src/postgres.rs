use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, OrderNumber, UserId};
use domain::{LineItemFields, Money, Order, OrderUpdate, PaymentMethod, ProductId, Sku};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderRepository, Result, StoreError};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_method, payment_status, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_line(row: &PgRow) -> Result<LineItemFields> {
        let quantity: i64 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::CorruptRow(format!("quantity out of range: {quantity}")))?;

        Ok(LineItemFields {
            product_id: ProductId::new(row.try_get("product_id")?),
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
            quantity,
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<LineItemFields>) -> Result<Order> {
        let payment_method = row
            .try_get::<Option<String>, _>("payment_method")?
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()?;

        let order = Order::restore(
            OrderId::new(row.try_get("id")?),
            OrderNumber::from_uuid(row.try_get::<Uuid, _>("order_number")?),
            row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
            row.try_get::<String, _>("status")?.parse()?,
            payment_method,
            row.try_get::<String, _>("payment_status")?.parse()?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
            lines,
        )?;

        Ok(order)
    }

    /// Loads the line items of the given orders, grouped by order id.
    async fn load_lines<'e, E>(
        executor: E,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<LineItemFields>>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, sku, unit_price, quantity
            FROM order_line_items
            WHERE order_id = ANY($1)
            ORDER BY order_id ASC, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(executor)
        .await?;

        let mut lines: HashMap<i64, Vec<LineItemFields>> = HashMap::new();
        for row in &rows {
            let order_id: i64 = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }
        Ok(lines)
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = Self::load_lines(&self.pool, &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn find_one_locked(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
    ) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => {
                let mut lines = Self::load_lines(&mut **tx, &[id.as_i64()]).await?;
                let order =
                    Self::row_to_order(&row, lines.remove(&id.as_i64()).unwrap_or_default())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, order: Order) -> Result<Order> {
        let order_number = order.order_number();

        // Order row and line rows commit together or not at all
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_number, user_id, status, total_amount, payment_method, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(order_number.as_uuid())
        .bind(order.user_id().map(|u| u.as_i64()))
        .bind(order.status().as_str())
        .bind(order.total_amount().amount())
        .bind(order.payment_method().map(|m| m.as_str()))
        .bind(order.payment_status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::DuplicateOrderNumber(order_number);
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_line_items (order_id, position, product_id, sku, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(item.fields().product_id.as_i64())
            .bind(item.sku().as_str())
            .bind(item.unit_price().amount())
            .bind(i64::from(item.quantity()))
            .bind(item.line_total().amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order.with_id(OrderId::new(id)))
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.hydrate(rows).await?.pop())
    }

    async fn find_by_order_number(&self, order_number: OrderNumber) -> Result<Option<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.hydrate(rows).await?.pop())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    async fn update(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = Self::find_one_locked(&mut tx, id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;
        order.apply_update(&update, Utc::now());

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_method = $3, payment_status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(order.status().as_str())
        .bind(order.payment_method().map(|m| m.as_str()))
        .bind(order.payment_status().as_str())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        // Line items go with the order through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }
}
