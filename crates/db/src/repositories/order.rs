use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::debug;

use brickbot_core::domain::order::{Order, OrderId};
use brickbot_core::domain::slot::SlotName;
use brickbot_core::persistence::{OrderStore, StoreError};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let lego_model = required_value(order, SlotName::LegoModel)?;
        let lego_size = required_value(order, SlotName::LegoSize)?;

        let result = sqlx::query(
            "INSERT INTO lego_order (id, lego_model, lego_size, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&order.id.0)
        .bind(lego_model)
        .bind(lego_size)
        .bind(format_timestamp(&order.created_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate(order.id.0.clone()));
        }

        debug!(event_name = "db.order.inserted", order_id = %order.id, "order row written");
        Ok(())
    }
}

fn required_value(order: &Order, slot: SlotName) -> Result<&str, RepositoryError> {
    order
        .value(slot)
        .ok_or_else(|| RepositoryError::Decode(format!("order {} has no {slot} value", order.id)))
}

// Fixed-width UTC timestamps keep lexical and chronological order identical.
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let lego_model: String =
        row.try_get("lego_model").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let lego_size: String =
        row.try_get("lego_size").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at `{created_at_str}`: {e}")))?;

    let values =
        BTreeMap::from([(SlotName::LegoModel, lego_model), (SlotName::LegoSize, lego_size)]);

    Ok(Order { id: OrderId(id), values, created_at })
}

#[async_trait]
impl OrderStore for SqlOrderRepository {
    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        Ok(self.insert(order).await?)
    }
}

#[async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, lego_model, lego_size, created_at FROM lego_order WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lego_model, lego_size, created_at
             FROM lego_order
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};

    use brickbot_core::domain::order::{Order, OrderId};
    use brickbot_core::domain::slot::SlotName;
    use brickbot_core::persistence::OrderStore;

    use super::SqlOrderRepository;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_order(id: &str, model: &str, size: &str, minutes: i64) -> Order {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp");
        Order {
            id: OrderId(id.to_string()),
            values: BTreeMap::from([
                (SlotName::LegoModel, model.to_string()),
                (SlotName::LegoSize, size.to_string()),
            ]),
            created_at: base + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn put_and_find_by_id() {
        let repo = SqlOrderRepository::new(setup().await);
        let order = sample_order("ORD-1", "tank", "medium", 0);

        repo.put(&order).await.expect("put");
        let found = repo.find_by_id(&order.id).await.expect("find").expect("should exist");

        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let repo = SqlOrderRepository::new(setup().await);

        let found = repo.find_by_id(&OrderId("missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn put_never_overwrites_existing_order() {
        let repo = SqlOrderRepository::new(setup().await);
        repo.put(&sample_order("ORD-1", "tank", "medium", 0)).await.expect("first put");

        let error = repo
            .put(&sample_order("ORD-1", "ship", "large", 1))
            .await
            .expect_err("duplicate id should fail");
        assert!(error.0.contains("already exists"));

        let found = repo
            .find_by_id(&OrderId("ORD-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.value(SlotName::LegoModel), Some("tank"));
    }

    #[tokio::test]
    async fn put_rejects_order_without_size() {
        let repo = SqlOrderRepository::new(setup().await);
        let mut order = sample_order("ORD-1", "tank", "medium", 0);
        order.values.remove(&SlotName::LegoSize);

        let error = repo.put(&order).await.expect_err("size is required");
        assert!(error.0.contains("LegoSize"));
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first_with_limit() {
        let repo = SqlOrderRepository::new(setup().await);
        repo.put(&sample_order("ORD-1", "ship", "small", 0)).await.expect("put 1");
        repo.put(&sample_order("ORD-2", "tank", "medium", 5)).await.expect("put 2");
        repo.put(&sample_order("ORD-3", "rocket", "large", 10)).await.expect("put 3");

        let recent = repo.list_recent(2).await.expect("list");
        let ids: Vec<&str> = recent.iter().map(|order| order.id.0.as_str()).collect();

        assert_eq!(ids, vec!["ORD-3", "ORD-2"]);
    }
}
