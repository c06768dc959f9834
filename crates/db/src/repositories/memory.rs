use std::collections::HashMap;

use tokio::sync::RwLock;

use brickbot_core::domain::order::{Order, OrderId};
use brickbot_core::persistence::{OrderStore, StoreError};

use super::{OrderRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderRepository {
    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id.0) {
            return Err(RepositoryError::Duplicate(order.id.0.clone()).into());
        }
        orders.insert(order.id.0.clone(), order.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> = orders.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0)));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}
