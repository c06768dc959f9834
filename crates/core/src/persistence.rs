use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::dialog::constraints::ConstraintTable;
use crate::domain::order::{Order, OrderId};
use crate::domain::slot::SlotSet;
use crate::errors::{ApplicationError, DomainError};

#[derive(Debug, Error)]
#[error("order store write failed: {0}")]
pub struct StoreError(pub String);

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.0)
    }
}

/// Durable single-record write for finalized orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn put(&self, order: &Order) -> Result<(), StoreError>;
}

/// Builds an order from the required slots and writes it. Every call produces a
/// fresh id, so calling twice writes two records.
pub async fn persist_order(
    store: &dyn OrderStore,
    table: &ConstraintTable,
    slots: &SlotSet,
) -> Result<OrderId, ApplicationError> {
    let mut values = BTreeMap::new();
    for slot in table.required_slots() {
        let value = slots.normalized(slot).ok_or(DomainError::MissingSlotValue { slot })?;
        values.insert(slot, value);
    }

    let order = Order { id: OrderId::generate(), values, created_at: Utc::now() };
    store.put(&order).await?;
    Ok(order.id)
}
