use async_trait::async_trait;
use thiserror::Error;

use brickbot_core::domain::order::{Order, OrderId};
use brickbot_core::persistence::{OrderStore, StoreError};

pub mod memory;
pub mod order;

pub use memory::InMemoryOrderRepository;
pub use order::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("order {0} already exists")]
    Duplicate(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        StoreError(value.to_string())
    }
}

/// Order storage with read access for operators. Writes go through
/// [`OrderStore::put`], which never overwrites an existing id.
#[async_trait]
pub trait OrderRepository: OrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<Order>, RepositoryError>;
}
