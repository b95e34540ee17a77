use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod catalog;
pub mod order_repository;
pub mod payment_repository;
pub mod user_repository;

pub use catalog::{CatalogLookup, CatalogRepository, IncludeDeleted};
pub use order_repository::{OrderAggregate, OrderListFilter, OrderRepository};
pub use payment_repository::PaymentRepository;
pub use user_repository::UserRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
