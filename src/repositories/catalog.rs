use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{product, product_customization};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Whether soft deleted rows should be returned by a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeDeleted {
    Yes,
    No,
}

/// Read access to the menu, as needed by cart pricing
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn find_product(
        &self,
        id: Uuid,
        include_deleted: IncludeDeleted,
    ) -> Result<Option<product::Model>, ServiceError>;

    async fn find_customization(
        &self,
        id: Uuid,
    ) -> Result<Option<product_customization::Model>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    base: BaseRepository,
}

impl CatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl CatalogLookup for CatalogRepository {
    async fn find_product(
        &self,
        id: Uuid,
        include_deleted: IncludeDeleted,
    ) -> Result<Option<product::Model>, ServiceError> {
        let mut query = product::Entity::find_by_id(id);
        if include_deleted == IncludeDeleted::No {
            query = query.filter(product::Column::DeletedAt.is_null());
        }
        Ok(query.one(self.base.get_db()).await?)
    }

    async fn find_customization(
        &self,
        id: Uuid,
    ) -> Result<Option<product_customization::Model>, ServiceError> {
        Ok(product_customization::Entity::find_by_id(id)
            .one(self.base.get_db())
            .await?)
    }
}
