use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::user::{ActiveModel, Column, Entity as User, Model};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, ServiceError> {
        Ok(User::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Model>, ServiceError> {
        Ok(User::find()
            .filter(Column::Email.eq(email.to_lowercase()))
            .one(self.base.get_db())
            .await?)
    }

    pub async fn create(&self, user: ActiveModel) -> Result<Model, ServiceError> {
        Ok(user.insert(self.base.get_db()).await?)
    }
}
