use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::payment::{ActiveModel, Column, Entity as Payment, Model};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Gateway status value of a settled payment
pub const SETTLED_STATUS: &str = "settlement";

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    base: BaseRepository,
}

impl PaymentRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Model>, ServiceError> {
        Ok(Payment::find()
            .filter(Column::GatewayOrderId.eq(gateway_order_id))
            .one(self.base.get_db())
            .await?)
    }

    /// Whether any payment of the order other than `except` has settled
    pub async fn has_settled_payment(
        &self,
        order_id: i32,
        except: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let mut query = Payment::find()
            .filter(Column::OrderId.eq(order_id))
            .filter(Column::TransactionStatus.eq(SETTLED_STATUS));
        if let Some(id) = except {
            query = query.filter(Column::Id.ne(id));
        }
        Ok(query.count(self.base.get_db()).await? > 0)
    }

    pub async fn create(&self, payment: ActiveModel) -> Result<Model, ServiceError> {
        Ok(payment.insert(self.base.get_db()).await?)
    }

    pub async fn update(&self, payment: ActiveModel) -> Result<Model, ServiceError> {
        Ok(payment.update(self.base.get_db()).await?)
    }
}
