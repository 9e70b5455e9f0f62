//! Follow request repository.

use std::sync::Arc;

use crate::entities::{FollowRequest, follow_request};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Follow request repository for database operations.
#[derive(Clone)]
pub struct FollowRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRequestRepository {
    /// Create a new follow request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow request by requester and target.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        FollowRequest::find()
            .filter(follow_request::Column::AccountId.eq(account_id))
            .filter(follow_request::Column::TargetAccountId.eq(target_account_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new follow request.
    pub async fn create(&self, model: follow_request::Model) -> AppResult<follow_request::Model> {
        follow_request::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a follow request by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        let request = self.find_by_pair(account_id, target_account_id).await?;
        if let Some(r) = &request {
            r.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(request)
    }

    /// Pending requests targeting an account.
    pub async fn find_received(
        &self,
        target_account_id: &str,
    ) -> AppResult<Vec<follow_request::Model>> {
        FollowRequest::find()
            .filter(follow_request::Column::TargetAccountId.eq(target_account_id))
            .order_by_desc(follow_request::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
