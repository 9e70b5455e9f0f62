//! Status favourite repository.

use std::sync::Arc;

use crate::entities::{StatusFave, status_fave};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Status favourite repository for database operations.
#[derive(Clone)]
pub struct StatusFaveRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusFaveRepository {
    /// Create a new status favourite repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the fave of a status by an account.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        StatusFave::find()
            .filter(status_fave::Column::AccountId.eq(account_id))
            .filter(status_fave::Column::StatusId.eq(status_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every fave of a status, oldest first.
    pub async fn find_by_status(&self, status_id: &str) -> AppResult<Vec<status_fave::Model>> {
        StatusFave::find()
            .filter(status_fave::Column::StatusId.eq(status_id))
            .order_by_asc(status_fave::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new fave.
    pub async fn create(&self, model: status_fave::Model) -> AppResult<status_fave::Model> {
        status_fave::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a fave by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        let fave = self.find_by_pair(account_id, status_id).await?;
        if let Some(f) = &fave {
            f.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(fave)
    }
}
