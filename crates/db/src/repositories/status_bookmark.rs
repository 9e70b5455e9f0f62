//! Status bookmark repository.

use std::sync::Arc;

use crate::entities::{StatusBookmark, status_bookmark};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
};

/// Status bookmark repository for database operations.
#[derive(Clone)]
pub struct StatusBookmarkRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusBookmarkRepository {
    /// Create a new status bookmark repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the bookmark of a status by an account.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        StatusBookmark::find()
            .filter(status_bookmark::Column::AccountId.eq(account_id))
            .filter(status_bookmark::Column::StatusId.eq(status_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new bookmark.
    pub async fn create(
        &self,
        model: status_bookmark::Model,
    ) -> AppResult<status_bookmark::Model> {
        status_bookmark::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a bookmark by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        let bookmark = self.find_by_pair(account_id, status_id).await?;
        if let Some(b) = &bookmark {
            b.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(bookmark)
    }
}
