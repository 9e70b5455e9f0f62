//! Mute repository.

use std::sync::Arc;

use crate::entities::{Mute, mute};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
};

/// Mute repository for database operations.
#[derive(Clone)]
pub struct MuteRepository {
    db: Arc<DatabaseConnection>,
}

impl MuteRepository {
    /// Create a new mute repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a mute by muter and mutee.
    pub async fn find_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<mute::Model>> {
        Mute::find()
            .filter(mute::Column::AccountId.eq(account_id))
            .filter(mute::Column::TargetAccountId.eq(target_account_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new mute.
    pub async fn create(&self, model: mute::Model) -> AppResult<mute::Model> {
        mute::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a mute by pair, returning it if it existed.
    pub async fn delete_by_pair(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<mute::Model>> {
        let mute = self.find_by_pair(account_id, target_account_id).await?;
        if let Some(m) = &mute {
            m.clone()
                .delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(mute)
    }
}
