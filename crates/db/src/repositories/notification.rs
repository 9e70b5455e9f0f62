//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::Model) -> AppResult<notification::Model> {
        notification::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Newest notifications of an account.
    pub async fn find_by_target(
        &self,
        account_id: &str,
        limit: usize,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::TargetAccountId.eq(account_id))
            .order_by_desc(notification::Column::Id)
            .limit(limit as u64)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
