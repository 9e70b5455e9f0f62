//! Media attachment repository.

use std::sync::Arc;

use crate::entities::{MediaAttachment, media_attachment};
use plaza_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel};

/// Media attachment repository for database operations.
#[derive(Clone)]
pub struct MediaAttachmentRepository {
    db: Arc<DatabaseConnection>,
}

impl MediaAttachmentRepository {
    /// Create a new media attachment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an attachment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<media_attachment::Model>> {
        MediaAttachment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new attachment.
    pub async fn create(
        &self,
        model: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        media_attachment::ActiveModel::from(model)
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an attachment.
    pub async fn update(
        &self,
        model: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        model
            .into_active_model()
            .reset_all()
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an attachment.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        MediaAttachment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
