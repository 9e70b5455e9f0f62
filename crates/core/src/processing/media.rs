//! Media uploads. Attachments belong to their uploader until a status uses
//! them.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use plaza_common::config::MediaConfig;
use plaza_common::{AppError, AppResult, IdGenerator, StorageBackend, generate_storage_key};
use plaza_db::Database;
use plaza_db::entities::{account, media_attachment};
use tracing::{info, warn};
use validator::Validate;

use crate::api::{self, MediaUpdateForm};
use crate::typeutils::TypeConverter;

const ACCEPTED_TYPES: [&str; 3] = ["image/", "video/", "audio/"];

#[derive(Clone)]
pub struct MediaProcessor {
    db: Arc<dyn Database>,
    storage: Arc<dyn StorageBackend>,
    converter: Arc<dyn TypeConverter>,
    ids: Arc<IdGenerator>,
    limits: MediaConfig,
}

impl MediaProcessor {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        storage: Arc<dyn StorageBackend>,
        converter: Arc<dyn TypeConverter>,
        ids: Arc<IdGenerator>,
        limits: MediaConfig,
    ) -> Self {
        Self {
            db,
            storage,
            converter,
            ids,
            limits,
        }
    }

    fn check_description(&self, description: Option<&str>) -> AppResult<()> {
        let chars = description.map_or(0, |d| d.chars().count());
        if chars > self.limits.max_description_chars {
            return Err(AppError::BadRequest(format!(
                "description too long, {chars} characters provided but limit is {}",
                self.limits.max_description_chars
            )));
        }
        Ok(())
    }

    /// Own attachment of `account`. Other accounts' attachments do not exist.
    async fn owned(&self, account: &account::Model, id: &str) -> AppResult<media_attachment::Model> {
        self.db
            .get_attachment(id)
            .await?
            .filter(|a| a.account_id == account.id)
            .ok_or_else(|| AppError::NotFound(format!("attachment {id} not found")))
    }

    /// Store an uploaded file and record it as an unattached attachment.
    pub async fn create(
        &self,
        account: &account::Model,
        data: Bytes,
        content_type: &str,
        file_name: &str,
        description: Option<String>,
    ) -> AppResult<api::Attachment> {
        if data.is_empty() {
            return Err(AppError::BadRequest("empty upload".to_string()));
        }
        let size = data.len() as u64;
        if size > self.limits.max_size {
            return Err(AppError::BadRequest(format!(
                "file size {size} exceeds the limit of {} bytes",
                self.limits.max_size
            )));
        }
        if !ACCEPTED_TYPES.iter().any(|p| content_type.starts_with(p)) {
            return Err(AppError::BadRequest(format!(
                "unsupported content type {content_type}"
            )));
        }
        let description = description.filter(|d| !d.trim().is_empty());
        self.check_description(description.as_deref())?;

        let key = generate_storage_key(&account.id, file_name);
        let uploaded = self.storage.upload(&key, &data, content_type).await?;
        let file_size = i64::try_from(uploaded.size)
            .map_err(|e| AppError::Internal(format!("file size out of range: {e}")))?;

        let attachment = self
            .db
            .put_attachment(media_attachment::Model {
                id: self.ids.generate(),
                account_id: account.id.clone(),
                status_id: None,
                url: uploaded.url,
                content_type: uploaded.content_type,
                file_size,
                description,
                storage_key: uploaded.key,
                created_at: Utc::now().fixed_offset(),
            })
            .await?;
        info!(attachment_id = %attachment.id, size, "Stored attachment");
        Ok(self.converter.attachment_to_api(&attachment))
    }

    pub async fn get(&self, account: &account::Model, id: &str) -> AppResult<api::Attachment> {
        let attachment = self.owned(account, id).await?;
        Ok(self.converter.attachment_to_api(&attachment))
    }

    /// Change the description of an attachment.
    pub async fn update(
        &self,
        account: &account::Model,
        id: &str,
        form: MediaUpdateForm,
    ) -> AppResult<api::Attachment> {
        form.validate()?;
        let mut attachment = self.owned(account, id).await?;
        let description = form.description.filter(|d| !d.trim().is_empty());
        self.check_description(description.as_deref())?;
        attachment.description = description;
        let attachment = self.db.update_attachment(attachment).await?;
        Ok(self.converter.attachment_to_api(&attachment))
    }

    /// Delete an attachment no status uses yet.
    pub async fn delete(&self, account: &account::Model, id: &str) -> AppResult<()> {
        let attachment = self.owned(account, id).await?;
        if attachment.status_id.is_some() {
            return Err(AppError::Forbidden(format!(
                "attachment {id} is in use by a status"
            )));
        }
        self.db.delete_attachment(id).await?;
        if let Err(e) = self.storage.delete(&attachment.storage_key).await {
            warn!(error = %e, key = %attachment.storage_key, "Failed to delete stored file");
        }
        Ok(())
    }
}
