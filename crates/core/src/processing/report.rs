//! Reports of accounts to moderators.

use std::sync::Arc;

use chrono::Utc;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::Database;
use plaza_db::entities::{account, report};
use plaza_federation::UrlConfig;
use plaza_queue::{ActivityType, FromClientApi, Payload, WorkerPool};
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::admin::require_moderator;
use super::enqueue_stored;
use crate::api::{self, ReportCreateForm};
use crate::typeutils::TypeConverter;

#[derive(Clone)]
pub struct ReportProcessor {
    db: Arc<dyn Database>,
    converter: Arc<dyn TypeConverter>,
    client_pool: Arc<WorkerPool<FromClientApi>>,
    ids: Arc<IdGenerator>,
    urls: UrlConfig,
}

impl ReportProcessor {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        converter: Arc<dyn TypeConverter>,
        client_pool: Arc<WorkerPool<FromClientApi>>,
        ids: Arc<IdGenerator>,
        urls: UrlConfig,
    ) -> Self {
        Self {
            db,
            converter,
            client_pool,
            ids,
            urls,
        }
    }

    /// File a report. With `forward`, reports of remote accounts are also
    /// sent to their server.
    pub async fn create(
        &self,
        account: &account::Model,
        form: ReportCreateForm,
    ) -> AppResult<api::Report> {
        self.client_pool.ensure_accepting()?;
        form.validate()?;
        if form.account_id == account.id {
            return Err(AppError::BadRequest("account cannot report itself".to_string()));
        }
        let target = self
            .db
            .get_account_by_id(&form.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {} not found", form.account_id)))?;

        let mut status_ids = Vec::with_capacity(form.status_ids.len());
        for id in &form.status_ids {
            let status = self
                .db
                .get_status_by_id(id)
                .await?
                .ok_or_else(|| AppError::BadRequest(format!("status {id} not found")))?;
            if status.account_id != target.id {
                return Err(AppError::BadRequest(format!(
                    "status {id} does not belong to account {}",
                    target.id
                )));
            }
            if !status_ids.contains(id) {
                status_ids.push(id.clone());
            }
        }

        let id = self.ids.generate();
        let report = self
            .db
            .put_report(report::Model {
                uri: self.urls.report_uri(&id),
                id,
                account_id: account.id.clone(),
                target_account_id: target.id.clone(),
                status_ids: json!(status_ids),
                comment: form.comment,
                forwarded: form.forward && !target.is_local(),
                action_taken: None,
                action_taken_at: None,
                action_taken_by_account_id: None,
                created_at: Utc::now().fixed_offset(),
            })
            .await?;
        info!(report_id = %report.id, target_id = %target.id, forwarded = report.forwarded, "Created report");

        enqueue_stored(
            &self.client_pool,
            FromClientApi::new(ActivityType::Flag, Payload::Report(report.clone()), account.clone())
                .with_target(target),
        )
        .await;
        self.converter.report_to_api(&report).await
    }

    /// A report, visible to its author and to moderators.
    pub async fn get(&self, account: &account::Model, id: &str) -> AppResult<api::Report> {
        let report = self
            .db
            .get_report(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("report {id} not found")))?;
        if report.account_id != account.id {
            require_moderator(self.db.as_ref(), account)
                .await
                .map_err(|_| AppError::NotFound(format!("report {id} not found")))?;
        }
        self.converter.report_to_api(&report).await
    }

    /// Reports for moderators, newest first.
    pub async fn list(
        &self,
        moderator: &account::Model,
        resolved: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<api::Report>> {
        require_moderator(self.db.as_ref(), moderator).await?;
        let reports = self.db.get_reports(resolved, limit.clamp(1, 200)).await?;
        let mut out = Vec::with_capacity(reports.len());
        for report in &reports {
            out.push(self.converter.report_to_api(report).await?);
        }
        Ok(out)
    }

    /// Close a report with a note on the action taken.
    pub async fn resolve(
        &self,
        moderator: &account::Model,
        id: &str,
        action_taken: Option<String>,
    ) -> AppResult<api::Report> {
        require_moderator(self.db.as_ref(), moderator).await?;
        let mut report = self
            .db
            .get_report(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("report {id} not found")))?;
        if report.is_resolved() {
            return Err(AppError::Conflict(format!("report {id} is already resolved")));
        }
        report.action_taken = Some(action_taken.unwrap_or_default());
        report.action_taken_at = Some(Utc::now().fixed_offset());
        report.action_taken_by_account_id = Some(moderator.id.clone());
        let report = self.db.update_report(report).await?;
        info!(report_id = %report.id, moderator = %moderator.id, "Resolved report");
        self.converter.report_to_api(&report).await
    }
}
