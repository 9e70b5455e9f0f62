//! Moderation: domain blocks and account suspension.

use std::sync::Arc;

use chrono::Utc;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::Database;
use plaza_db::entities::{account, domain_block};
use plaza_queue::{ActivityType, FromClientApi, Payload, WorkerPool};
use tracing::{info, warn};
use validator::Validate;

use super::enqueue_stored;
use crate::api::{self, DomainBlockCreateForm};
use crate::timeline::Manager;
use crate::typeutils::TypeConverter;

/// Fail with `Forbidden` unless `account` is a moderator or an admin.
pub(super) async fn require_moderator(
    db: &dyn Database,
    account: &account::Model,
) -> AppResult<()> {
    let staff = db
        .get_user_by_account_id(&account.id)
        .await?
        .is_some_and(|u| u.moderator || u.admin);
    if staff {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "account {} is not a moderator",
            account.id
        )))
    }
}

#[derive(Clone)]
pub struct AdminProcessor {
    db: Arc<dyn Database>,
    converter: Arc<dyn TypeConverter>,
    timelines: Arc<Manager<api::Status>>,
    client_pool: Arc<WorkerPool<FromClientApi>>,
    ids: Arc<IdGenerator>,
}

impl AdminProcessor {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        converter: Arc<dyn TypeConverter>,
        timelines: Arc<Manager<api::Status>>,
        client_pool: Arc<WorkerPool<FromClientApi>>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            db,
            converter,
            timelines,
            client_pool,
            ids,
        }
    }

    /// Block a whole domain: every known account of it is suspended and
    /// dropped from home timelines.
    pub async fn domain_block_create(
        &self,
        moderator: &account::Model,
        form: DomainBlockCreateForm,
    ) -> AppResult<api::DomainBlock> {
        require_moderator(self.db.as_ref(), moderator).await?;
        form.validate()?;
        let domain = form.domain.trim().trim_end_matches('.').to_lowercase();
        if domain.is_empty() || domain.contains('/') || domain.contains('@') {
            return Err(AppError::BadRequest(format!("invalid domain {}", form.domain)));
        }
        if let Some(existing) = self.db.get_domain_block(&domain).await? {
            return Err(AppError::Conflict(format!(
                "domain {} is already blocked",
                existing.domain
            )));
        }

        let block = self
            .db
            .put_domain_block(domain_block::Model {
                id: self.ids.generate(),
                domain: domain.clone(),
                created_by_account_id: moderator.id.clone(),
                public_comment: form.public_comment,
                private_comment: form.private_comment,
                created_at: Utc::now().fixed_offset(),
            })
            .await?;

        let now = Utc::now().fixed_offset();
        let mut suspended = 0usize;
        for mut account in self.db.get_accounts_by_domain(&domain).await? {
            if account.is_suspended() {
                continue;
            }
            let account_id = account.id.clone();
            account.suspended_at = Some(now);
            if let Err(e) = self.db.update_account(account).await {
                warn!(error = %e, account_id = %account_id, "Failed to suspend account");
                continue;
            }
            self.timelines.remove_account_everywhere(&account_id).await;
            suspended += 1;
        }
        info!(domain = %domain, suspended, "Blocked domain");
        Ok(self.converter.domain_block_to_api(&block))
    }

    /// Lift a domain block. Suspended accounts stay suspended.
    pub async fn domain_block_delete(
        &self,
        moderator: &account::Model,
        domain: &str,
    ) -> AppResult<api::DomainBlock> {
        require_moderator(self.db.as_ref(), moderator).await?;
        let block = self
            .db
            .delete_domain_block(&domain.to_lowercase())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("domain block {domain} not found")))?;
        info!(domain = %block.domain, "Removed domain block");
        Ok(self.converter.domain_block_to_api(&block))
    }

    pub async fn domain_blocks_get(
        &self,
        moderator: &account::Model,
    ) -> AppResult<Vec<api::DomainBlock>> {
        require_moderator(self.db.as_ref(), moderator).await?;
        Ok(self
            .db
            .get_domain_blocks()
            .await?
            .iter()
            .map(|b| self.converter.domain_block_to_api(b))
            .collect())
    }

    /// Suspend an account. Local accounts announce their deletion to their
    /// followers.
    pub async fn account_suspend(
        &self,
        moderator: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Account> {
        self.client_pool.ensure_accepting()?;
        require_moderator(self.db.as_ref(), moderator).await?;
        if moderator.id == target_id {
            return Err(AppError::BadRequest("account cannot suspend itself".to_string()));
        }
        let mut target = self
            .db
            .get_account_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {target_id} not found")))?;
        if !target.is_suspended() {
            target.suspended_at = Some(Utc::now().fixed_offset());
            target = self.db.update_account(target).await?;
            info!(account_id = %target.id, moderator = %moderator.id, "Suspended account");
            enqueue_stored(
                &self.client_pool,
                FromClientApi::new(
                    ActivityType::Delete,
                    Payload::Account(Box::new(target.clone())),
                    moderator.clone(),
                )
                .with_target(target.clone()),
            )
            .await;
        }
        self.converter.account_to_api(&target).await
    }
}
