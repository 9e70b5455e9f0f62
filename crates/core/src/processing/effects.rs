//! Side effects shared by both worker-pool processing functions: timeline
//! fan-out, notifications, stream events and delivery targets.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::Database;
use plaza_db::entities::{account, notification, notification::NotificationKind, status};
use plaza_federation::{Activity, Federator, UrlConfig};
use plaza_queue::ActivityType;
use tracing::{debug, warn};
use url::Url;

use super::streaming::{StreamEvent, StreamingProcessor};
use crate::api;
use crate::timeline::{Manager, Timelineable};
use crate::typeutils::TypeConverter;
use crate::visibility::Filter;

/// Everything the processing functions need, shared by both pools.
pub struct SideEffects {
    pub(super) db: Arc<dyn Database>,
    pub(super) federator: Arc<dyn Federator>,
    pub(super) converter: Arc<dyn TypeConverter>,
    pub(super) filter: Filter,
    pub(super) timelines: Arc<Manager<api::Status>>,
    pub(super) streams: StreamingProcessor,
    pub(super) ids: Arc<IdGenerator>,
    pub(super) urls: UrlConfig,
}

impl SideEffects {
    pub(super) async fn account(&self, id: &str) -> AppResult<account::Model> {
        self.db
            .get_account_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {id}")))
    }

    pub(super) async fn status(&self, id: &str) -> AppResult<status::Model> {
        self.db
            .get_status_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("status {id} not found")))
    }

    /// Put `status` into the home timelines of its local author, the local
    /// accounts following the author and the local accounts it mentions.
    pub(super) async fn timeline_status(&self, status: &status::Model) -> AppResult<()> {
        let mut owners = Vec::new();
        if self.account(&status.account_id).await?.is_local() {
            owners.push(status.account_id.clone());
        }
        for follow in self.db.get_followers(&status.account_id).await? {
            owners.push(follow.account_id);
        }
        owners.extend(status.mention_ids());

        let mut seen = BTreeSet::new();
        for owner_id in owners {
            if !seen.insert(owner_id.clone()) {
                continue;
            }
            let Some(owner) = self.db.get_account_by_id(&owner_id).await? else {
                continue;
            };
            if owner.is_local() {
                self.ingest(&owner, status).await;
            }
        }
        Ok(())
    }

    /// Ingest into one timeline. Failures only affect this owner.
    async fn ingest(&self, owner: &account::Model, status: &status::Model) {
        match self
            .timelines
            .ingest_status(&owner.id, Timelineable::from(status))
            .await
        {
            Ok(true) if self.streams.has_subscribers(&owner.id) => {
                match self.converter.status_to_api(status, Some(owner)).await {
                    Ok(api) => {
                        self.streams
                            .publish(&owner.id, StreamEvent::Update(Box::new(api)));
                    }
                    Err(e) => warn!(error = %e, status_id = %status.id, "Failed to stream status"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(
                error = %e,
                account_id = %owner.id,
                status_id = %status.id,
                "Failed to ingest status into timeline"
            ),
        }
    }

    /// Remove a deleted status and its boosts from every timeline and tell
    /// open streams.
    pub(super) async fn wipe_status(&self, status_id: &str) {
        let removed = self.timelines.wipe_status_from_all_timelines(status_id).await;
        self.streams
            .publish_all(&StreamEvent::Delete(status_id.to_string()));
        debug!(status_id, removed, "Wiped status from timelines");
    }

    /// Notify `target_id` about something `origin_id` did.
    ///
    /// Nothing happens for remote targets, self-interactions, or when the
    /// target blocks or mutes the origin.
    pub(super) async fn notify(
        &self,
        kind: NotificationKind,
        target_id: &str,
        origin_id: &str,
        status_id: Option<&str>,
    ) -> AppResult<()> {
        if target_id == origin_id {
            return Ok(());
        }
        let target = self.account(target_id).await?;
        if !target.is_local()
            || self.db.is_blocked(target_id, origin_id, true).await?
            || self.db.is_muted(target_id, origin_id).await?
        {
            return Ok(());
        }

        let notification = self
            .db
            .put_notification(notification::Model {
                id: self.ids.generate(),
                kind,
                target_account_id: target_id.to_string(),
                origin_account_id: origin_id.to_string(),
                status_id: status_id.map(str::to_string),
                read: false,
                created_at: Utc::now().fixed_offset(),
            })
            .await?;
        debug!(kind = ?kind, target_id, origin_id, "Created notification");

        if self.streams.has_subscribers(target_id) {
            let api = self
                .converter
                .notification_to_api(&notification, &target)
                .await?;
            self.streams
                .publish(target_id, StreamEvent::Notification(Box::new(api)));
        }
        Ok(())
    }

    /// Mention notifications for every local account `status` mentions and
    /// that may see it.
    pub(super) async fn notify_mentions(&self, status: &status::Model) -> AppResult<()> {
        for id in status.mention_ids() {
            let Some(mentioned) = self.db.get_account_by_id(&id).await? else {
                continue;
            };
            if mentioned.is_local() && self.filter.status_visible(Some(&mentioned), status).await? {
                self.notify(
                    NotificationKind::Mention,
                    &mentioned.id,
                    &status.account_id,
                    Some(&status.id),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Inboxes of `account_id`'s remote followers, shared inboxes collapsed.
    pub(super) async fn follower_inboxes(&self, account_id: &str) -> AppResult<BTreeSet<String>> {
        let mut inboxes = BTreeSet::new();
        for follow in self.db.get_followers(account_id).await? {
            if let Some(follower) = self.db.get_account_by_id(&follow.account_id).await?
                && !follower.is_local()
            {
                inboxes.insert(follower.delivery_inbox().to_string());
            }
        }
        Ok(inboxes)
    }

    /// Inboxes of the remote accounts `status` mentions.
    pub(super) async fn mention_inboxes(&self, status: &status::Model) -> AppResult<BTreeSet<String>> {
        let mut inboxes = BTreeSet::new();
        for id in status.mention_ids() {
            if let Some(mentioned) = self.db.get_account_by_id(&id).await?
                && !mentioned.is_local()
            {
                inboxes.insert(mentioned.delivery_inbox().to_string());
            }
        }
        Ok(inboxes)
    }

    /// Deliver `activity` from a local actor. Remote actors and empty inbox
    /// lists are skipped.
    pub(super) async fn deliver(
        &self,
        actor: &account::Model,
        activity: &Activity,
        inboxes: impl IntoIterator<Item = String>,
    ) -> AppResult<()> {
        let inboxes: Vec<String> = inboxes.into_iter().collect();
        if !actor.is_local() || inboxes.is_empty() {
            return Ok(());
        }
        debug!(
            activity = %activity.kind,
            actor = %actor.uri,
            inboxes = inboxes.len(),
            "Delivering activity"
        );
        self.federator.deliver(actor, activity, inboxes).await
    }

    /// Wrap `inner` in an activity of `kind` by `actor`, e.g. an `Undo`.
    pub(super) fn wrap(
        &self,
        kind: ActivityType,
        actor: &account::Model,
        inner: &Activity,
    ) -> AppResult<Activity> {
        let mut inner = inner.to_json()?;
        if let Some(map) = inner.as_object_mut() {
            map.remove("@context");
        }
        let id = self.urls.activity_uri(&actor.username, &self.ids.generate());
        Ok(Activity::new(kind, Url::parse(&id)?, Url::parse(&actor.uri)?, inner))
    }
}
