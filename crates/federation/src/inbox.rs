//! Applying received activities to local storage.
//!
//! Each activity is persisted here, synchronously with the inbox request,
//! and turned into at most one [`FromFederator`] message describing the side
//! effects left for the federator worker pool.

use std::sync::Arc;

use axum::http::Method;
use chrono::Utc;
use plaza_common::{AppError, AppResult, IdGenerator, get_metrics};
use plaza_db::Database;
use plaza_db::entities::{account, block, follow_request, report, status, status_fave};
use plaza_queue::{ActivityType, FromFederator, Payload, WorkerPool};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::activity::Activity;
use crate::convert::{NoteRefs, addresses_public, status_from_note};
use crate::federator::Federator;
use crate::objects::ApNote;
use crate::request::InboundRequest;

/// The username of `/users/{username}/inbox`, `None` for the shared inbox.
fn inbox_username(path_and_query: &str) -> Option<&str> {
    let path = path_and_query.split('?').next().unwrap_or(path_and_query);
    path.strip_prefix("/users/")?
        .strip_suffix("/inbox")
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

/// Persists received activities and describes their side effects.
#[derive(Clone)]
pub struct InboxHandler {
    db: Arc<dyn Database>,
    ids: Arc<IdGenerator>,
}

impl InboxHandler {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, ids: Arc<IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// Authenticate, parse and apply an inbox POST, then queue its side effects.
    ///
    /// Returns `Ok(false)` without side effects when the request is not an
    /// `ActivityPub` POST.
    pub async fn receive(
        &self,
        federator: &dyn Federator,
        request: InboundRequest,
        pool: Option<&WorkerPool<FromFederator>>,
    ) -> AppResult<bool> {
        if request.method != Method::POST || !request.is_activity_pub() {
            return Ok(false);
        }

        let username = inbox_username(&request.path_and_query);
        let inbox_owner = match username {
            Some(name) => Some(
                self.db
                    .get_local_account_by_username(name)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("account {name}")))?,
            ),
            None => None,
        };

        let activity: Activity = serde_json::from_slice(&request.body)
            .map_err(|e| AppError::BadRequest(format!("unsupported activity: {e}")))?;
        let signer = federator
            .authenticate_federated_request(&request, username.unwrap_or_default())
            .await?;
        let requester = federator
            .get_account_by_uri(username.unwrap_or_default(), &signer, false)
            .await
            .map_err(|e| AppError::Unauthorized(format!("unresolvable signer {signer}: {e}")))?;

        if let Some(domain) = &requester.domain
            && self.db.get_domain_block(domain).await?.is_some()
        {
            return Err(AppError::Forbidden(format!("domain {domain} is blocked")));
        }
        get_metrics().record_activity_received();

        if let Some(message) = self
            .handle(federator, &activity, &requester, inbox_owner.as_ref())
            .await?
        {
            match pool {
                Some(pool) => pool.enqueue(message).await?,
                None => debug!(message = ?message, "No federator pool, dropping side effects"),
            }
        }
        Ok(true)
    }

    /// Apply `activity`, sent by `requester`, to local storage.
    ///
    /// `inbox_owner` is the local account whose inbox received the activity;
    /// `None` for the shared inbox, in which case the local recipient is
    /// derived from the addressing and the requester's local followers.
    pub async fn handle(
        &self,
        federator: &dyn Federator,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        if activity.actor.as_str() != requester.uri {
            return Err(AppError::Unauthorized(format!(
                "activity actor {} does not match signer {}",
                activity.actor, requester.uri
            )));
        }
        debug!(
            activity = %activity.kind,
            id = %activity.id,
            actor = %requester.uri,
            "Handling received activity"
        );

        let message = match activity.kind {
            ActivityType::Create => self.create(activity, requester, inbox_owner).await?,
            ActivityType::Announce => self.announce(activity, requester, inbox_owner).await?,
            ActivityType::Like => self.like(activity, requester).await?,
            ActivityType::Follow => self.follow(activity, requester).await?,
            ActivityType::Accept => self.accept(activity, requester, inbox_owner).await?,
            ActivityType::Reject => self.reject(activity, requester, inbox_owner).await?,
            ActivityType::Undo => self.undo(activity, requester, inbox_owner).await?,
            ActivityType::Block => self.block(activity, requester).await?,
            ActivityType::Delete => self.delete(activity, requester, inbox_owner).await?,
            ActivityType::Update => {
                self.update(federator, activity, requester, inbox_owner)
                    .await?
            }
            ActivityType::Flag => self.flag(activity, requester).await?,
        };

        Ok(message.map(|m| m.with_requester(requester.clone()).with_iri(activity.id.as_str())))
    }

    async fn local_account(&self, uri: &str) -> AppResult<Option<account::Model>> {
        Ok(self
            .db
            .get_account_by_uri(uri)
            .await?
            .filter(account::Model::is_local))
    }

    async fn required_local_account(&self, uri: Option<&str>) -> AppResult<account::Model> {
        let uri = uri.ok_or_else(|| AppError::BadRequest("activity has no object".to_string()))?;
        self.local_account(uri)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("local account {uri}")))
    }

    /// The local account an activity is meant for.
    async fn recipient(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<account::Model>> {
        if let Some(owner) = inbox_owner {
            return Ok(Some(owner.clone()));
        }
        for uri in activity.to.iter().chain(&activity.cc) {
            if let Some(account) = self.local_account(uri.as_str()).await? {
                return Ok(Some(account));
            }
        }
        for edge in self.db.get_followers(&requester.id).await? {
            if let Some(account) = self.db.get_account_by_id(&edge.account_id).await?
                && account.is_local()
            {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    async fn create(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        if !matches!(activity.object_type(), Some("Note" | "Article" | "Page")) {
            debug!(id = %activity.id, "Ignoring Create of unsupported object");
            return Ok(None);
        }
        let note: ApNote = serde_json::from_value(activity.object.clone())
            .map_err(|e| AppError::BadRequest(format!("invalid note: {e}")))?;
        if note.attributed_to.as_str() != requester.uri {
            return Err(AppError::Unauthorized(format!(
                "{} cannot create notes attributed to {}",
                requester.uri, note.attributed_to
            )));
        }
        if self.db.get_status_by_uri(note.id.as_str()).await?.is_some() {
            debug!(uri = %note.id, "Status already known");
            return Ok(None);
        }

        let mut refs = NoteRefs::default();
        if let Some(parent) = &note.in_reply_to {
            refs.in_reply_to = self.db.get_status_by_uri(parent.as_str()).await?;
        }
        let mut mentioned_local = None;
        for tag in note.tag.iter().filter(|t| t.is_mention()) {
            let Some(href) = &tag.href else { continue };
            if let Some(account) = self.db.get_account_by_uri(href.as_str()).await? {
                if account.is_local() && mentioned_local.is_none() {
                    mentioned_local = Some(account.clone());
                }
                refs.mention_account_ids.push(account.id);
            }
        }

        let status = status_from_note(self.ids.generate(), &note, requester, refs);
        let status = self.db.put_status(status).await?;
        info!(status_id = %status.id, uri = %status.uri, "Stored remote status");

        let receiver = match inbox_owner.cloned().or(mentioned_local) {
            Some(account) => Some(account),
            None => self.recipient(activity, requester, None).await?,
        };
        Ok(receiver.map(|r| {
            FromFederator::new(ActivityType::Create, Payload::Status(Box::new(status)), r)
        }))
    }

    async fn announce(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        let Some(original_uri) = activity.object_id() else {
            return Err(AppError::BadRequest("Announce without object".to_string()));
        };
        let Some(original) = self.db.get_status_by_uri(original_uri).await? else {
            debug!(uri = %original_uri, "Ignoring boost of unknown status");
            return Ok(None);
        };
        if self.db.get_status_by_uri(activity.id.as_str()).await?.is_some() {
            return Ok(None);
        }

        let boost = boost_status(self.ids.generate(), activity, requester, &original);
        let boost = self.db.put_status(boost).await?;

        let author = self.db.get_account_by_id(&original.account_id).await?;
        let receiver = match author.filter(account::Model::is_local) {
            Some(author) => Some(author),
            None => self.recipient(activity, requester, inbox_owner).await?,
        };
        Ok(receiver.map(|r| {
            FromFederator::new(ActivityType::Create, Payload::Announce(Box::new(boost)), r)
        }))
    }

    async fn like(
        &self,
        activity: &Activity,
        requester: &account::Model,
    ) -> AppResult<Option<FromFederator>> {
        let Some(status_uri) = activity.object_id() else {
            return Err(AppError::BadRequest("Like without object".to_string()));
        };
        let Some(status) = self
            .db
            .get_status_by_uri(status_uri)
            .await?
            .filter(|s| s.local)
        else {
            debug!(uri = %status_uri, "Ignoring like of unknown status");
            return Ok(None);
        };
        if self.db.get_fave(&requester.id, &status.id).await?.is_some() {
            return Ok(None);
        }

        let fave = self
            .db
            .put_fave(status_fave::Model {
                id: self.ids.generate(),
                uri: activity.id.to_string(),
                account_id: requester.id.clone(),
                target_account_id: status.account_id.clone(),
                status_id: status.id.clone(),
                created_at: Utc::now().fixed_offset(),
            })
            .await?;

        let author = self.db.get_account_by_id(&status.account_id).await?;
        Ok(author.map(|a| FromFederator::new(ActivityType::Create, Payload::StatusFave(fave), a)))
    }

    async fn follow(
        &self,
        activity: &Activity,
        requester: &account::Model,
    ) -> AppResult<Option<FromFederator>> {
        let target = self.required_local_account(activity.object_id()).await?;
        if self.db.is_blocked(&target.id, &requester.id, true).await? {
            return Err(AppError::blocked(&target.id, &requester.id));
        }
        if self.db.get_follow(&requester.id, &target.id).await?.is_some() {
            debug!(follower = %requester.id, target = %target.id, "Already following");
            return Ok(None);
        }

        let request = follow_request::Model {
            id: self.ids.generate(),
            uri: activity.id.to_string(),
            account_id: requester.id.clone(),
            target_account_id: target.id.clone(),
            show_reblogs: true,
            notify: false,
            created_at: Utc::now().fixed_offset(),
        };

        let payload = if target.locked {
            if self
                .db
                .get_follow_request(&requester.id, &target.id)
                .await?
                .is_some()
            {
                return Ok(None);
            }
            Payload::FollowRequest(self.db.put_follow_request(request).await?)
        } else {
            Payload::Follow(self.db.put_follow(request.into_follow()).await?)
        };

        Ok(Some(FromFederator::new(ActivityType::Create, payload, target)))
    }

    /// The local account that sent the Follow being accepted or rejected.
    async fn follower_of(
        &self,
        activity: &Activity,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<account::Model>> {
        if let Some(actor) = activity.object.get("actor").and_then(Value::as_str) {
            return self.local_account(actor).await;
        }
        Ok(inbox_owner.cloned())
    }

    async fn accept(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        let Some(follower) = self.follower_of(activity, inbox_owner).await? else {
            return Ok(None);
        };
        let Some(request) = self
            .db
            .delete_follow_request(&follower.id, &requester.id)
            .await?
        else {
            debug!(follower = %follower.id, target = %requester.id, "No pending follow to accept");
            return Ok(None);
        };
        if self
            .db
            .get_follow(&follower.id, &requester.id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let follow = self.db.put_follow(request.into_follow()).await?;
        info!(follower = %follower.id, target = %requester.id, "Follow accepted");
        Ok(Some(FromFederator::new(
            ActivityType::Accept,
            Payload::Follow(follow),
            follower,
        )))
    }

    async fn reject(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        if let Some(follower) = self.follower_of(activity, inbox_owner).await? {
            self.db
                .delete_follow_request(&follower.id, &requester.id)
                .await?;
            self.db.delete_follow(&follower.id, &requester.id).await?;
            info!(follower = %follower.id, target = %requester.id, "Follow rejected");
        }
        Ok(None)
    }

    async fn undo(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        match activity.object_type() {
            Some("Follow") => {
                let target = self
                    .required_local_account(activity.inner_object_id())
                    .await?;
                self.db
                    .delete_follow_request(&requester.id, &target.id)
                    .await?;
                let follow = self.db.delete_follow(&requester.id, &target.id).await?;
                Ok(follow.map(|f| {
                    FromFederator::new(ActivityType::Undo, Payload::Follow(f), target)
                }))
            }
            Some("Like") => {
                let Some(uri) = activity.inner_object_id() else {
                    return Ok(None);
                };
                let Some(status) = self.db.get_status_by_uri(uri).await? else {
                    return Ok(None);
                };
                let Some(fave) = self.db.delete_fave(&requester.id, &status.id).await? else {
                    return Ok(None);
                };
                let author = self.db.get_account_by_id(&status.account_id).await?;
                Ok(author.map(|a| {
                    FromFederator::new(ActivityType::Undo, Payload::StatusFave(fave), a)
                }))
            }
            Some("Announce") => {
                let Some(uri) = activity.object_id() else {
                    return Ok(None);
                };
                let Some(boost) = self
                    .db
                    .get_status_by_uri(uri)
                    .await?
                    .filter(|s| s.is_boost() && s.account_id == requester.id)
                else {
                    return Ok(None);
                };
                self.db.delete_status(&boost.id).await?;
                let receiver = self.recipient(activity, requester, inbox_owner).await?;
                Ok(receiver.map(|r| {
                    FromFederator::new(ActivityType::Undo, Payload::Announce(Box::new(boost)), r)
                }))
            }
            Some("Block") => {
                let target = self
                    .required_local_account(activity.inner_object_id())
                    .await?;
                self.db.delete_block(&requester.id, &target.id).await?;
                Ok(None)
            }
            other => {
                debug!(object_type = ?other, "Ignoring Undo of unsupported object");
                Ok(None)
            }
        }
    }

    async fn block(
        &self,
        activity: &Activity,
        requester: &account::Model,
    ) -> AppResult<Option<FromFederator>> {
        let target = self.required_local_account(activity.object_id()).await?;
        if self.db.get_block(&requester.id, &target.id).await?.is_some() {
            return Ok(None);
        }

        let block = self
            .db
            .put_block(block::Model {
                id: self.ids.generate(),
                uri: activity.id.to_string(),
                account_id: requester.id.clone(),
                target_account_id: target.id.clone(),
                created_at: Utc::now().fixed_offset(),
            })
            .await?;

        for (a, b) in [(&requester.id, &target.id), (&target.id, &requester.id)] {
            self.db.delete_follow(a, b).await?;
            self.db.delete_follow_request(a, b).await?;
        }

        Ok(Some(FromFederator::new(
            ActivityType::Create,
            Payload::Block(block),
            target,
        )))
    }

    async fn delete(
        &self,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        let Some(object_uri) = activity.object_id() else {
            return Err(AppError::BadRequest("Delete without object".to_string()));
        };

        if object_uri == requester.uri {
            let receiver = self.recipient(activity, requester, inbox_owner).await?;
            let mut suspended = requester.clone();
            suspended.suspended_at = Some(Utc::now().fixed_offset());
            let suspended = self.db.update_account(suspended).await?;
            info!(account = %requester.uri, "Remote account deleted itself");
            return Ok(receiver.map(|r| {
                FromFederator::new(
                    ActivityType::Delete,
                    Payload::Account(Box::new(suspended)),
                    r,
                )
            }));
        }

        let Some(status) = self.db.get_status_by_uri(object_uri).await? else {
            debug!(uri = %object_uri, "Ignoring delete of unknown object");
            return Ok(None);
        };
        if status.account_id != requester.id {
            return Err(AppError::Unauthorized(format!(
                "{} cannot delete {object_uri}",
                requester.uri
            )));
        }
        let receiver = self.recipient(activity, requester, inbox_owner).await?;
        self.db.delete_status(&status.id).await?;
        Ok(receiver.map(|r| {
            FromFederator::new(ActivityType::Delete, Payload::Status(Box::new(status)), r)
        }))
    }

    async fn update(
        &self,
        federator: &dyn Federator,
        activity: &Activity,
        requester: &account::Model,
        inbox_owner: Option<&account::Model>,
    ) -> AppResult<Option<FromFederator>> {
        if !matches!(
            activity.object_type(),
            Some("Person" | "Service" | "Application" | "Group" | "Organization")
        ) {
            debug!(id = %activity.id, "Ignoring Update of unsupported object");
            return Ok(None);
        }
        if activity.object_id() != Some(requester.uri.as_str()) {
            return Err(AppError::Unauthorized(format!(
                "{} cannot update another actor",
                requester.uri
            )));
        }

        let Some(receiver) = self.recipient(activity, requester, inbox_owner).await? else {
            return Ok(None);
        };
        let uri = Url::parse(&requester.uri)?;
        let refreshed = federator
            .get_account_by_uri(&receiver.username, &uri, true)
            .await?;
        Ok(Some(FromFederator::new(
            ActivityType::Update,
            Payload::Account(Box::new(refreshed)),
            receiver,
        )))
    }

    async fn flag(
        &self,
        activity: &Activity,
        requester: &account::Model,
    ) -> AppResult<Option<FromFederator>> {
        let iris: Vec<&str> = match &activity.object {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(iri) => vec![iri.as_str()],
            _ => Vec::new(),
        };

        let mut target = None;
        let mut status_ids = Vec::new();
        for iri in iris {
            if let Some(account) = self.local_account(iri).await? {
                target.get_or_insert(account);
            } else if let Some(status) = self.db.get_status_by_uri(iri).await? {
                status_ids.push(status.id);
            }
        }
        let Some(target) = target else {
            return Err(AppError::NotFound("reported account".to_string()));
        };

        let report = self
            .db
            .put_report(report::Model {
                id: self.ids.generate(),
                uri: activity.id.to_string(),
                account_id: requester.id.clone(),
                target_account_id: target.id.clone(),
                status_ids: json!(status_ids),
                comment: String::new(),
                forwarded: false,
                action_taken: None,
                action_taken_at: None,
                action_taken_by_account_id: None,
                created_at: Utc::now().fixed_offset(),
            })
            .await?;
        info!(report_id = %report.id, target = %target.id, "Stored remote report");
        Ok(None)
    }
}

/// The local representation of a received boost.
fn boost_status(
    id: String,
    activity: &Activity,
    booster: &account::Model,
    original: &status::Model,
) -> status::Model {
    let visibility = if addresses_public(&activity.to) {
        status::Visibility::Public
    } else if addresses_public(&activity.cc) {
        status::Visibility::Unlisted
    } else {
        status::Visibility::FollowersOnly
    };

    status::Model {
        id,
        uri: activity.id.to_string(),
        url: None,
        content: String::new(),
        content_warning: None,
        visibility,
        sensitive: original.sensitive,
        local: false,
        account_id: booster.id.clone(),
        account_uri: booster.uri.clone(),
        in_reply_to_id: None,
        in_reply_to_account_id: None,
        in_reply_to_uri: None,
        boost_of_id: Some(original.id.clone()),
        boost_of_account_id: Some(original.account_id.clone()),
        mention_account_ids: json!([]),
        attachment_ids: json!([]),
        tags: json!([]),
        federated: true,
        boostable: false,
        replyable: false,
        likeable: false,
        created_at: activity
            .published
            .unwrap_or_else(Utc::now)
            .fixed_offset(),
        updated_at: None,
    }
}
