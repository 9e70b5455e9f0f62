//! Side effects of actions taken through the client API.

use plaza_common::AppResult;
use plaza_db::entities::{account, notification::NotificationKind, status};
use plaza_federation::Activity;
use plaza_queue::{ActivityType, FromClientApi, Payload};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::effects::SideEffects;

impl SideEffects {
    /// Apply the side effects of one client API message.
    pub async fn process_from_client_api(&self, msg: FromClientApi) -> AppResult<()> {
        let origin = &msg.origin_account;
        match (msg.activity, &msg.object) {
            (ActivityType::Create, Payload::Status(status)) => {
                self.client_create_status(origin, status).await
            }
            (ActivityType::Create, Payload::Announce(boost)) => {
                self.client_create_boost(origin, boost).await
            }
            (ActivityType::Create, Payload::StatusFave(fave)) => {
                self.notify(
                    NotificationKind::Favourite,
                    &fave.target_account_id,
                    &origin.id,
                    Some(&fave.status_id),
                )
                .await?;
                let target = self.account(&fave.target_account_id).await?;
                let status = self.status(&fave.status_id).await?;
                let like = self.converter.fave_to_ap_like(fave, origin, &status)?;
                self.deliver(origin, &like, remote_inbox(&target)).await
            }
            (ActivityType::Create, Payload::Follow(follow)) => {
                let target = self.target(&msg, &follow.target_account_id).await?;
                self.notify(NotificationKind::Follow, &target.id, &origin.id, None)
                    .await?;
                let activity = self.converter.follow_to_ap(follow, origin, &target)?;
                self.deliver(origin, &activity, remote_inbox(&target)).await
            }
            (ActivityType::Create, Payload::FollowRequest(request)) => {
                let target = self.target(&msg, &request.target_account_id).await?;
                self.notify(NotificationKind::FollowRequest, &target.id, &origin.id, None)
                    .await?;
                let activity =
                    self.converter
                        .follow_to_ap(&request.clone().into_follow(), origin, &target)?;
                self.deliver(origin, &activity, remote_inbox(&target)).await
            }
            (ActivityType::Create, Payload::Block(block)) => {
                let target = self.target(&msg, &block.target_account_id).await?;
                self.timelines
                    .remove_all_by_account(&origin.id, &target.id)
                    .await;
                self.timelines
                    .remove_all_by_account(&target.id, &origin.id)
                    .await;
                let activity = self.converter.block_to_ap(block, origin, &target)?;
                self.deliver(origin, &activity, remote_inbox(&target)).await
            }
            (kind @ (ActivityType::Accept | ActivityType::Reject), Payload::Follow(follow)) => {
                // origin is the followed account answering a request
                let follower = self.target(&msg, &follow.account_id).await?;
                let inner = self.converter.follow_to_ap(follow, &follower, origin)?;
                let answer = self.wrap(kind, origin, &inner)?;
                self.deliver(origin, &answer, remote_inbox(&follower)).await
            }
            (ActivityType::Reject, Payload::FollowRequest(request)) => {
                let follower = self.target(&msg, &request.account_id).await?;
                let inner =
                    self.converter
                        .follow_to_ap(&request.clone().into_follow(), &follower, origin)?;
                let answer = self.wrap(ActivityType::Reject, origin, &inner)?;
                self.deliver(origin, &answer, remote_inbox(&follower)).await
            }
            (ActivityType::Undo, Payload::Follow(follow)) => {
                let target = self.target(&msg, &follow.target_account_id).await?;
                self.timelines
                    .remove_all_by_account(&origin.id, &target.id)
                    .await;
                let inner = self.converter.follow_to_ap(follow, origin, &target)?;
                let undo = self.wrap(ActivityType::Undo, origin, &inner)?;
                self.deliver(origin, &undo, remote_inbox(&target)).await
            }
            (ActivityType::Undo, Payload::FollowRequest(request)) => {
                let target = self.target(&msg, &request.target_account_id).await?;
                let inner =
                    self.converter
                        .follow_to_ap(&request.clone().into_follow(), origin, &target)?;
                let undo = self.wrap(ActivityType::Undo, origin, &inner)?;
                self.deliver(origin, &undo, remote_inbox(&target)).await
            }
            (ActivityType::Undo, Payload::StatusFave(fave)) => {
                let target = self.account(&fave.target_account_id).await?;
                let Some(status) = self.db.get_status_by_id(&fave.status_id).await? else {
                    return Ok(());
                };
                let inner = self.converter.fave_to_ap_like(fave, origin, &status)?;
                let undo = self.wrap(ActivityType::Undo, origin, &inner)?;
                self.deliver(origin, &undo, remote_inbox(&target)).await
            }
            (ActivityType::Undo, Payload::Announce(boost)) => {
                self.wipe_status(&boost.id).await;
                let Some(original_id) = &boost.boost_of_id else {
                    return Ok(());
                };
                let Some(original) = self.db.get_status_by_id(original_id).await? else {
                    return Ok(());
                };
                let inner = self.converter.boost_to_ap_announce(boost, origin, &original)?;
                let undo = self.wrap(ActivityType::Undo, origin, &inner)?;
                let mut inboxes = self.follower_inboxes(&origin.id).await?;
                inboxes.extend(self.original_author_inbox(&original).await?);
                self.deliver(origin, &undo, inboxes).await
            }
            (ActivityType::Undo, Payload::Block(block)) => {
                let target = self.target(&msg, &block.target_account_id).await?;
                let inner = self.converter.block_to_ap(block, origin, &target)?;
                let undo = self.wrap(ActivityType::Undo, origin, &inner)?;
                self.deliver(origin, &undo, remote_inbox(&target)).await
            }
            (ActivityType::Delete, Payload::Status(status)) => {
                self.client_delete_status(origin, status).await
            }
            (ActivityType::Delete, Payload::Account(account)) => {
                let removed = self.timelines.remove_account_everywhere(&account.id).await;
                debug!(account_id = %account.id, removed, "Removed suspended account from timelines");
                let activity = Activity::new(
                    ActivityType::Delete,
                    Url::parse(&format!("{}#delete", account.uri))?,
                    Url::parse(&account.uri)?,
                    account.uri.clone(),
                );
                let inboxes = self.follower_inboxes(&account.id).await?;
                self.deliver(account, &activity, inboxes).await
            }
            (ActivityType::Update, Payload::Account(account)) => {
                let person = serde_json::to_value(self.converter.account_to_ap(account)?)?;
                let id = self.urls.activity_uri(&account.username, &self.ids.generate());
                let activity = Activity::new(
                    ActivityType::Update,
                    Url::parse(&id)?,
                    Url::parse(&account.uri)?,
                    person,
                );
                let inboxes = self.follower_inboxes(&account.id).await?;
                self.deliver(account, &activity, inboxes).await
            }
            (ActivityType::Flag, Payload::Report(report)) => {
                if !report.forwarded {
                    return Ok(());
                }
                let target = self.target(&msg, &report.target_account_id).await?;
                let mut object = vec![Value::String(target.uri.clone())];
                for id in report.status_ids.as_array().into_iter().flatten() {
                    if let Some(status) = self.db.get_status_by_id(id.as_str().unwrap_or_default()).await? {
                        object.push(Value::String(status.uri));
                    }
                }
                let flag = Activity::new(
                    ActivityType::Flag,
                    Url::parse(&report.uri)?,
                    Url::parse(&origin.uri)?,
                    Value::Array(object),
                )
                .addressed(vec![Url::parse(&target.uri)?], Vec::new())
                .with_content(report.comment.clone());
                debug!(report_id = %report.id, target = %target.uri, "Forwarding report");
                self.deliver(origin, &flag, remote_inbox(&target)).await
            }
            (activity, object) => {
                debug!(
                    activity = %activity,
                    object = object.kind(),
                    "No client API side effects"
                );
                Ok(())
            }
        }
    }

    async fn target(&self, msg: &FromClientApi, id: &str) -> AppResult<account::Model> {
        match &msg.target_account {
            Some(target) if target.id == id => Ok(target.clone()),
            _ => self.account(id).await,
        }
    }

    async fn original_author_inbox(&self, original: &status::Model) -> AppResult<Option<String>> {
        Ok(self
            .db
            .get_account_by_id(&original.account_id)
            .await?
            .and_then(|a| remote_inbox(&a)))
    }

    async fn client_create_status(
        &self,
        origin: &account::Model,
        status: &status::Model,
    ) -> AppResult<()> {
        self.timeline_status(status).await?;
        self.notify_mentions(status).await?;

        if !status.federated {
            return Ok(());
        }
        let mut inboxes = self.mention_inboxes(status).await?;
        if status.visibility != status::Visibility::Direct {
            inboxes.extend(self.follower_inboxes(&origin.id).await?);
        }
        if let Some(parent_id) = &status.in_reply_to_id
            && let Some(parent) = self.db.get_status_by_id(parent_id).await?
        {
            inboxes.extend(self.original_author_inbox(&parent).await?);
        }
        let create = self.converter.status_to_ap_create(status).await?;
        self.deliver(origin, &create, inboxes).await
    }

    async fn client_create_boost(
        &self,
        origin: &account::Model,
        boost: &status::Model,
    ) -> AppResult<()> {
        self.timeline_status(boost).await?;
        let Some(original_id) = &boost.boost_of_id else {
            return Ok(());
        };
        let original = self.status(original_id).await?;
        self.notify(
            NotificationKind::Reblog,
            &original.account_id,
            &origin.id,
            Some(&original.id),
        )
        .await?;

        let announce = self.converter.boost_to_ap_announce(boost, origin, &original)?;
        let mut inboxes = self.follower_inboxes(&origin.id).await?;
        inboxes.extend(self.original_author_inbox(&original).await?);
        self.deliver(origin, &announce, inboxes).await
    }

    async fn client_delete_status(
        &self,
        origin: &account::Model,
        status: &status::Model,
    ) -> AppResult<()> {
        self.wipe_status(&status.id).await;
        if !status.federated {
            return Ok(());
        }
        let delete = Activity::new(
            ActivityType::Delete,
            Url::parse(&format!("{}#delete", status.uri))?,
            Url::parse(&origin.uri)?,
            status.uri.clone(),
        );
        let mut inboxes = self.mention_inboxes(status).await?;
        if status.visibility != status::Visibility::Direct {
            inboxes.extend(self.follower_inboxes(&origin.id).await?);
        }
        self.deliver(origin, &delete, inboxes).await
    }
}

/// Inbox of `account` when it lives elsewhere.
fn remote_inbox(account: &account::Model) -> Option<String> {
    (!account.is_local()).then(|| account.delivery_inbox().to_string())
}
