//! Side effects of activities received from remote servers.
//!
//! The inbox handler has already stored whatever the activity created or
//! removed; what is left here is fan-out, notifications and replies.

use plaza_common::AppResult;
use plaza_db::entities::notification::NotificationKind;
use plaza_queue::{ActivityType, FromFederator, Payload};
use tracing::debug;

use super::effects::SideEffects;

impl SideEffects {
    /// Apply the side effects of one federated message.
    pub async fn process_from_federator(&self, msg: FromFederator) -> AppResult<()> {
        let receiver = &msg.receiving_account;
        match (msg.activity, &msg.object) {
            (ActivityType::Create, Payload::Status(status)) => {
                self.timeline_status(status).await?;
                self.notify_mentions(status).await
            }
            (ActivityType::Create, Payload::Announce(boost)) => {
                self.timeline_status(boost).await?;
                match &boost.boost_of_id {
                    Some(original_id) => {
                        let original = self.status(original_id).await?;
                        self.notify(
                            NotificationKind::Reblog,
                            &original.account_id,
                            &boost.account_id,
                            Some(&original.id),
                        )
                        .await
                    }
                    None => Ok(()),
                }
            }
            (ActivityType::Create, Payload::StatusFave(fave)) => {
                self.notify(
                    NotificationKind::Favourite,
                    &fave.target_account_id,
                    &fave.account_id,
                    Some(&fave.status_id),
                )
                .await
            }
            (ActivityType::Create, Payload::Follow(follow)) => {
                self.notify(
                    NotificationKind::Follow,
                    &follow.target_account_id,
                    &follow.account_id,
                    None,
                )
                .await?;

                // The follow was accepted on arrival; tell the follower.
                let target = self.account(&follow.target_account_id).await?;
                let follower = self.account(&follow.account_id).await?;
                if follower.is_local() {
                    return Ok(());
                }
                let inner = self.converter.follow_to_ap(follow, &follower, &target)?;
                let accept = self.wrap(ActivityType::Accept, &target, &inner)?;
                self.deliver(&target, &accept, [follower.delivery_inbox().to_string()])
                    .await
            }
            (ActivityType::Create, Payload::FollowRequest(request)) => {
                self.notify(
                    NotificationKind::FollowRequest,
                    &request.target_account_id,
                    &request.account_id,
                    None,
                )
                .await
            }
            (ActivityType::Create, Payload::Block(block)) => {
                let removed = self
                    .timelines
                    .remove_all_by_account(&block.target_account_id, &block.account_id)
                    .await;
                debug!(blocker = %block.account_id, removed, "Applied remote block to timeline");
                Ok(())
            }
            (ActivityType::Undo, Payload::Announce(boost))
            | (ActivityType::Delete, Payload::Status(boost)) => {
                self.wipe_status(&boost.id).await;
                Ok(())
            }
            (ActivityType::Delete, Payload::Account(account)) => {
                let removed = self.timelines.remove_account_everywhere(&account.id).await;
                debug!(account_id = %account.id, removed, "Removed deleted account from timelines");
                Ok(())
            }
            (activity, object) => {
                debug!(
                    activity = %activity,
                    object = object.kind(),
                    receiver = %receiver.id,
                    "No further side effects"
                );
                Ok(())
            }
        }
    }
}
