//! Visibility policy: who may see which status or account.
//!
//! A deny is `Ok(false)`; `Err` only reports storage faults. Blocks are
//! checked in both directions and always win over follow edges.

use std::sync::Arc;

use plaza_common::AppResult;
use plaza_db::Database;
use plaza_db::entities::{account, status, status::Visibility};

/// Stateless visibility checks over storage.
#[derive(Clone)]
pub struct Filter {
    db: Arc<dyn Database>,
}

impl Filter {
    /// Create a new filter.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Whether `viewer` (`None` when unauthenticated) may see `status`.
    ///
    /// A boost is only visible when the boosted status is too.
    pub async fn status_visible(
        &self,
        viewer: Option<&account::Model>,
        status: &status::Model,
    ) -> AppResult<bool> {
        if !self.visible_ignoring_boost(viewer, status).await? {
            return Ok(false);
        }
        let Some(original_id) = &status.boost_of_id else {
            return Ok(true);
        };
        match self.db.get_status_by_id(original_id).await? {
            Some(original) => self.visible_ignoring_boost(viewer, &original).await,
            None => Ok(false),
        }
    }

    async fn visible_ignoring_boost(
        &self,
        viewer: Option<&account::Model>,
        status: &status::Model,
    ) -> AppResult<bool> {
        let Some(author) = self.db.get_account_by_id(&status.account_id).await? else {
            return Ok(false);
        };
        if author.is_suspended() {
            return Ok(false);
        }

        let Some(viewer) = viewer else {
            return Ok(status.visibility.is_open());
        };
        if viewer.id == author.id {
            return Ok(true);
        }

        let related = [
            Some(author.id.as_str()),
            status.in_reply_to_account_id.as_deref(),
            status.boost_of_account_id.as_deref(),
        ];
        for account_id in related.into_iter().flatten() {
            if account_id != viewer.id && self.db.is_blocked(&viewer.id, account_id, true).await? {
                return Ok(false);
            }
        }

        Ok(match status.visibility {
            Visibility::Public | Visibility::Unlisted => true,
            Visibility::FollowersOnly => self.db.is_following(&viewer.id, &author.id).await?,
            Visibility::Direct => status.mentions(&viewer.id),
        })
    }

    /// Whether `viewer` may see `target`'s profile and relationship
    /// collections: false iff either blocks the other.
    pub async fn account_visible(
        &self,
        viewer: Option<&account::Model>,
        target: &account::Model,
    ) -> AppResult<bool> {
        match viewer {
            Some(viewer) if viewer.id != target.id => {
                Ok(!self.db.is_blocked(&viewer.id, &target.id, true).await?)
            }
            _ => Ok(true),
        }
    }

    /// Whether `status` belongs in `owner`'s home timeline.
    ///
    /// Beyond plain visibility the owner must have asked to see it: they wrote
    /// it, follow its author (or booster), or are mentioned. Muted accounts
    /// are left out, and replies only show when the owner follows the account
    /// being replied to.
    pub async fn status_home_timelineable(
        &self,
        owner: &account::Model,
        status: &status::Model,
    ) -> AppResult<bool> {
        if status.account_id == owner.id {
            return Ok(true);
        }
        if !self.status_visible(Some(owner), status).await? {
            return Ok(false);
        }
        if self.db.is_muted(&owner.id, &status.account_id).await? {
            return Ok(false);
        }

        if let Some(original_author) = &status.boost_of_account_id {
            if original_author != &owner.id
                && self.db.is_muted(&owner.id, original_author).await?
            {
                return Ok(false);
            }
            return Ok(self
                .db
                .get_follow(&owner.id, &status.account_id)
                .await?
                .is_some_and(|f| f.show_reblogs));
        }

        if status.mentions(&owner.id) {
            return Ok(true);
        }
        if !self.db.is_following(&owner.id, &status.account_id).await? {
            return Ok(false);
        }
        if !status.is_reply() {
            return Ok(true);
        }
        match status.in_reply_to_account_id.as_deref() {
            Some(parent) if parent == owner.id || parent == status.account_id => Ok(true),
            Some(parent) => self.db.is_following(&owner.id, parent).await,
            None => Ok(false),
        }
    }

    /// Whether `viewer` may boost `status`. Only the public and unlisted
    /// originals that allow it can be boosted.
    pub async fn status_boostable(
        &self,
        viewer: &account::Model,
        status: &status::Model,
    ) -> AppResult<bool> {
        if status.is_boost() || !status.boostable || !status.visibility.is_open() {
            return Ok(false);
        }
        self.status_visible(Some(viewer), status).await
    }

    /// The subset of `statuses` visible to `viewer`, order preserved.
    pub async fn visible_statuses(
        &self,
        viewer: Option<&account::Model>,
        statuses: Vec<status::Model>,
    ) -> AppResult<Vec<status::Model>> {
        let mut visible = Vec::with_capacity(statuses.len());
        for status in statuses {
            if self.status_visible(viewer, &status).await? {
                visible.push(status);
            }
        }
        Ok(visible)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plaza_db::entities::mute;
    use plaza_db::test_utils::{MemoryDatabase, fixtures};
    use serde_json::json;

    const LEVELS: [Visibility; 4] = [
        Visibility::Direct,
        Visibility::FollowersOnly,
        Visibility::Unlisted,
        Visibility::Public,
    ];

    struct Setup {
        db: Arc<MemoryDatabase>,
        filter: Filter,
        viewer: account::Model,
        author: account::Model,
    }

    async fn setup() -> Setup {
        let db = Arc::new(MemoryDatabase::new());
        let viewer = fixtures::local_account("01v", "viewer", "plaza.test");
        let author = fixtures::remote_account("01a", "author", "remote.test");
        db.put_account(viewer.clone()).await.unwrap();
        db.put_account(author.clone()).await.unwrap();
        Setup {
            filter: Filter::new(db.clone()),
            db,
            viewer,
            author,
        }
    }

    async fn visible_at(s: &Setup, level: Visibility) -> bool {
        let status = fixtures::status("01s", &s.author, level);
        s.filter
            .status_visible(Some(&s.viewer), &status)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_block_dominates_follow() {
        let s = setup().await;
        s.db.put_follow(fixtures::follow("01f", &s.viewer.id, &s.author.id))
            .await
            .unwrap();
        assert!(visible_at(&s, Visibility::FollowersOnly).await);

        s.db.put_block(fixtures::block("01b", &s.author.id, &s.viewer.id))
            .await
            .unwrap();
        for level in LEVELS {
            assert!(!visible_at(&s, level).await, "{level:?} visible despite block");
        }
    }

    #[tokio::test]
    async fn test_block_by_viewer_also_hides() {
        let s = setup().await;
        s.db.put_follow(fixtures::follow("01f", &s.viewer.id, &s.author.id))
            .await
            .unwrap();
        s.db.put_block(fixtures::block("01b", &s.viewer.id, &s.author.id))
            .await
            .unwrap();
        assert!(!visible_at(&s, Visibility::FollowersOnly).await);
        assert!(!visible_at(&s, Visibility::Public).await);
    }

    #[tokio::test]
    async fn test_relaxing_level_never_hides() {
        // Each relationship setup in turn; visibility must be monotonic in level.
        for case in 0..4 {
            let s = setup().await;
            if case & 1 == 1 {
                s.db.put_follow(fixtures::follow("01f", &s.viewer.id, &s.author.id))
                    .await
                    .unwrap();
            }
            if case & 2 == 2 {
                s.db.put_block(fixtures::block("01b", &s.author.id, &s.viewer.id))
                    .await
                    .unwrap();
            }

            let mut seen = false;
            for level in LEVELS {
                let visible = visible_at(&s, level).await;
                assert!(!seen || visible, "case {case}: {level:?} hidden after a stricter level passed");
                seen |= visible;
            }
        }
    }

    #[tokio::test]
    async fn test_followers_only_needs_follow() {
        let s = setup().await;
        assert!(!visible_at(&s, Visibility::FollowersOnly).await);
        assert!(visible_at(&s, Visibility::Unlisted).await);
    }

    #[tokio::test]
    async fn test_direct_needs_mention() {
        let s = setup().await;
        let mut status = fixtures::status("01s", &s.author, Visibility::Direct);
        assert!(!s.filter.status_visible(Some(&s.viewer), &status).await.unwrap());

        status.mention_account_ids = json!([s.viewer.id]);
        assert!(s.filter.status_visible(Some(&s.viewer), &status).await.unwrap());
    }

    #[tokio::test]
    async fn test_unauthenticated_sees_open_levels_only() {
        let s = setup().await;
        for (level, expected) in [
            (Visibility::Public, true),
            (Visibility::Unlisted, true),
            (Visibility::FollowersOnly, false),
            (Visibility::Direct, false),
        ] {
            let status = fixtures::status("01s", &s.author, level);
            assert_eq!(s.filter.status_visible(None, &status).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_author_always_sees_own_status() {
        let s = setup().await;
        let status = fixtures::status("01s", &s.author, Visibility::Direct);
        assert!(s.filter.status_visible(Some(&s.author), &status).await.unwrap());
    }

    #[tokio::test]
    async fn test_suspended_author_is_hidden() {
        let s = setup().await;
        let mut author = s.author.clone();
        author.suspended_at = Some(Utc::now().into());
        s.db.update_account(author).await.unwrap();
        assert!(!visible_at(&s, Visibility::Public).await);
    }

    #[tokio::test]
    async fn test_boost_follows_original() {
        let s = setup().await;
        let carol = fixtures::remote_account("01c", "carol", "other.test");
        s.db.put_account(carol.clone()).await.unwrap();
        let original = fixtures::status("01o", &carol, Visibility::Public);
        s.db.put_status(original.clone()).await.unwrap();
        let boost = fixtures::boost("01s", &s.author, &original);

        assert!(s.filter.status_visible(Some(&s.viewer), &boost).await.unwrap());

        s.db.put_block(fixtures::block("01b", &carol.id, &s.viewer.id))
            .await
            .unwrap();
        assert!(!s.filter.status_visible(Some(&s.viewer), &boost).await.unwrap());
    }

    #[tokio::test]
    async fn test_account_visibility() {
        let s = setup().await;
        assert!(s.filter.account_visible(Some(&s.viewer), &s.author).await.unwrap());
        assert!(s.filter.account_visible(None, &s.author).await.unwrap());

        s.db.put_block(fixtures::block("01b", &s.author.id, &s.viewer.id))
            .await
            .unwrap();
        assert!(!s.filter.account_visible(Some(&s.viewer), &s.author).await.unwrap());
        assert!(!s.filter.account_visible(Some(&s.author), &s.viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_home_timeline_rules() {
        let s = setup().await;
        let status = fixtures::status("01s", &s.author, Visibility::Public);
        assert!(!s.filter.status_home_timelineable(&s.viewer, &status).await.unwrap());

        s.db.put_follow(fixtures::follow("01f", &s.viewer.id, &s.author.id))
            .await
            .unwrap();
        assert!(s.filter.status_home_timelineable(&s.viewer, &status).await.unwrap());

        s.db.put_mute(mute::Model {
            id: "01m".to_string(),
            account_id: s.viewer.id.clone(),
            target_account_id: s.author.id.clone(),
            created_at: Utc::now().into(),
        })
        .await
        .unwrap();
        assert!(!s.filter.status_home_timelineable(&s.viewer, &status).await.unwrap());
    }

    #[tokio::test]
    async fn test_replies_to_strangers_stay_out_of_home() {
        let s = setup().await;
        let stranger = fixtures::remote_account("01x", "stranger", "other.test");
        s.db.put_account(stranger.clone()).await.unwrap();
        s.db.put_follow(fixtures::follow("01f", &s.viewer.id, &s.author.id))
            .await
            .unwrap();

        let mut reply = fixtures::status("01s", &s.author, Visibility::Public);
        reply.in_reply_to_id = Some("01p".to_string());
        reply.in_reply_to_account_id = Some(stranger.id.clone());
        assert!(!s.filter.status_home_timelineable(&s.viewer, &reply).await.unwrap());

        reply.in_reply_to_account_id = Some(s.author.id.clone());
        assert!(s.filter.status_home_timelineable(&s.viewer, &reply).await.unwrap());
    }

    #[tokio::test]
    async fn test_boostable() {
        let s = setup().await;
        let public = fixtures::status("01s", &s.author, Visibility::Public);
        assert!(s.filter.status_boostable(&s.viewer, &public).await.unwrap());

        let private = fixtures::status("01t", &s.author, Visibility::FollowersOnly);
        assert!(!s.filter.status_boostable(&s.viewer, &private).await.unwrap());

        let locked = status::Model {
            boostable: false,
            ..public
        };
        assert!(!s.filter.status_boostable(&s.viewer, &locked).await.unwrap());
    }
}
