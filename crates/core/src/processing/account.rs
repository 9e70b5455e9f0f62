//! Registration, profiles and relationships of accounts.

use std::sync::Arc;

use chrono::Utc;
use plaza_common::config::AccountsConfig;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::entities::{account, block, follow, follow_request, mute, user};
use plaza_db::{AccountStatusesQuery, Database};
use plaza_federation::{UrlConfig, generate_keypair};
use plaza_queue::{ActivityType, FromClientApi, Payload, WorkerPool};
use tracing::info;
use validator::Validate;

use super::enqueue_stored;
use super::user::{check_password_strength, hash_password};
use crate::api::{self, AccountCreateForm, AccountUpdateForm};
use crate::typeutils::TypeConverter;
use crate::visibility::Filter;

/// Shortest reason accepted when registrations need approval.
const MIN_REASON_CHARS: usize = 40;

/// Account operations of the client API.
#[derive(Clone)]
pub struct AccountProcessor {
    db: Arc<dyn Database>,
    filter: Filter,
    converter: Arc<dyn TypeConverter>,
    client_pool: Arc<WorkerPool<FromClientApi>>,
    ids: Arc<IdGenerator>,
    urls: UrlConfig,
    policy: AccountsConfig,
}

impl AccountProcessor {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        filter: Filter,
        converter: Arc<dyn TypeConverter>,
        client_pool: Arc<WorkerPool<FromClientApi>>,
        ids: Arc<IdGenerator>,
        urls: UrlConfig,
        policy: AccountsConfig,
    ) -> Self {
        Self {
            db,
            filter,
            converter,
            client_pool,
            ids,
            urls,
            policy,
        }
    }

    async fn account(&self, id: &str) -> AppResult<account::Model> {
        self.db
            .get_account_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {id} not found")))
    }

    /// Another account `viewer` may interact with: it exists and no block
    /// stands between the two.
    async fn unblocked_target(
        &self,
        viewer: &account::Model,
        id: &str,
    ) -> AppResult<account::Model> {
        let target = self.account(id).await?;
        if self.db.is_blocked(&viewer.id, &target.id, true).await? {
            return Err(AppError::blocked(&viewer.id, &target.id));
        }
        Ok(target)
    }

    async fn enqueue(&self, msg: FromClientApi) {
        enqueue_stored(&self.client_pool, msg).await;
    }

    /// Sign up a new local account.
    pub async fn create(&self, form: AccountCreateForm) -> AppResult<api::Registration> {
        if !self.policy.registration_open {
            return Err(AppError::BadRequest(
                "registration is not open for this server".to_string(),
            ));
        }
        form.validate()?;
        if !form.agreement {
            return Err(AppError::BadRequest(
                "agreement to terms and conditions not given".to_string(),
            ));
        }
        let reason = form.reason.as_deref().map(str::trim).unwrap_or_default();
        if self.policy.approval_required {
            if reason.is_empty() {
                return Err(AppError::BadRequest("no reason provided".to_string()));
            }
            let chars = reason.chars().count();
            if chars < MIN_REASON_CHARS {
                return Err(AppError::BadRequest(format!(
                    "reason should be at least {MIN_REASON_CHARS} chars but '{reason}' was {chars}"
                )));
            }
        }
        check_password_strength(&form.password, self.policy.min_password_length)?;

        if self
            .db
            .get_local_account_by_username(&form.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "username {} is already taken",
                form.username
            )));
        }
        if self.db.get_user_by_email(&form.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "email {} is already in use",
                form.email
            )));
        }

        let encrypted_password = hash_password(&form.password)?;
        let keys = tokio::task::spawn_blocking(generate_keypair)
            .await
            .map_err(|e| AppError::Internal(format!("Key generation task failed: {e}")))??;

        let username = form.username;
        let now = Utc::now().fixed_offset();
        let account = self
            .db
            .put_account(account::Model {
                id: self.ids.generate(),
                display_name: Some(username.clone()),
                note: None,
                uri: self.urls.user_uri(&username),
                url: Some(self.urls.profile_url(&username)),
                inbox_uri: self.urls.inbox_uri(&username),
                shared_inbox_uri: Some(self.urls.shared_inbox_uri()),
                outbox_uri: self.urls.outbox_uri(&username),
                followers_uri: self.urls.followers_uri(&username),
                following_uri: self.urls.following_uri(&username),
                public_key_pem: keys.public_key_pem,
                private_key_pem: Some(keys.private_key_pem),
                public_key_uri: self.urls.public_key_uri(&username),
                username,
                domain: None,
                locked: false,
                bot: false,
                discoverable: true,
                suspended_at: None,
                created_at: now,
                updated_at: None,
            })
            .await?;

        let approved = !self.policy.approval_required;
        self.db
            .put_user(user::Model {
                id: self.ids.generate(),
                account_id: account.id.clone(),
                email: form.email,
                encrypted_password,
                confirmation_token: Some(self.ids.generate_token()),
                confirmed_at: None,
                approved,
                admin: false,
                moderator: false,
                created_at: now,
            })
            .await?;
        info!(account_id = %account.id, username = %account.username, approved, "Registered account");

        Ok(api::Registration {
            account: self.converter.account_to_api(&account).await?,
            approval_pending: !approved,
        })
    }

    /// Change profile fields of `account`.
    pub async fn update(
        &self,
        account: &account::Model,
        form: AccountUpdateForm,
    ) -> AppResult<api::Account> {
        self.client_pool.ensure_accepting()?;
        form.validate()?;
        let mut updated = account.clone();
        if let Some(display_name) = form.display_name {
            updated.display_name = Some(display_name).filter(|d| !d.trim().is_empty());
        }
        if let Some(note) = form.note {
            updated.note = Some(note).filter(|n| !n.trim().is_empty());
        }
        if let Some(locked) = form.locked {
            updated.locked = locked;
        }
        if let Some(bot) = form.bot {
            updated.bot = bot;
        }
        if let Some(discoverable) = form.discoverable {
            updated.discoverable = discoverable;
        }
        updated.updated_at = Some(Utc::now().fixed_offset());
        let updated = self.db.update_account(updated).await?;

        self.enqueue(FromClientApi::new(
            ActivityType::Update,
            Payload::Account(Box::new(updated.clone())),
            updated.clone(),
        ))
        .await;
        self.converter.account_to_api(&updated).await
    }

    /// An account as seen by `viewer`.
    pub async fn get(&self, viewer: &account::Model, id: &str) -> AppResult<api::Account> {
        let target = self.account(id).await?;
        if !self.filter.account_visible(Some(viewer), &target).await? {
            return Err(AppError::blocked(&viewer.id, &target.id));
        }
        self.converter.account_to_api(&target).await
    }

    /// A page of an account's statuses, without those `viewer` may not see.
    pub async fn statuses(
        &self,
        viewer: &account::Model,
        query: AccountStatusesQuery,
    ) -> AppResult<Vec<api::Status>> {
        let target = self.account(&query.account_id).await?;
        if !self.filter.account_visible(Some(viewer), &target).await? {
            return Err(AppError::blocked(&viewer.id, &target.id));
        }
        let statuses = self.db.get_account_statuses(&query).await?;
        let statuses = self.filter.visible_statuses(Some(viewer), statuses).await?;
        let mut out = Vec::with_capacity(statuses.len());
        for status in &statuses {
            out.push(self.converter.status_to_api(status, Some(viewer)).await?);
        }
        Ok(out)
    }

    /// Accounts following `id`.
    pub async fn followers(&self, viewer: &account::Model, id: &str) -> AppResult<Vec<api::Account>> {
        let target = self.account(id).await?;
        if !self.filter.account_visible(Some(viewer), &target).await? {
            return Err(AppError::blocked(&viewer.id, &target.id));
        }
        let ids = self
            .db
            .get_followers(&target.id)
            .await?
            .into_iter()
            .map(|f| f.account_id);
        self.visible_accounts(viewer, ids).await
    }

    /// Accounts `id` follows.
    pub async fn following(&self, viewer: &account::Model, id: &str) -> AppResult<Vec<api::Account>> {
        let target = self.account(id).await?;
        if !self.filter.account_visible(Some(viewer), &target).await? {
            return Err(AppError::blocked(&viewer.id, &target.id));
        }
        let ids = self
            .db
            .get_following(&target.id)
            .await?
            .into_iter()
            .map(|f| f.target_account_id);
        self.visible_accounts(viewer, ids).await
    }

    async fn visible_accounts(
        &self,
        viewer: &account::Model,
        ids: impl Iterator<Item = String>,
    ) -> AppResult<Vec<api::Account>> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(account) = self.db.get_account_by_id(&id).await?
                && self.filter.account_visible(Some(viewer), &account).await?
            {
                out.push(self.converter.account_to_api(&account).await?);
            }
        }
        Ok(out)
    }

    /// How `account` relates to `target_id`.
    pub async fn relationship(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        let follow = self.db.get_follow(&account.id, target_id).await?;
        Ok(api::Relationship {
            id: target_id.to_string(),
            following: follow.is_some(),
            showing_reblogs: follow.as_ref().is_some_and(|f| f.show_reblogs),
            notifying: follow.as_ref().is_some_and(|f| f.notify),
            followed_by: self.db.is_following(target_id, &account.id).await?,
            blocking: self.db.is_blocked(&account.id, target_id, false).await?,
            blocked_by: self.db.is_blocked(target_id, &account.id, false).await?,
            muting: self.db.is_muted(&account.id, target_id).await?,
            requested: self
                .db
                .get_follow_request(&account.id, target_id)
                .await?
                .is_some(),
        })
    }

    /// Follow `target_id`. Locked and remote targets get a follow request
    /// that waits for their answer.
    pub async fn follow(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        if account.id == target_id {
            return Err(AppError::BadRequest("account cannot follow itself".to_string()));
        }
        let target = self.unblocked_target(account, target_id).await?;
        if self.db.is_following(&account.id, &target.id).await?
            || self
                .db
                .get_follow_request(&account.id, &target.id)
                .await?
                .is_some()
        {
            return self.relationship(account, &target.id).await;
        }

        let id = self.ids.generate();
        let uri = self.urls.follow_uri(&account.username, &id);
        let now = Utc::now().fixed_offset();
        let msg = if target.locked || !target.is_local() {
            let request = self
                .db
                .put_follow_request(follow_request::Model {
                    id,
                    uri,
                    account_id: account.id.clone(),
                    target_account_id: target.id.clone(),
                    show_reblogs: true,
                    notify: false,
                    created_at: now,
                })
                .await?;
            FromClientApi::new(
                ActivityType::Create,
                Payload::FollowRequest(request),
                account.clone(),
            )
        } else {
            let follow = self
                .db
                .put_follow(follow::Model {
                    id,
                    uri,
                    account_id: account.id.clone(),
                    target_account_id: target.id.clone(),
                    show_reblogs: true,
                    notify: false,
                    created_at: now,
                })
                .await?;
            FromClientApi::new(ActivityType::Create, Payload::Follow(follow), account.clone())
        };
        info!(account_id = %account.id, target_id = %target.id, "Followed account");
        self.enqueue(msg.with_target(target.clone())).await;
        self.relationship(account, &target.id).await
    }

    /// Stop following `target_id`, or withdraw a pending request.
    pub async fn unfollow(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        let target = self.account(target_id).await?;
        if let Some(follow) = self.db.delete_follow(&account.id, &target.id).await? {
            self.enqueue(
                FromClientApi::new(ActivityType::Undo, Payload::Follow(follow), account.clone())
                    .with_target(target.clone()),
            )
            .await;
        }
        if let Some(request) = self.db.delete_follow_request(&account.id, &target.id).await? {
            self.enqueue(
                FromClientApi::new(
                    ActivityType::Undo,
                    Payload::FollowRequest(request),
                    account.clone(),
                )
                .with_target(target.clone()),
            )
            .await;
        }
        self.relationship(account, &target.id).await
    }

    /// Block `target_id`, dropping every follow and request between the two.
    pub async fn block(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        if account.id == target_id {
            return Err(AppError::BadRequest("account cannot block itself".to_string()));
        }
        let target = self.account(target_id).await?;
        if self.db.get_block(&account.id, &target.id).await?.is_some() {
            return self.relationship(account, &target.id).await;
        }

        let id = self.ids.generate();
        let block = self
            .db
            .put_block(block::Model {
                uri: self.urls.block_uri(&account.username, &id),
                id,
                account_id: account.id.clone(),
                target_account_id: target.id.clone(),
                created_at: Utc::now().fixed_offset(),
            })
            .await?;
        self.db.delete_follow(&account.id, &target.id).await?;
        self.db.delete_follow(&target.id, &account.id).await?;
        self.db.delete_follow_request(&account.id, &target.id).await?;
        self.db.delete_follow_request(&target.id, &account.id).await?;
        info!(account_id = %account.id, target_id = %target.id, "Blocked account");

        self.enqueue(
            FromClientApi::new(ActivityType::Create, Payload::Block(block), account.clone())
                .with_target(target.clone()),
        )
        .await;
        self.relationship(account, &target.id).await
    }

    pub async fn unblock(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        let target = self.account(target_id).await?;
        if let Some(block) = self.db.delete_block(&account.id, &target.id).await? {
            self.enqueue(
                FromClientApi::new(ActivityType::Undo, Payload::Block(block), account.clone())
                    .with_target(target.clone()),
            )
            .await;
        }
        self.relationship(account, &target.id).await
    }

    /// Pending requests to follow `account`.
    pub async fn follow_requests(&self, account: &account::Model) -> AppResult<Vec<api::Account>> {
        let mut out = Vec::new();
        for request in self.db.get_follow_requests_for(&account.id).await? {
            if let Some(requester) = self.db.get_account_by_id(&request.account_id).await? {
                out.push(self.converter.account_to_api(&requester).await?);
            }
        }
        Ok(out)
    }

    /// Turn the request from `requester_id` into a follow.
    pub async fn follow_request_accept(
        &self,
        account: &account::Model,
        requester_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        let requester = self.unblocked_target(account, requester_id).await?;
        let request = self
            .db
            .delete_follow_request(&requester.id, &account.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no follow request from {requester_id}"))
            })?;
        let follow = self.db.put_follow(request.into_follow()).await?;
        info!(account_id = %account.id, requester_id, "Accepted follow request");

        self.enqueue(
            FromClientApi::new(ActivityType::Accept, Payload::Follow(follow), account.clone())
                .with_target(requester.clone()),
        )
        .await;
        self.relationship(account, &requester.id).await
    }

    pub async fn follow_request_reject(
        &self,
        account: &account::Model,
        requester_id: &str,
    ) -> AppResult<api::Relationship> {
        self.client_pool.ensure_accepting()?;
        let requester = self.account(requester_id).await?;
        let request = self
            .db
            .delete_follow_request(&requester.id, &account.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no follow request from {requester_id}"))
            })?;
        self.enqueue(
            FromClientApi::new(
                ActivityType::Reject,
                Payload::FollowRequest(request),
                account.clone(),
            )
            .with_target(requester.clone()),
        )
        .await;
        self.relationship(account, &requester.id).await
    }

    /// Hide `target_id` from notifications and the home timeline. Mutes stay
    /// local.
    pub async fn mute(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        if account.id == target_id {
            return Err(AppError::BadRequest("account cannot mute itself".to_string()));
        }
        let target = self.account(target_id).await?;
        if !self.db.is_muted(&account.id, &target.id).await? {
            self.db
                .put_mute(mute::Model {
                    id: self.ids.generate(),
                    account_id: account.id.clone(),
                    target_account_id: target.id.clone(),
                    created_at: Utc::now().fixed_offset(),
                })
                .await?;
        }
        self.relationship(account, &target.id).await
    }

    pub async fn unmute(
        &self,
        account: &account::Model,
        target_id: &str,
    ) -> AppResult<api::Relationship> {
        let target = self.account(target_id).await?;
        self.db.delete_mute(&account.id, &target.id).await?;
        self.relationship(account, &target.id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::FutureExt;
    use plaza_db::test_utils::{MemoryDatabase, fixtures};

    use super::*;
    use crate::typeutils::Converter;

    const HOST: &str = "plaza.test";

    fn processor(db: &Arc<MemoryDatabase>, policy: AccountsConfig) -> AccountProcessor {
        let urls = UrlConfig::new(&format!("https://{HOST}"));
        let pool = Arc::new(WorkerPool::new("client", 1, 16));
        pool.set_processor(|_| async { Ok(()) }.boxed()).unwrap();
        pool.start().unwrap();
        AccountProcessor::new(
            db.clone(),
            Filter::new(db.clone()),
            Arc::new(Converter::new(db.clone(), urls.clone())),
            pool,
            Arc::new(IdGenerator::new()),
            urls,
            policy,
        )
    }

    fn registration(username: &str) -> AccountCreateForm {
        AccountCreateForm {
            username: username.to_string(),
            email: format!("{username}@{HOST}"),
            password: "Correct-horse-9".to_string(),
            reason: None,
            locale: "en".to_string(),
            agreement: true,
        }
    }

    #[tokio::test]
    async fn test_registration_policy() {
        let db = Arc::new(MemoryDatabase::new());
        let closed = processor(
            &db,
            AccountsConfig {
                registration_open: false,
                ..AccountsConfig::default()
            },
        );
        assert!(matches!(
            closed.create(registration("alice")).await,
            Err(AppError::BadRequest(_))
        ));

        let moderated = processor(
            &db,
            AccountsConfig {
                approval_required: true,
                ..AccountsConfig::default()
            },
        );
        let short_reason = AccountCreateForm {
            reason: Some("let me in".to_string()),
            ..registration("alice")
        };
        let err = moderated.create(short_reason).await.unwrap_err();
        assert!(err.to_string().contains("should be at least 40 chars"));

        let weak = AccountCreateForm {
            password: "password".to_string(),
            ..registration("alice")
        };
        assert!(processor(&db, AccountsConfig::default()).create(weak).await.is_err());
    }

    #[tokio::test]
    async fn test_registration_creates_account_and_user() {
        let db = Arc::new(MemoryDatabase::new());
        let accounts = processor(&db, AccountsConfig::default());

        let registered = accounts.create(registration("alice")).await.unwrap();
        assert!(!registered.approval_pending);
        assert_eq!(registered.account.username, "alice");

        let account = db.get_local_account_by_username("alice").await.unwrap().unwrap();
        assert_eq!(account.uri, format!("https://{HOST}/users/alice"));
        assert!(account.private_key_pem.is_some());
        let user = db.get_user_by_account_id(&account.id).await.unwrap().unwrap();
        assert!(user.encrypted_password.starts_with("$argon2"));
        assert!(user.confirmation_token.is_some());

        let taken = accounts.create(registration("alice")).await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_follow_locked_account_needs_approval() {
        let db = Arc::new(MemoryDatabase::new());
        let alice = fixtures::local_account("01a", "alice", HOST);
        let bob = account::Model {
            locked: true,
            ..fixtures::local_account("01b", "bob", HOST)
        };
        db.put_account(alice.clone()).await.unwrap();
        db.put_account(bob.clone()).await.unwrap();
        let accounts = processor(&db, AccountsConfig::default());

        assert!(accounts.follow(&alice, &alice.id).await.is_err());

        let relationship = accounts.follow(&alice, &bob.id).await.unwrap();
        assert!(relationship.requested);
        assert!(!relationship.following);
        assert_eq!(accounts.follow_requests(&bob).await.unwrap().len(), 1);

        accounts.follow_request_accept(&bob, &alice.id).await.unwrap();
        let relationship = accounts.relationship(&alice, &bob.id).await.unwrap();
        assert!(relationship.following);
        assert!(!relationship.requested);

        let relationship = accounts.unfollow(&alice, &bob.id).await.unwrap();
        assert!(!relationship.following);
    }

    #[tokio::test]
    async fn test_block_removes_follows_both_ways() {
        let db = Arc::new(MemoryDatabase::new());
        let alice = fixtures::local_account("01a", "alice", HOST);
        let bob = fixtures::local_account("01b", "bob", HOST);
        db.put_account(alice.clone()).await.unwrap();
        db.put_account(bob.clone()).await.unwrap();
        db.put_follow(fixtures::follow("01f", &alice.id, &bob.id)).await.unwrap();
        db.put_follow(fixtures::follow("01g", &bob.id, &alice.id)).await.unwrap();
        let accounts = processor(&db, AccountsConfig::default());

        let relationship = accounts.block(&alice, &bob.id).await.unwrap();
        assert!(relationship.blocking);
        assert!(!relationship.following);
        assert!(!relationship.followed_by);

        assert!(matches!(
            accounts.get(&bob, &alice.id).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(accounts.followers(&bob, &alice.id).await.is_err());

        let relationship = accounts.unblock(&alice, &bob.id).await.unwrap();
        assert!(!relationship.blocking);
        assert!(accounts.get(&bob, &alice.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_and_mute() {
        let db = Arc::new(MemoryDatabase::new());
        let alice = fixtures::local_account("01a", "alice", HOST);
        let bob = fixtures::local_account("01b", "bob", HOST);
        db.put_account(alice.clone()).await.unwrap();
        db.put_account(bob.clone()).await.unwrap();
        let accounts = processor(&db, AccountsConfig::default());

        let form = AccountUpdateForm {
            display_name: Some("Alice A.".to_string()),
            locked: Some(true),
            ..AccountUpdateForm::default()
        };
        let updated = accounts.update(&alice, form).await.unwrap();
        assert_eq!(updated.display_name, "Alice A.");
        assert!(updated.locked);

        assert!(accounts.mute(&alice, &bob.id).await.unwrap().muting);
        assert!(!accounts.unmute(&alice, &bob.id).await.unwrap().muting);
    }
}
