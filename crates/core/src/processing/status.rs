//! Creating, deleting and interacting with statuses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use plaza_common::config::AccountsConfig;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::Database;
use plaza_db::entities::{account, status, status_bookmark, status_fave};
use plaza_federation::UrlConfig;
use plaza_queue::{ActivityType, FromClientApi, Payload, WorkerPool};
use serde_json::json;
use tracing::{debug, info};
use validator::Validate;

use super::enqueue_stored;
use crate::api::{self, StatusCreateForm};
use crate::mention::MentionResolver;
use crate::text;
use crate::typeutils::TypeConverter;
use crate::visibility::Filter;

/// Status operations of the client API.
#[derive(Clone)]
pub struct StatusProcessor {
    db: Arc<dyn Database>,
    filter: Filter,
    converter: Arc<dyn TypeConverter>,
    mentions: MentionResolver,
    client_pool: Arc<WorkerPool<FromClientApi>>,
    ids: Arc<IdGenerator>,
    urls: UrlConfig,
    limits: AccountsConfig,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("status {id} not found"))
}

impl StatusProcessor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<dyn Database>,
        filter: Filter,
        converter: Arc<dyn TypeConverter>,
        mentions: MentionResolver,
        client_pool: Arc<WorkerPool<FromClientApi>>,
        ids: Arc<IdGenerator>,
        urls: UrlConfig,
        limits: AccountsConfig,
    ) -> Self {
        Self {
            db,
            filter,
            converter,
            mentions,
            client_pool,
            ids,
            urls,
            limits,
        }
    }

    /// A status `account` may see, or `NotFound` as if it did not exist.
    async fn visible_status(&self, account: &account::Model, id: &str) -> AppResult<status::Model> {
        let status = self
            .db
            .get_status_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        if !self.filter.status_visible(Some(account), &status).await? {
            return Err(not_found(id));
        }
        Ok(status)
    }

    async fn to_api(&self, account: &account::Model, status: &status::Model) -> AppResult<api::Status> {
        self.converter.status_to_api(status, Some(account)).await
    }

    fn validate_text(&self, form: &StatusCreateForm) -> AppResult<()> {
        form.validate()?;
        let body = form.status.as_deref().unwrap_or_default();
        if body.trim().is_empty() && form.media_ids.is_empty() {
            return Err(AppError::BadRequest(
                "status must contain text or media".to_string(),
            ));
        }
        let chars = body.chars().count();
        if chars > self.limits.max_status_chars {
            return Err(AppError::BadRequest(format!(
                "status too long, {chars} characters provided but limit is {}",
                self.limits.max_status_chars
            )));
        }
        let cw_chars = form.spoiler_text.as_deref().map_or(0, |s| s.chars().count());
        if cw_chars > self.limits.max_content_warning_chars {
            return Err(AppError::BadRequest(format!(
                "content warning too long, {cw_chars} characters provided but limit is {}",
                self.limits.max_content_warning_chars
            )));
        }
        if form.media_ids.len() > self.limits.max_attachments {
            return Err(AppError::BadRequest(format!(
                "too many attachments, {} provided but limit is {}",
                form.media_ids.len(),
                self.limits.max_attachments
            )));
        }
        Ok(())
    }

    /// Post a new status as `account`.
    pub async fn create(
        &self,
        account: &account::Model,
        form: StatusCreateForm,
    ) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        self.validate_text(&form)?;
        let id = self.ids.generate();

        let parent = match &form.in_reply_to_id {
            Some(parent_id) => {
                let parent = self.visible_status(account, parent_id).await?;
                if parent.is_boost() {
                    return Err(AppError::BadRequest(format!(
                        "cannot reply to boost {parent_id}"
                    )));
                }
                if !parent.replyable && parent.account_id != account.id {
                    return Err(AppError::Forbidden(format!(
                        "status {parent_id} does not accept replies"
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let mut attachments = Vec::with_capacity(form.media_ids.len());
        for media_id in &form.media_ids {
            let attachment = self
                .db
                .get_attachment(media_id)
                .await?
                .filter(|a| a.account_id == account.id)
                .ok_or_else(|| AppError::BadRequest(format!("invalid media id {media_id}")))?;
            if attachment.status_id.is_some() {
                return Err(AppError::BadRequest(format!(
                    "media {media_id} is already attached to a status"
                )));
            }
            attachments.push(attachment);
        }

        let body = form.status.clone().unwrap_or_default();
        let mut mention_ids = Vec::new();
        let mut mention_urls = HashMap::new();
        for name in text::extract_mentions(&body) {
            match self.mentions.parse_mention(&name, account).await {
                Ok(mentioned) => {
                    mention_urls.insert(
                        name.key(),
                        mentioned.url.clone().unwrap_or_else(|| mentioned.uri.clone()),
                    );
                    if !mention_ids.contains(&mentioned.id) {
                        mention_ids.push(mentioned.id);
                    }
                }
                Err(AppError::NotFound(_)) => debug!(mention = %name, "Unknown mention"),
                Err(e) => return Err(e),
            }
        }
        let tags = text::extract_tags(&body);

        let now = Utc::now().fixed_offset();
        let status = status::Model {
            uri: self.urls.status_uri(&account.username, &id),
            url: Some(self.urls.status_url(&account.username, &id)),
            content: text::render_plain(&body, &mention_urls, &self.urls),
            content_warning: form.spoiler_text.clone().filter(|s| !s.trim().is_empty()),
            visibility: form.visibility.map_or(status::Visibility::Public, Into::into),
            sensitive: form.sensitive || form.spoiler_text.as_deref().is_some_and(|s| !s.is_empty()),
            local: true,
            account_id: account.id.clone(),
            account_uri: account.uri.clone(),
            in_reply_to_id: parent.as_ref().map(|p| p.id.clone()),
            in_reply_to_account_id: parent.as_ref().map(|p| p.account_id.clone()),
            in_reply_to_uri: parent.as_ref().map(|p| p.uri.clone()),
            boost_of_id: None,
            boost_of_account_id: None,
            mention_account_ids: json!(mention_ids),
            attachment_ids: json!(form.media_ids),
            tags: json!(tags),
            federated: form.federated.unwrap_or(true),
            boostable: form.boostable.unwrap_or(true),
            replyable: form.replyable.unwrap_or(true),
            likeable: form.likeable.unwrap_or(true),
            created_at: now,
            updated_at: None,
            id,
        };
        let status = self.db.put_status(status).await?;
        for mut attachment in attachments {
            attachment.status_id = Some(status.id.clone());
            self.db.update_attachment(attachment).await?;
        }
        info!(status_id = %status.id, account_id = %account.id, "Created status");

        enqueue_stored(
            &self.client_pool,
            FromClientApi::new(
                ActivityType::Create,
                Payload::Status(Box::new(status.clone())),
                account.clone(),
            ),
        )
        .await;
        self.to_api(account, &status).await
    }

    /// Delete one of `account`'s statuses, with every boost of it.
    pub async fn delete(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        let status = self
            .db
            .get_status_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        if status.account_id != account.id {
            return Err(AppError::Forbidden(format!(
                "status {id} does not belong to account {}",
                account.id
            )));
        }
        let api = self.to_api(account, &status).await?;

        for boost in self.db.get_status_boosts(id).await? {
            self.db.delete_status(&boost.id).await?;
        }
        self.db.delete_status(id).await?;
        info!(status_id = %id, "Deleted status");

        enqueue_stored(
            &self.client_pool,
            FromClientApi::new(
                ActivityType::Delete,
                Payload::Status(Box::new(status)),
                account.clone(),
            ),
        )
        .await;
        Ok(api)
    }

    /// Favourite a status. Faving twice is a no-op.
    pub async fn fave(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        let status = self.visible_status(account, id).await?;
        if !status.likeable {
            return Err(AppError::Forbidden(format!("status {id} not likeable")));
        }
        if self.db.get_fave(&account.id, id).await?.is_none() {
            let fave_id = self.ids.generate();
            let fave = self
                .db
                .put_fave(status_fave::Model {
                    uri: self.urls.like_uri(&account.username, &fave_id),
                    id: fave_id,
                    account_id: account.id.clone(),
                    target_account_id: status.account_id.clone(),
                    status_id: status.id.clone(),
                    created_at: Utc::now().fixed_offset(),
                })
                .await?;
            enqueue_stored(
                &self.client_pool,
                FromClientApi::new(
                    ActivityType::Create,
                    Payload::StatusFave(fave),
                    account.clone(),
                ),
            )
            .await;
        }
        self.to_api(account, &status).await
    }

    /// Remove a favourite, if there is one.
    pub async fn unfave(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        let status = self.visible_status(account, id).await?;
        if let Some(fave) = self.db.delete_fave(&account.id, id).await? {
            enqueue_stored(
                &self.client_pool,
                FromClientApi::new(
                    ActivityType::Undo,
                    Payload::StatusFave(fave),
                    account.clone(),
                ),
            )
            .await;
        }
        self.to_api(account, &status).await
    }

    /// Boost a status, or the original when given a boost. Boosting twice
    /// returns the existing boost.
    pub async fn boost(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        let mut target = self.visible_status(account, id).await?;
        if let Some(original_id) = target.boost_of_id.clone() {
            target = self.visible_status(account, &original_id).await?;
        }
        if !self.filter.status_boostable(account, &target).await? {
            return Err(AppError::Forbidden(format!("status {} not boostable", target.id)));
        }
        if let Some(existing) = self.db.get_boost_by_account(&account.id, &target.id).await? {
            return self.to_api(account, &existing).await;
        }

        let boost_id = self.ids.generate();
        let boost = status::Model {
            uri: self.urls.activity_uri(&account.username, &boost_id),
            url: None,
            content: String::new(),
            content_warning: None,
            visibility: target.visibility,
            sensitive: false,
            local: true,
            account_id: account.id.clone(),
            account_uri: account.uri.clone(),
            in_reply_to_id: None,
            in_reply_to_account_id: None,
            in_reply_to_uri: None,
            boost_of_id: Some(target.id.clone()),
            boost_of_account_id: Some(target.account_id.clone()),
            mention_account_ids: json!([]),
            attachment_ids: json!([]),
            tags: json!([]),
            federated: target.federated,
            boostable: false,
            replyable: false,
            likeable: false,
            created_at: Utc::now().fixed_offset(),
            updated_at: None,
            id: boost_id,
        };
        let boost = self.db.put_status(boost).await?;
        info!(boost_id = %boost.id, status_id = %target.id, "Boosted status");

        enqueue_stored(
            &self.client_pool,
            FromClientApi::new(
                ActivityType::Create,
                Payload::Announce(Box::new(boost.clone())),
                account.clone(),
            ),
        )
        .await;
        self.to_api(account, &boost).await
    }

    /// Undo `account`'s boost of a status, if there is one. Returns the
    /// original status.
    pub async fn unboost(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        self.client_pool.ensure_accepting()?;
        let mut target = self.visible_status(account, id).await?;
        if let Some(original_id) = target.boost_of_id.clone() {
            target = self.visible_status(account, &original_id).await?;
        }
        if let Some(boost) = self.db.get_boost_by_account(&account.id, &target.id).await? {
            self.db.delete_status(&boost.id).await?;
            enqueue_stored(
                &self.client_pool,
                FromClientApi::new(
                    ActivityType::Undo,
                    Payload::Announce(Box::new(boost)),
                    account.clone(),
                ),
            )
            .await;
        }
        self.to_api(account, &target).await
    }

    /// Bookmark a status. Bookmarking twice is a no-op.
    pub async fn bookmark(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        let status = self.visible_status(account, id).await?;
        if self.db.get_bookmark(&account.id, id).await?.is_none() {
            self.db
                .put_bookmark(status_bookmark::Model {
                    id: self.ids.generate(),
                    account_id: account.id.clone(),
                    target_account_id: status.account_id.clone(),
                    status_id: status.id.clone(),
                    created_at: Utc::now().fixed_offset(),
                })
                .await?;
        }
        self.to_api(account, &status).await
    }

    pub async fn unbookmark(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        let status = self.visible_status(account, id).await?;
        self.db.delete_bookmark(&account.id, id).await?;
        self.to_api(account, &status).await
    }

    pub async fn get(&self, account: &account::Model, id: &str) -> AppResult<api::Status> {
        let status = self.visible_status(account, id).await?;
        self.to_api(account, &status).await
    }

    /// The visible ancestors (oldest first) and descendants (depth first) of
    /// a status.
    pub async fn context(&self, account: &account::Model, id: &str) -> AppResult<api::Context> {
        let status = self.visible_status(account, id).await?;

        let mut ancestors = Vec::new();
        let mut parent_id = status.in_reply_to_id.clone();
        while let Some(id) = parent_id {
            let Some(parent) = self.db.get_status_by_id(&id).await? else {
                break;
            };
            parent_id = parent.in_reply_to_id.clone();
            if ancestors.iter().any(|a: &status::Model| a.id == parent.id) {
                break;
            }
            ancestors.push(parent);
        }
        ancestors.reverse();
        let ancestors = self.filter.visible_statuses(Some(account), ancestors).await?;

        let mut descendants = Vec::new();
        let mut stack = vec![status.id.clone()];
        while let Some(id) = stack.pop() {
            let replies = self.db.get_status_replies(&id).await?;
            // newest pushed first so the oldest reply is walked first
            for reply in replies.iter().rev() {
                stack.push(reply.id.clone());
            }
            if id != status.id
                && let Some(found) = self.db.get_status_by_id(&id).await?
            {
                descendants.push(found);
            }
        }
        let descendants = self
            .filter
            .visible_statuses(Some(account), descendants)
            .await?;

        self.converter
            .context_to_api(&ancestors, &descendants, Some(account))
            .await
    }

    /// Accounts that boosted a status, without those `account` cannot see.
    pub async fn boosted_by(
        &self,
        account: &account::Model,
        id: &str,
    ) -> AppResult<Vec<api::Account>> {
        let status = self.visible_status(account, id).await?;
        let ids = self
            .db
            .get_status_boosts(&status.id)
            .await?
            .into_iter()
            .map(|b| b.account_id);
        self.visible_accounts(account, ids).await
    }

    /// Accounts that faved a status, without those `account` cannot see.
    pub async fn faved_by(
        &self,
        account: &account::Model,
        id: &str,
    ) -> AppResult<Vec<api::Account>> {
        let status = self.visible_status(account, id).await?;
        let ids = self
            .db
            .get_status_faves(&status.id)
            .await?
            .into_iter()
            .map(|f| f.account_id);
        self.visible_accounts(account, ids).await
    }

    async fn visible_accounts(
        &self,
        viewer: &account::Model,
        ids: impl Iterator<Item = String>,
    ) -> AppResult<Vec<api::Account>> {
        let mut accounts = Vec::new();
        for id in ids {
            let Some(account) = self.db.get_account_by_id(&id).await? else {
                continue;
            };
            if self.filter.account_visible(Some(viewer), &account).await? {
                accounts.push(self.converter.account_to_api(&account).await?);
            }
        }
        Ok(accounts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::FutureExt;
    use plaza_db::test_utils::{MemoryDatabase, fixtures};
    use plaza_federation::test_utils::StubFederator;

    use super::*;
    use crate::typeutils::Converter;

    const HOST: &str = "plaza.test";

    async fn setup() -> (StatusProcessor, Arc<MemoryDatabase>, account::Model, account::Model) {
        let db = Arc::new(MemoryDatabase::new());
        let alice = fixtures::local_account("01a", "alice", HOST);
        let bob = fixtures::local_account("01b", "bob", HOST);
        db.put_account(alice.clone()).await.unwrap();
        db.put_account(bob.clone()).await.unwrap();

        let urls = UrlConfig::new(&format!("https://{HOST}"));
        let pool = Arc::new(WorkerPool::new("client", 1, 16));
        pool.set_processor(|_| async { Ok(()) }.boxed()).unwrap();
        pool.start().unwrap();

        let federator = Arc::new(StubFederator::new(db.clone()));
        let limits = AccountsConfig {
            max_status_chars: 20,
            max_attachments: 1,
            ..AccountsConfig::default()
        };
        let statuses = StatusProcessor::new(
            db.clone(),
            Filter::new(db.clone()),
            Arc::new(Converter::new(db.clone(), urls.clone())),
            MentionResolver::new(db.clone(), federator, urls.clone()),
            pool,
            Arc::new(IdGenerator::new()),
            urls,
            limits,
        );
        (statuses, db, alice, bob)
    }

    fn form(text: &str) -> StatusCreateForm {
        StatusCreateForm {
            status: Some(text.to_string()),
            ..StatusCreateForm::default()
        }
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (statuses, _, alice, _) = setup().await;
        assert!(matches!(
            statuses.create(&alice, form("  ")).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            statuses.create(&alice, form("this is far more than twenty")).await,
            Err(AppError::BadRequest(_))
        ));
        let two_media = StatusCreateForm {
            media_ids: vec!["m1".to_string(), "m2".to_string()],
            ..form("pics")
        };
        assert!(statuses.create(&alice, two_media).await.is_err());
        let unknown_media = StatusCreateForm {
            media_ids: vec!["m1".to_string()],
            ..form("pic")
        };
        assert!(statuses.create(&alice, unknown_media).await.is_err());
    }

    #[tokio::test]
    async fn test_create_parses_tags_and_unknown_mentions() {
        let (statuses, db, alice, bob) = setup().await;
        let created = statuses
            .create(&alice, form("@bob @ghost #Rust"))
            .await
            .unwrap();
        let stored = db.get_status_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.mention_ids(), vec![bob.id]);
        assert_eq!(stored.tag_list(), vec!["rust".to_string()]);
        assert!(stored.content.contains("@ghost"));
        assert_eq!(stored.uri, format!("https://{HOST}/users/alice/statuses/{}", created.id));
    }

    #[tokio::test]
    async fn test_reply_rules() {
        let (statuses, db, alice, bob) = setup().await;
        let mut closed = fixtures::status("01s", &bob, status::Visibility::Public);
        closed.replyable = false;
        db.put_status(closed).await.unwrap();
        let hidden = fixtures::status("01t", &bob, status::Visibility::FollowersOnly);
        db.put_status(hidden).await.unwrap();

        let reply = |id: &str| StatusCreateForm {
            in_reply_to_id: Some(id.to_string()),
            ..form("hi")
        };
        assert!(matches!(
            statuses.create(&alice, reply("01s")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            statuses.create(&alice, reply("01t")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fave_is_idempotent_and_respects_likeable() {
        let (statuses, db, alice, bob) = setup().await;
        db.put_status(fixtures::status("01s", &bob, status::Visibility::Public))
            .await
            .unwrap();
        let mut unlikeable = fixtures::status("01u", &bob, status::Visibility::Public);
        unlikeable.likeable = false;
        db.put_status(unlikeable).await.unwrap();

        statuses.fave(&alice, "01s").await.unwrap();
        let faved = statuses.fave(&alice, "01s").await.unwrap();
        assert!(faved.favourited);
        assert_eq!(db.get_status_faves("01s").await.unwrap().len(), 1);

        assert!(matches!(
            statuses.fave(&alice, "01u").await,
            Err(AppError::Forbidden(_))
        ));

        let unfaved = statuses.unfave(&alice, "01s").await.unwrap();
        assert!(!unfaved.favourited);
    }

    #[tokio::test]
    async fn test_delete_requires_author() {
        let (statuses, db, alice, bob) = setup().await;
        db.put_status(fixtures::status("01s", &bob, status::Visibility::Public))
            .await
            .unwrap();
        db.put_status(fixtures::boost("01t", &alice, &fixtures::status("01s", &bob, status::Visibility::Public)))
            .await
            .unwrap();

        assert!(matches!(
            statuses.delete(&alice, "01s").await,
            Err(AppError::Forbidden(_))
        ));
        statuses.delete(&bob, "01s").await.unwrap();
        assert!(db.get_status_by_id("01s").await.unwrap().is_none());
        assert!(db.get_status_by_id("01t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_orders_thread() {
        let (statuses, db, alice, bob) = setup().await;
        let root = fixtures::status("01r", &bob, status::Visibility::Public);
        let reply = |id: &str, parent: &status::Model, author: &account::Model| status::Model {
            in_reply_to_id: Some(parent.id.clone()),
            in_reply_to_account_id: Some(parent.account_id.clone()),
            ..fixtures::status(id, author, status::Visibility::Public)
        };
        let first = reply("01s", &root, &alice);
        let nested = reply("01t", &first, &bob);
        let second = reply("01u", &root, &alice);
        let private = status::Model {
            visibility: status::Visibility::FollowersOnly,
            ..reply("01v", &root, &bob)
        };
        for s in [&root, &first, &nested, &second, &private] {
            db.put_status(s.clone()).await.unwrap();
        }

        let context = statuses.context(&alice, "01t").await.unwrap();
        let ancestors: Vec<_> = context.ancestors.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ancestors, vec!["01r", "01s"]);
        assert!(context.descendants.is_empty());

        let context = statuses.context(&alice, "01r").await.unwrap();
        let descendants: Vec<_> = context.descendants.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(descendants, vec!["01s", "01t", "01u"]);
    }
}
