//! Test utilities: an in-memory [`Database`] and entity fixtures.
//!
//! Enabled for other crates through the `test-utils` feature.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use plaza_common::{AppError, AppResult};
use tokio::sync::RwLock;

use crate::database::{AccountStatusesQuery, Database};
use crate::entities::{
    account, block, domain_block, follow, follow_request, media_attachment, mute, notification,
    report, status, status_bookmark, status_fave, user,
};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<String, account::Model>,
    users: BTreeMap<String, user::Model>,
    statuses: BTreeMap<String, status::Model>,
    follows: BTreeMap<String, follow::Model>,
    follow_requests: BTreeMap<String, follow_request::Model>,
    blocks: BTreeMap<String, block::Model>,
    mutes: BTreeMap<String, mute::Model>,
    faves: BTreeMap<String, status_fave::Model>,
    bookmarks: BTreeMap<String, status_bookmark::Model>,
    attachments: BTreeMap<String, media_attachment::Model>,
    reports: BTreeMap<String, report::Model>,
    domain_blocks: BTreeMap<String, domain_block::Model>,
    notifications: BTreeMap<String, notification::Model>,
}

fn duplicate(table: &str, id: &str) -> AppError {
    AppError::Database(format!("duplicate key in {table}: {id}"))
}

fn missing(table: &str, id: &str) -> AppError {
    AppError::Database(format!("no row in {table} with id {id}"))
}

/// In-memory storage with the same semantics as [`crate::SeaOrmDatabase`].
///
/// Every table is a `BTreeMap` keyed by ID, so iteration order is ID order.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored statuses.
    pub async fn status_count(&self) -> usize {
        self.tables.read().await.statuses.len()
    }
}

fn find_pair<'a, T>(
    table: &'a BTreeMap<String, T>,
    pair: impl Fn(&T) -> (&str, &str),
    a: &str,
    b: &str,
) -> Option<&'a T> {
    table.values().find(|row| pair(row) == (a, b))
}

fn remove_pair<T: Clone>(
    table: &mut BTreeMap<String, T>,
    pair: impl Fn(&T) -> (&str, &str),
    id: impl Fn(&T) -> &str,
    a: &str,
    b: &str,
) -> Option<T> {
    let key = table
        .values()
        .find(|row| pair(row) == (a, b))
        .map(|row| id(row).to_string())?;
    table.remove(&key)
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_account_by_id(&self, id: &str) -> AppResult<Option<account::Model>> {
        Ok(self.tables.read().await.accounts.get(id).cloned())
    }

    async fn get_account_by_uri(&self, uri: &str) -> AppResult<Option<account::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.uri == uri)
            .cloned())
    }

    async fn get_account_by_username_domain(
        &self,
        username: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<account::Model>> {
        let domain = domain.map(str::to_lowercase);
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username) && a.domain == domain)
            .cloned())
    }

    async fn get_accounts_by_domain(&self, domain: &str) -> AppResult<Vec<account::Model>> {
        let domain = domain.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .filter(|a| a.domain.as_deref() == Some(domain.as_str()))
            .cloned()
            .collect())
    }

    async fn put_account(&self, account: account::Model) -> AppResult<account::Model> {
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(&account.id)
            || tables.accounts.values().any(|a| a.uri == account.uri)
        {
            return Err(duplicate("account", &account.id));
        }
        tables
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn update_account(&self, account: account::Model) -> AppResult<account::Model> {
        let mut tables = self.tables.write().await;
        let row = tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| missing("account", &account.id))?;
        *row = account.clone();
        Ok(account)
    }

    async fn get_user_by_account_id(&self, account_id: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.account_id == account_id)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn put_user(&self, user: user::Model) -> AppResult<user::Model> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(duplicate("user", &user.id));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: user::Model) -> AppResult<user::Model> {
        let mut tables = self.tables.write().await;
        let row = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| missing("user", &user.id))?;
        *row = user.clone();
        Ok(user)
    }

    async fn get_status_by_id(&self, id: &str) -> AppResult<Option<status::Model>> {
        Ok(self.tables.read().await.statuses.get(id).cloned())
    }

    async fn get_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .values()
            .find(|s| s.uri == uri)
            .cloned())
    }

    async fn put_status(&self, status: status::Model) -> AppResult<status::Model> {
        let mut tables = self.tables.write().await;
        if tables.statuses.contains_key(&status.id) {
            return Err(duplicate("status", &status.id));
        }
        tables.statuses.insert(status.id.clone(), status.clone());
        Ok(status)
    }

    async fn delete_status(&self, id: &str) -> AppResult<()> {
        self.tables.write().await.statuses.remove(id);
        Ok(())
    }

    async fn get_account_statuses(
        &self,
        query: &AccountStatusesQuery,
    ) -> AppResult<Vec<status::Model>> {
        let tables = self.tables.read().await;
        let matching = tables.statuses.values().filter(|s| query.matches(s));

        // BTreeMap iterates in ascending ID order
        let statuses = if query.ascending() {
            let mut page: Vec<_> = matching.take(query.limit).cloned().collect();
            page.reverse();
            page
        } else {
            let all: Vec<_> = matching.collect();
            all.into_iter().rev().take(query.limit).cloned().collect()
        };
        Ok(statuses)
    }

    async fn get_status_replies(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .values()
            .filter(|s| s.in_reply_to_id.as_deref() == Some(status_id))
            .cloned()
            .collect())
    }

    async fn get_status_boosts(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .values()
            .rev()
            .filter(|s| s.boost_of_id.as_deref() == Some(status_id))
            .cloned()
            .collect())
    }

    async fn get_boost_by_account(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .statuses
            .values()
            .find(|s| s.account_id == account_id && s.boost_of_id.as_deref() == Some(status_id))
            .cloned())
    }

    async fn get_home_timeline_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<status::Model>> {
        let tables = self.tables.read().await;
        let followed: Vec<&str> = tables
            .follows
            .values()
            .filter(|f| f.account_id == account_id)
            .map(|f| f.target_account_id.as_str())
            .collect();

        let candidates = tables
            .statuses
            .values()
            .filter(|s| s.account_id == account_id || followed.contains(&s.account_id.as_str()))
            .filter(|s| max_id.is_none_or(|max| s.id.as_str() < max))
            .filter(|s| min_id.is_none_or(|min| s.id.as_str() > min));

        if min_id.is_some() && max_id.is_none() {
            let mut page: Vec<_> = candidates.take(limit).cloned().collect();
            page.reverse();
            return Ok(page);
        }
        Ok(candidates.rev().take(limit).cloned().collect())
    }

    async fn is_blocked(
        &self,
        account_id: &str,
        target_account_id: &str,
        either_direction: bool,
    ) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.blocks.values().any(|b| {
            (b.account_id == account_id && b.target_account_id == target_account_id)
                || (either_direction
                    && b.account_id == target_account_id
                    && b.target_account_id == account_id)
        }))
    }

    async fn get_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.blocks,
            |b| (b.account_id.as_str(), b.target_account_id.as_str()),
            account_id,
            target_account_id,
        )
        .cloned())
    }

    async fn put_block(&self, block: block::Model) -> AppResult<block::Model> {
        let mut tables = self.tables.write().await;
        if tables.blocks.values().any(|b| {
            b.account_id == block.account_id && b.target_account_id == block.target_account_id
        }) {
            return Err(duplicate("block", &block.id));
        }
        tables.blocks.insert(block.id.clone(), block.clone());
        Ok(block)
    }

    async fn delete_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.blocks,
            |b| (b.account_id.as_str(), b.target_account_id.as_str()),
            |b| b.id.as_str(),
            account_id,
            target_account_id,
        ))
    }

    async fn get_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.follows,
            |f| (f.account_id.as_str(), f.target_account_id.as_str()),
            account_id,
            target_account_id,
        )
        .cloned())
    }

    async fn put_follow(&self, follow: follow::Model) -> AppResult<follow::Model> {
        let mut tables = self.tables.write().await;
        if tables.follows.values().any(|f| {
            f.account_id == follow.account_id && f.target_account_id == follow.target_account_id
        }) {
            return Err(duplicate("follow", &follow.id));
        }
        tables.follows.insert(follow.id.clone(), follow.clone());
        Ok(follow)
    }

    async fn delete_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.follows,
            |f| (f.account_id.as_str(), f.target_account_id.as_str()),
            |f| f.id.as_str(),
            account_id,
            target_account_id,
        ))
    }

    async fn get_followers(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .values()
            .rev()
            .filter(|f| f.target_account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_following(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .values()
            .rev()
            .filter(|f| f.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.follow_requests,
            |r| (r.account_id.as_str(), r.target_account_id.as_str()),
            account_id,
            target_account_id,
        )
        .cloned())
    }

    async fn put_follow_request(
        &self,
        request: follow_request::Model,
    ) -> AppResult<follow_request::Model> {
        let mut tables = self.tables.write().await;
        if tables.follow_requests.contains_key(&request.id) {
            return Err(duplicate("follow_request", &request.id));
        }
        tables
            .follow_requests
            .insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn delete_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.follow_requests,
            |r| (r.account_id.as_str(), r.target_account_id.as_str()),
            |r| r.id.as_str(),
            account_id,
            target_account_id,
        ))
    }

    async fn get_follow_requests_for(
        &self,
        target_account_id: &str,
    ) -> AppResult<Vec<follow_request::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .follow_requests
            .values()
            .rev()
            .filter(|r| r.target_account_id == target_account_id)
            .cloned()
            .collect())
    }

    async fn is_muted(&self, account_id: &str, target_account_id: &str) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.mutes,
            |m| (m.account_id.as_str(), m.target_account_id.as_str()),
            account_id,
            target_account_id,
        )
        .is_some())
    }

    async fn put_mute(&self, mute: mute::Model) -> AppResult<mute::Model> {
        let mut tables = self.tables.write().await;
        if tables.mutes.contains_key(&mute.id) {
            return Err(duplicate("mute", &mute.id));
        }
        tables.mutes.insert(mute.id.clone(), mute.clone());
        Ok(mute)
    }

    async fn delete_mute(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<mute::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.mutes,
            |m| (m.account_id.as_str(), m.target_account_id.as_str()),
            |m| m.id.as_str(),
            account_id,
            target_account_id,
        ))
    }

    async fn get_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.faves,
            |f| (f.account_id.as_str(), f.status_id.as_str()),
            account_id,
            status_id,
        )
        .cloned())
    }

    async fn get_status_faves(&self, status_id: &str) -> AppResult<Vec<status_fave::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .faves
            .values()
            .filter(|f| f.status_id == status_id)
            .cloned()
            .collect())
    }

    async fn put_fave(&self, fave: status_fave::Model) -> AppResult<status_fave::Model> {
        let mut tables = self.tables.write().await;
        if tables.faves.contains_key(&fave.id) {
            return Err(duplicate("status_fave", &fave.id));
        }
        tables.faves.insert(fave.id.clone(), fave.clone());
        Ok(fave)
    }

    async fn delete_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.faves,
            |f| (f.account_id.as_str(), f.status_id.as_str()),
            |f| f.id.as_str(),
            account_id,
            status_id,
        ))
    }

    async fn get_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        let tables = self.tables.read().await;
        Ok(find_pair(
            &tables.bookmarks,
            |b| (b.account_id.as_str(), b.status_id.as_str()),
            account_id,
            status_id,
        )
        .cloned())
    }

    async fn put_bookmark(
        &self,
        bookmark: status_bookmark::Model,
    ) -> AppResult<status_bookmark::Model> {
        let mut tables = self.tables.write().await;
        if tables.bookmarks.contains_key(&bookmark.id) {
            return Err(duplicate("status_bookmark", &bookmark.id));
        }
        tables
            .bookmarks
            .insert(bookmark.id.clone(), bookmark.clone());
        Ok(bookmark)
    }

    async fn delete_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        let mut tables = self.tables.write().await;
        Ok(remove_pair(
            &mut tables.bookmarks,
            |b| (b.account_id.as_str(), b.status_id.as_str()),
            |b| b.id.as_str(),
            account_id,
            status_id,
        ))
    }

    async fn get_attachment(&self, id: &str) -> AppResult<Option<media_attachment::Model>> {
        Ok(self.tables.read().await.attachments.get(id).cloned())
    }

    async fn put_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        let mut tables = self.tables.write().await;
        if tables.attachments.contains_key(&attachment.id) {
            return Err(duplicate("media_attachment", &attachment.id));
        }
        tables
            .attachments
            .insert(attachment.id.clone(), attachment.clone());
        Ok(attachment)
    }

    async fn update_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        let mut tables = self.tables.write().await;
        let row = tables
            .attachments
            .get_mut(&attachment.id)
            .ok_or_else(|| missing("media_attachment", &attachment.id))?;
        *row = attachment.clone();
        Ok(attachment)
    }

    async fn delete_attachment(&self, id: &str) -> AppResult<()> {
        self.tables.write().await.attachments.remove(id);
        Ok(())
    }

    async fn get_report(&self, id: &str) -> AppResult<Option<report::Model>> {
        Ok(self.tables.read().await.reports.get(id).cloned())
    }

    async fn get_reports(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<report::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .reports
            .values()
            .rev()
            .filter(|r| resolved.is_none_or(|wanted| r.is_resolved() == wanted))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn put_report(&self, report: report::Model) -> AppResult<report::Model> {
        let mut tables = self.tables.write().await;
        if tables.reports.contains_key(&report.id) {
            return Err(duplicate("report", &report.id));
        }
        tables.reports.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn update_report(&self, report: report::Model) -> AppResult<report::Model> {
        let mut tables = self.tables.write().await;
        let row = tables
            .reports
            .get_mut(&report.id)
            .ok_or_else(|| missing("report", &report.id))?;
        *row = report.clone();
        Ok(report)
    }

    async fn get_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        let domain = domain.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .domain_blocks
            .values()
            .find(|b| b.domain == domain)
            .cloned())
    }

    async fn get_domain_blocks(&self) -> AppResult<Vec<domain_block::Model>> {
        let mut blocks: Vec<_> = self
            .tables
            .read()
            .await
            .domain_blocks
            .values()
            .cloned()
            .collect();
        blocks.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(blocks)
    }

    async fn put_domain_block(
        &self,
        block: domain_block::Model,
    ) -> AppResult<domain_block::Model> {
        let mut tables = self.tables.write().await;
        if tables.domain_blocks.values().any(|b| b.domain == block.domain) {
            return Err(duplicate("domain_block", &block.domain));
        }
        tables.domain_blocks.insert(block.id.clone(), block.clone());
        Ok(block)
    }

    async fn delete_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        let domain = domain.to_lowercase();
        let mut tables = self.tables.write().await;
        let key = tables
            .domain_blocks
            .values()
            .find(|b| b.domain == domain)
            .map(|b| b.id.clone());
        Ok(key.and_then(|k| tables.domain_blocks.remove(&k)))
    }

    async fn put_notification(
        &self,
        notification: notification::Model,
    ) -> AppResult<notification::Model> {
        let mut tables = self.tables.write().await;
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn get_notifications(
        &self,
        account_id: &str,
        limit: usize,
    ) -> AppResult<Vec<notification::Model>> {
        Ok(self
            .tables
            .read()
            .await
            .notifications
            .values()
            .rev()
            .filter(|n| n.target_account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Entity builders with sensible defaults.
pub mod fixtures {
    use super::{Utc, account, block, follow, status};

    /// A local account of `https://{host}`.
    #[must_use]
    pub fn local_account(id: &str, username: &str, host: &str) -> account::Model {
        let base = format!("https://{host}/users/{username}");
        account::Model {
            id: id.to_string(),
            username: username.to_string(),
            domain: None,
            display_name: Some(username.to_string()),
            note: None,
            uri: base.clone(),
            url: Some(format!("https://{host}/@{username}")),
            inbox_uri: format!("{base}/inbox"),
            shared_inbox_uri: Some(format!("https://{host}/inbox")),
            outbox_uri: format!("{base}/outbox"),
            followers_uri: format!("{base}/followers"),
            following_uri: format!("{base}/following"),
            public_key_pem: String::new(),
            private_key_pem: None,
            public_key_uri: format!("{base}#main-key"),
            locked: false,
            bot: false,
            discoverable: true,
            suspended_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// A remote account living on `domain`.
    #[must_use]
    pub fn remote_account(id: &str, username: &str, domain: &str) -> account::Model {
        account::Model {
            domain: Some(domain.to_string()),
            ..local_account(id, username, domain)
        }
    }

    /// A status with no reply, boost, mentions or attachments.
    #[must_use]
    pub fn status(id: &str, author: &account::Model, visibility: status::Visibility) -> status::Model {
        status::Model {
            id: id.to_string(),
            uri: format!("{}/statuses/{id}", author.uri),
            url: None,
            content: format!("<p>status {id}</p>"),
            content_warning: None,
            visibility,
            sensitive: false,
            local: author.is_local(),
            account_id: author.id.clone(),
            account_uri: author.uri.clone(),
            in_reply_to_id: None,
            in_reply_to_account_id: None,
            in_reply_to_uri: None,
            boost_of_id: None,
            boost_of_account_id: None,
            mention_account_ids: serde_json::json!([]),
            attachment_ids: serde_json::json!([]),
            tags: serde_json::json!([]),
            federated: true,
            boostable: true,
            replyable: true,
            likeable: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// A boost of `original` by `booster`.
    #[must_use]
    pub fn boost(id: &str, booster: &account::Model, original: &status::Model) -> status::Model {
        status::Model {
            content: String::new(),
            boost_of_id: Some(original.id.clone()),
            boost_of_account_id: Some(original.account_id.clone()),
            ..status(id, booster, original.visibility)
        }
    }

    /// An accepted follow edge.
    #[must_use]
    pub fn follow(id: &str, account_id: &str, target_account_id: &str) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            uri: format!("https://plaza.test/follows/{id}"),
            account_id: account_id.to_string(),
            target_account_id: target_account_id.to_string(),
            show_reblogs: true,
            notify: false,
            created_at: Utc::now().into(),
        }
    }

    /// A block from `account_id` to `target_account_id`.
    #[must_use]
    pub fn block(id: &str, account_id: &str, target_account_id: &str) -> block::Model {
        block::Model {
            id: id.to_string(),
            uri: format!("https://plaza.test/blocks/{id}"),
            account_id: account_id.to_string(),
            target_account_id: target_account_id.to_string(),
            created_at: Utc::now().into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::entities::status::Visibility;

    async fn seeded() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        let alice = local_account("01a", "alice", "plaza.test");
        db.put_account(alice.clone()).await.unwrap();
        for id in ["s01", "s02", "s03", "s04", "s05"] {
            db.put_status(status(id, &alice, Visibility::Public))
                .await
                .unwrap();
        }
        db.put_status(status("s06", &alice, Visibility::Unlisted))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_account_statuses_descending() {
        let db = seeded().await;
        let query = AccountStatusesQuery::new("01a", 3);
        let ids: Vec<_> = db
            .get_account_statuses(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s06", "s05", "s04"]);
    }

    #[tokio::test]
    async fn test_account_statuses_min_id_returns_nearest_page() {
        let db = seeded().await;
        let mut query = AccountStatusesQuery::new("01a", 2);
        query.min_id = Some("s02".to_string());
        let ids: Vec<_> = db
            .get_account_statuses(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s04", "s03"]);
    }

    #[tokio::test]
    async fn test_account_statuses_public_only() {
        let db = seeded().await;
        let mut query = AccountStatusesQuery::new("01a", 10);
        query.public_only = true;
        query.max_id = Some("s03".to_string());
        let ids: Vec<_> = db
            .get_account_statuses(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s02", "s01"]);
    }

    #[tokio::test]
    async fn test_account_statuses_federated_only_counts_toward_limit() {
        let db = seeded().await;
        let alice = db.get_account_by_id("01a").await.unwrap().unwrap();
        for id in ["s07", "s08"] {
            let local_only = status::Model {
                federated: false,
                ..status(id, &alice, Visibility::Public)
            };
            db.put_status(local_only).await.unwrap();
        }

        let mut query = AccountStatusesQuery::new("01a", 2);
        query.federated_only = true;
        let ids: Vec<_> = db
            .get_account_statuses(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s06", "s05"]);
    }

    #[tokio::test]
    async fn test_is_blocked_direction() {
        let db = MemoryDatabase::new();
        db.put_block(block("b1", "01a", "01b")).await.unwrap();

        assert!(db.is_blocked("01a", "01b", false).await.unwrap());
        assert!(!db.is_blocked("01b", "01a", false).await.unwrap());
        assert!(db.is_blocked("01b", "01a", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_follow_rejected() {
        let db = MemoryDatabase::new();
        db.put_follow(follow("f1", "01a", "01b")).await.unwrap();
        assert!(db.put_follow(follow("f2", "01a", "01b")).await.is_err());

        let removed = db.delete_follow("01a", "01b").await.unwrap();
        assert_eq!(removed.unwrap().id, "f1");
        assert!(db.delete_follow("01a", "01b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_home_timeline_includes_followed_and_self() {
        let db = MemoryDatabase::new();
        let alice = local_account("01a", "alice", "plaza.test");
        let bob = local_account("01b", "bob", "plaza.test");
        let carol = local_account("01c", "carol", "plaza.test");
        db.put_status(status("s1", &alice, Visibility::Public))
            .await
            .unwrap();
        db.put_status(status("s2", &bob, Visibility::Public))
            .await
            .unwrap();
        db.put_status(status("s3", &carol, Visibility::Public))
            .await
            .unwrap();
        db.put_follow(follow("f1", "01a", "01b")).await.unwrap();

        let ids: Vec<_> = db
            .get_home_timeline_statuses("01a", None, None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s2", "s1"]);
    }
}
