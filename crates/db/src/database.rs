//! The storage contract consumed by the processing core.

use async_trait::async_trait;
use plaza_common::AppResult;

use crate::entities::{
    account, block, domain_block, follow, follow_request, media_attachment, mute, notification,
    report, status, status_bookmark, status_fave, user,
};

/// Parameters for paging through one account's statuses.
#[derive(Debug, Clone, Default)]
pub struct AccountStatusesQuery {
    /// Author.
    pub account_id: String,
    /// Maximum number of statuses returned.
    pub limit: usize,
    /// Only statuses with an ID lower than this.
    pub max_id: Option<String>,
    /// Only statuses with an ID higher than this.
    pub min_id: Option<String>,
    /// Skip replies.
    pub exclude_replies: bool,
    /// Skip boosts.
    pub exclude_boosts: bool,
    /// Only public statuses.
    pub public_only: bool,
    /// Only statuses written here and allowed to leave this server.
    pub federated_only: bool,
}

impl AccountStatusesQuery {
    /// Query the newest `limit` statuses of an account.
    #[must_use]
    pub fn new(account_id: impl Into<String>, limit: usize) -> Self {
        Self {
            account_id: account_id.into(),
            limit,
            ..Self::default()
        }
    }

    /// Whether a status matches every filter of this query.
    #[must_use]
    pub fn matches(&self, status: &status::Model) -> bool {
        status.account_id == self.account_id
            && self.max_id.as_ref().is_none_or(|max| &status.id < max)
            && self.min_id.as_ref().is_none_or(|min| &status.id > min)
            && !(self.exclude_replies && status.is_reply())
            && !(self.exclude_boosts && status.is_boost())
            && !(self.public_only && status.visibility != status::Visibility::Public)
            && !(self.federated_only && !(status.local && status.federated))
    }

    /// With only a lower bound, the page nearest above it is wanted rather than the newest.
    #[must_use]
    pub const fn ascending(&self) -> bool {
        self.min_id.is_some() && self.max_id.is_none()
    }
}

/// Storage operations required by the processing core.
///
/// Implementations must be safe for concurrent use. All lookups return
/// `Ok(None)` for absent entities; `Err` is reserved for storage faults.
/// Lists of statuses are returned newest first.
#[async_trait]
pub trait Database: Send + Sync {
    // ==================== Accounts ====================

    /// Find an account by ID.
    async fn get_account_by_id(&self, id: &str) -> AppResult<Option<account::Model>>;

    /// Find an account by its `ActivityPub` URI.
    async fn get_account_by_uri(&self, uri: &str) -> AppResult<Option<account::Model>>;

    /// Find an account by username and domain (`None` for local accounts).
    async fn get_account_by_username_domain(
        &self,
        username: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<account::Model>>;

    /// Find a local account by username.
    async fn get_local_account_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<account::Model>> {
        self.get_account_by_username_domain(username, None).await
    }

    /// All known accounts of a remote domain.
    async fn get_accounts_by_domain(&self, domain: &str) -> AppResult<Vec<account::Model>>;

    /// Insert a new account.
    async fn put_account(&self, account: account::Model) -> AppResult<account::Model>;

    /// Replace an existing account.
    async fn update_account(&self, account: account::Model) -> AppResult<account::Model>;

    // ==================== Users ====================

    /// Find the credentials belonging to a local account.
    async fn get_user_by_account_id(&self, account_id: &str) -> AppResult<Option<user::Model>>;

    /// Find credentials by email address.
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<user::Model>>;

    /// Insert new credentials.
    async fn put_user(&self, user: user::Model) -> AppResult<user::Model>;

    /// Replace existing credentials.
    async fn update_user(&self, user: user::Model) -> AppResult<user::Model>;

    // ==================== Statuses ====================

    /// Find a status by ID.
    async fn get_status_by_id(&self, id: &str) -> AppResult<Option<status::Model>>;

    /// Find a status by its `ActivityPub` URI.
    async fn get_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>>;

    /// Insert a new status.
    async fn put_status(&self, status: status::Model) -> AppResult<status::Model>;

    /// Delete a status. Deleting an absent status is not an error.
    async fn delete_status(&self, id: &str) -> AppResult<()>;

    /// Page through one account's statuses.
    async fn get_account_statuses(
        &self,
        query: &AccountStatusesQuery,
    ) -> AppResult<Vec<status::Model>>;

    /// Direct replies to a status, oldest first.
    async fn get_status_replies(&self, status_id: &str) -> AppResult<Vec<status::Model>>;

    /// Every boost of a status.
    async fn get_status_boosts(&self, status_id: &str) -> AppResult<Vec<status::Model>>;

    /// The boost of `status_id` made by `account_id`, if any.
    async fn get_boost_by_account(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status::Model>>;

    /// Candidate statuses for a home timeline: authored by the account itself
    /// or by accounts it follows, bounded by exclusive cursors. Newest first;
    /// with only `min_id` the page is the one immediately above it.
    async fn get_home_timeline_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<status::Model>>;

    // ==================== Relationships ====================

    /// Whether `account_id` blocks `target_account_id`, or with `either_direction`,
    /// whether a block exists between the two in any direction.
    async fn is_blocked(
        &self,
        account_id: &str,
        target_account_id: &str,
        either_direction: bool,
    ) -> AppResult<bool>;

    /// Find the block from one account to another.
    async fn get_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>>;

    /// Insert a block.
    async fn put_block(&self, block: block::Model) -> AppResult<block::Model>;

    /// Delete a block, returning it if it existed.
    async fn delete_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>>;

    /// Find the follow edge from one account to another.
    async fn get_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>>;

    /// Whether `account_id` follows `target_account_id`.
    async fn is_following(&self, account_id: &str, target_account_id: &str) -> AppResult<bool> {
        Ok(self.get_follow(account_id, target_account_id).await?.is_some())
    }

    /// Insert a follow edge.
    async fn put_follow(&self, follow: follow::Model) -> AppResult<follow::Model>;

    /// Delete a follow edge, returning it if it existed.
    async fn delete_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>>;

    /// Follow edges pointing at an account.
    async fn get_followers(&self, account_id: &str) -> AppResult<Vec<follow::Model>>;

    /// Follow edges starting at an account.
    async fn get_following(&self, account_id: &str) -> AppResult<Vec<follow::Model>>;

    /// Find a pending follow request.
    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>>;

    /// Insert a follow request.
    async fn put_follow_request(
        &self,
        request: follow_request::Model,
    ) -> AppResult<follow_request::Model>;

    /// Delete a follow request, returning it if it existed.
    async fn delete_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>>;

    /// Pending requests awaiting an account's approval.
    async fn get_follow_requests_for(
        &self,
        target_account_id: &str,
    ) -> AppResult<Vec<follow_request::Model>>;

    /// Whether `account_id` has muted `target_account_id`.
    async fn is_muted(&self, account_id: &str, target_account_id: &str) -> AppResult<bool>;

    /// Insert a mute.
    async fn put_mute(&self, mute: mute::Model) -> AppResult<mute::Model>;

    /// Delete a mute, returning it if it existed.
    async fn delete_mute(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<mute::Model>>;

    // ==================== Faves and bookmarks ====================

    /// Find the fave of a status by an account.
    async fn get_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>>;

    /// Every fave of a status.
    async fn get_status_faves(&self, status_id: &str) -> AppResult<Vec<status_fave::Model>>;

    /// Insert a fave.
    async fn put_fave(&self, fave: status_fave::Model) -> AppResult<status_fave::Model>;

    /// Delete a fave, returning it if it existed.
    async fn delete_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>>;

    /// Find the bookmark of a status by an account.
    async fn get_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>>;

    /// Insert a bookmark.
    async fn put_bookmark(
        &self,
        bookmark: status_bookmark::Model,
    ) -> AppResult<status_bookmark::Model>;

    /// Delete a bookmark, returning it if it existed.
    async fn delete_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>>;

    // ==================== Media ====================

    /// Find an attachment by ID.
    async fn get_attachment(&self, id: &str) -> AppResult<Option<media_attachment::Model>>;

    /// Insert an attachment.
    async fn put_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model>;

    /// Replace an attachment.
    async fn update_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model>;

    /// Delete an attachment.
    async fn delete_attachment(&self, id: &str) -> AppResult<()>;

    // ==================== Reports ====================

    /// Find a report by ID.
    async fn get_report(&self, id: &str) -> AppResult<Option<report::Model>>;

    /// Reports newest first, optionally filtered by resolution state.
    async fn get_reports(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<report::Model>>;

    /// Insert a report.
    async fn put_report(&self, report: report::Model) -> AppResult<report::Model>;

    /// Replace a report.
    async fn update_report(&self, report: report::Model) -> AppResult<report::Model>;

    // ==================== Domain blocks ====================

    /// Find the block of a domain.
    async fn get_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>>;

    /// Every domain block.
    async fn get_domain_blocks(&self) -> AppResult<Vec<domain_block::Model>>;

    /// Insert a domain block.
    async fn put_domain_block(
        &self,
        block: domain_block::Model,
    ) -> AppResult<domain_block::Model>;

    /// Delete a domain block, returning it if it existed.
    async fn delete_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>>;

    // ==================== Notifications ====================

    /// Insert a notification.
    async fn put_notification(
        &self,
        notification: notification::Model,
    ) -> AppResult<notification::Model>;

    /// Newest notifications of an account.
    async fn get_notifications(
        &self,
        account_id: &str,
        limit: usize,
    ) -> AppResult<Vec<notification::Model>>;
}
