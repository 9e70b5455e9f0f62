//! [`Database`] implementation over `PostgreSQL` through the repositories.

use std::sync::Arc;

use async_trait::async_trait;
use plaza_common::AppResult;
use sea_orm::DatabaseConnection;

use crate::database::{AccountStatusesQuery, Database};
use crate::entities::{
    account, block, domain_block, follow, follow_request, media_attachment, mute, notification,
    report, status, status_bookmark, status_fave, user,
};
use crate::repositories::{
    AccountRepository, BlockRepository, DomainBlockRepository, FollowRepository,
    FollowRequestRepository, MediaAttachmentRepository, MuteRepository, NotificationRepository,
    ReportRepository, StatusBookmarkRepository, StatusFaveRepository, StatusRepository,
    UserRepository,
};

/// Storage backed by a sea-orm connection pool.
#[derive(Clone)]
pub struct SeaOrmDatabase {
    accounts: AccountRepository,
    users: UserRepository,
    statuses: StatusRepository,
    follows: FollowRepository,
    follow_requests: FollowRequestRepository,
    blocks: BlockRepository,
    mutes: MuteRepository,
    faves: StatusFaveRepository,
    bookmarks: StatusBookmarkRepository,
    attachments: MediaAttachmentRepository,
    reports: ReportRepository,
    domain_blocks: DomainBlockRepository,
    notifications: NotificationRepository,
}

impl SeaOrmDatabase {
    /// Build every repository over one shared connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            accounts: AccountRepository::new(Arc::clone(&db)),
            users: UserRepository::new(Arc::clone(&db)),
            statuses: StatusRepository::new(Arc::clone(&db)),
            follows: FollowRepository::new(Arc::clone(&db)),
            follow_requests: FollowRequestRepository::new(Arc::clone(&db)),
            blocks: BlockRepository::new(Arc::clone(&db)),
            mutes: MuteRepository::new(Arc::clone(&db)),
            faves: StatusFaveRepository::new(Arc::clone(&db)),
            bookmarks: StatusBookmarkRepository::new(Arc::clone(&db)),
            attachments: MediaAttachmentRepository::new(Arc::clone(&db)),
            reports: ReportRepository::new(Arc::clone(&db)),
            domain_blocks: DomainBlockRepository::new(Arc::clone(&db)),
            notifications: NotificationRepository::new(db),
        }
    }
}

#[async_trait]
impl Database for SeaOrmDatabase {
    async fn get_account_by_id(&self, id: &str) -> AppResult<Option<account::Model>> {
        self.accounts.find_by_id(id).await
    }

    async fn get_account_by_uri(&self, uri: &str) -> AppResult<Option<account::Model>> {
        self.accounts.find_by_uri(uri).await
    }

    async fn get_account_by_username_domain(
        &self,
        username: &str,
        domain: Option<&str>,
    ) -> AppResult<Option<account::Model>> {
        self.accounts.find_by_username_domain(username, domain).await
    }

    async fn get_accounts_by_domain(&self, domain: &str) -> AppResult<Vec<account::Model>> {
        self.accounts.find_by_domain(domain).await
    }

    async fn put_account(&self, account: account::Model) -> AppResult<account::Model> {
        self.accounts.create(account).await
    }

    async fn update_account(&self, account: account::Model) -> AppResult<account::Model> {
        self.accounts.update(account).await
    }

    async fn get_user_by_account_id(&self, account_id: &str) -> AppResult<Option<user::Model>> {
        self.users.find_by_account_id(account_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        self.users.find_by_email(email).await
    }

    async fn put_user(&self, user: user::Model) -> AppResult<user::Model> {
        self.users.create(user).await
    }

    async fn update_user(&self, user: user::Model) -> AppResult<user::Model> {
        self.users.update(user).await
    }

    async fn get_status_by_id(&self, id: &str) -> AppResult<Option<status::Model>> {
        self.statuses.find_by_id(id).await
    }

    async fn get_status_by_uri(&self, uri: &str) -> AppResult<Option<status::Model>> {
        self.statuses.find_by_uri(uri).await
    }

    async fn put_status(&self, status: status::Model) -> AppResult<status::Model> {
        self.statuses.create(status).await
    }

    async fn delete_status(&self, id: &str) -> AppResult<()> {
        self.statuses.delete(id).await
    }

    async fn get_account_statuses(
        &self,
        query: &AccountStatusesQuery,
    ) -> AppResult<Vec<status::Model>> {
        self.statuses.find_by_account(query).await
    }

    async fn get_status_replies(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        self.statuses.find_replies(status_id).await
    }

    async fn get_status_boosts(&self, status_id: &str) -> AppResult<Vec<status::Model>> {
        self.statuses.find_boosts(status_id).await
    }

    async fn get_boost_by_account(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status::Model>> {
        self.statuses
            .find_boost_by_account(account_id, status_id)
            .await
    }

    async fn get_home_timeline_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<status::Model>> {
        let mut authors: Vec<String> = self
            .follows
            .find_following(account_id)
            .await?
            .into_iter()
            .map(|f| f.target_account_id)
            .collect();
        authors.push(account_id.to_string());

        self.statuses
            .find_by_authors(authors, max_id, min_id, limit)
            .await
    }

    async fn is_blocked(
        &self,
        account_id: &str,
        target_account_id: &str,
        either_direction: bool,
    ) -> AppResult<bool> {
        if either_direction {
            self.blocks
                .is_blocked_between(account_id, target_account_id)
                .await
        } else {
            Ok(self
                .blocks
                .find_by_pair(account_id, target_account_id)
                .await?
                .is_some())
        }
    }

    async fn get_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        self.blocks.find_by_pair(account_id, target_account_id).await
    }

    async fn put_block(&self, block: block::Model) -> AppResult<block::Model> {
        self.blocks.create(block).await
    }

    async fn delete_block(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<block::Model>> {
        self.blocks
            .delete_by_pair(account_id, target_account_id)
            .await
    }

    async fn get_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        self.follows
            .find_by_pair(account_id, target_account_id)
            .await
    }

    async fn put_follow(&self, follow: follow::Model) -> AppResult<follow::Model> {
        self.follows.create(follow).await
    }

    async fn delete_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        self.follows
            .delete_by_pair(account_id, target_account_id)
            .await
    }

    async fn get_followers(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        self.follows.find_followers(account_id).await
    }

    async fn get_following(&self, account_id: &str) -> AppResult<Vec<follow::Model>> {
        self.follows.find_following(account_id).await
    }

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        self.follow_requests
            .find_by_pair(account_id, target_account_id)
            .await
    }

    async fn put_follow_request(
        &self,
        request: follow_request::Model,
    ) -> AppResult<follow_request::Model> {
        self.follow_requests.create(request).await
    }

    async fn delete_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        self.follow_requests
            .delete_by_pair(account_id, target_account_id)
            .await
    }

    async fn get_follow_requests_for(
        &self,
        target_account_id: &str,
    ) -> AppResult<Vec<follow_request::Model>> {
        self.follow_requests.find_received(target_account_id).await
    }

    async fn is_muted(&self, account_id: &str, target_account_id: &str) -> AppResult<bool> {
        Ok(self
            .mutes
            .find_by_pair(account_id, target_account_id)
            .await?
            .is_some())
    }

    async fn put_mute(&self, mute: mute::Model) -> AppResult<mute::Model> {
        self.mutes.create(mute).await
    }

    async fn delete_mute(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<mute::Model>> {
        self.mutes
            .delete_by_pair(account_id, target_account_id)
            .await
    }

    async fn get_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        self.faves.find_by_pair(account_id, status_id).await
    }

    async fn get_status_faves(&self, status_id: &str) -> AppResult<Vec<status_fave::Model>> {
        self.faves.find_by_status(status_id).await
    }

    async fn put_fave(&self, fave: status_fave::Model) -> AppResult<status_fave::Model> {
        self.faves.create(fave).await
    }

    async fn delete_fave(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_fave::Model>> {
        self.faves.delete_by_pair(account_id, status_id).await
    }

    async fn get_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        self.bookmarks.find_by_pair(account_id, status_id).await
    }

    async fn put_bookmark(
        &self,
        bookmark: status_bookmark::Model,
    ) -> AppResult<status_bookmark::Model> {
        self.bookmarks.create(bookmark).await
    }

    async fn delete_bookmark(
        &self,
        account_id: &str,
        status_id: &str,
    ) -> AppResult<Option<status_bookmark::Model>> {
        self.bookmarks.delete_by_pair(account_id, status_id).await
    }

    async fn get_attachment(&self, id: &str) -> AppResult<Option<media_attachment::Model>> {
        self.attachments.find_by_id(id).await
    }

    async fn put_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        self.attachments.create(attachment).await
    }

    async fn update_attachment(
        &self,
        attachment: media_attachment::Model,
    ) -> AppResult<media_attachment::Model> {
        self.attachments.update(attachment).await
    }

    async fn delete_attachment(&self, id: &str) -> AppResult<()> {
        self.attachments.delete(id).await
    }

    async fn get_report(&self, id: &str) -> AppResult<Option<report::Model>> {
        self.reports.find_by_id(id).await
    }

    async fn get_reports(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<report::Model>> {
        self.reports.find_all(resolved, limit).await
    }

    async fn put_report(&self, report: report::Model) -> AppResult<report::Model> {
        self.reports.create(report).await
    }

    async fn update_report(&self, report: report::Model) -> AppResult<report::Model> {
        self.reports.update(report).await
    }

    async fn get_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        self.domain_blocks.find_by_domain(domain).await
    }

    async fn get_domain_blocks(&self) -> AppResult<Vec<domain_block::Model>> {
        self.domain_blocks.find_all().await
    }

    async fn put_domain_block(
        &self,
        block: domain_block::Model,
    ) -> AppResult<domain_block::Model> {
        self.domain_blocks.create(block).await
    }

    async fn delete_domain_block(&self, domain: &str) -> AppResult<Option<domain_block::Model>> {
        self.domain_blocks.delete_by_domain(domain).await
    }

    async fn put_notification(
        &self,
        notification: notification::Model,
    ) -> AppResult<notification::Model> {
        self.notifications.create(notification).await
    }

    async fn get_notifications(
        &self,
        account_id: &str,
        limit: usize,
    ) -> AppResult<Vec<notification::Model>> {
        self.notifications.find_by_target(account_id, limit).await
    }
}
