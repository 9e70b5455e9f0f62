//! Conversion of stored entities to client API and `ActivityPub` representations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use plaza_common::{AppError, AppResult};
use plaza_db::Database;
use plaza_db::entities::{
    account, block, domain_block, follow, media_attachment, notification, report, status,
    status::Visibility, status_fave,
};
use plaza_federation::{
    Activity, ApActorType, ApAttachment, ApEndpoints, ApNote, ApPerson, ApPublicKey, ApTag,
    OrderedCollection, OrderedCollectionPage, PUBLIC_AUDIENCE, UrlConfig,
};
use plaza_queue::ActivityType;
use url::Url;

use crate::api;

/// Converts internal entities into wire representations.
#[async_trait]
pub trait TypeConverter: Send + Sync {
    /// Client representation of an account.
    async fn account_to_api(&self, account: &account::Model) -> AppResult<api::Account>;

    /// Client representation of a status, with the viewer-specific flags
    /// (`favourited`, `reblogged`, `bookmarked`) filled in for `viewer`.
    async fn status_to_api(
        &self,
        status: &status::Model,
        viewer: Option<&account::Model>,
    ) -> AppResult<api::Status>;

    /// Client representation of a thread around a status.
    async fn context_to_api(
        &self,
        ancestors: &[status::Model],
        descendants: &[status::Model],
        viewer: Option<&account::Model>,
    ) -> AppResult<api::Context>;

    async fn notification_to_api(
        &self,
        notification: &notification::Model,
        viewer: &account::Model,
    ) -> AppResult<api::Notification>;

    fn attachment_to_api(&self, attachment: &media_attachment::Model) -> api::Attachment;

    async fn report_to_api(&self, report: &report::Model) -> AppResult<api::Report>;

    fn domain_block_to_api(&self, block: &domain_block::Model) -> api::DomainBlock;

    /// Actor document of a local account.
    fn account_to_ap(&self, account: &account::Model) -> AppResult<ApPerson>;

    /// Note for a status, addressed according to its visibility.
    async fn status_to_ap(&self, status: &status::Model) -> AppResult<ApNote>;

    /// `Create` activity wrapping [`Self::status_to_ap`].
    async fn status_to_ap_create(&self, status: &status::Model) -> AppResult<Activity>;

    /// `Announce` activity for a boost of `original`.
    fn boost_to_ap_announce(
        &self,
        boost: &status::Model,
        booster: &account::Model,
        original: &status::Model,
    ) -> AppResult<Activity>;

    /// `Like` activity for a fave.
    fn fave_to_ap_like(
        &self,
        fave: &status_fave::Model,
        account: &account::Model,
        status: &status::Model,
    ) -> AppResult<Activity>;

    /// `Follow` activity for a follow edge or request.
    fn follow_to_ap(
        &self,
        follow: &follow::Model,
        account: &account::Model,
        target: &account::Model,
    ) -> AppResult<Activity>;

    /// `Block` activity.
    fn block_to_ap(
        &self,
        block: &block::Model,
        account: &account::Model,
        target: &account::Model,
    ) -> AppResult<Activity>;

    /// The bare outbox: links to its first and last pages, no items.
    fn outbox_to_collection(&self, outbox_uri: &str) -> AppResult<OrderedCollection>;

    /// One outbox page of `Create` activities for `statuses`, newest first.
    async fn statuses_to_outbox_page(
        &self,
        outbox_uri: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        statuses: &[status::Model],
    ) -> AppResult<OrderedCollectionPage>;
}

/// Timestamp as rendered to clients.
pub fn api_time(time: &DateTime<FixedOffset>) -> String {
    time.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_url(raw: &str) -> AppResult<Url> {
    Url::parse(raw).map_err(|e| AppError::Internal(format!("invalid URL {raw}: {e}")))
}

/// [`TypeConverter`] over storage.
#[derive(Clone)]
pub struct Converter {
    db: Arc<dyn Database>,
    urls: UrlConfig,
}

impl Converter {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, urls: UrlConfig) -> Self {
        Self { db, urls }
    }

    async fn account_by_id(&self, id: &str) -> AppResult<account::Model> {
        self.db
            .get_account_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {id}")))
    }

    async fn mentioned(&self, status: &status::Model) -> AppResult<Vec<account::Model>> {
        let mut accounts = Vec::new();
        for id in status.mention_ids() {
            if let Some(account) = self.db.get_account_by_id(&id).await? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    async fn attachments(&self, status: &status::Model) -> AppResult<Vec<media_attachment::Model>> {
        let mut attachments = Vec::new();
        for id in status.attachment_id_list() {
            if let Some(attachment) = self.db.get_attachment(&id).await? {
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }

    /// `to` and `cc` of a status by `author` mentioning `mentioned`.
    fn addressing(
        visibility: Visibility,
        author: &account::Model,
        mentioned: &[account::Model],
    ) -> AppResult<(Vec<Url>, Vec<Url>)> {
        let public = parse_url(PUBLIC_AUDIENCE)?;
        let followers = parse_url(&author.followers_uri)?;
        let mentions = mentioned
            .iter()
            .map(|a| parse_url(&a.uri))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(match visibility {
            Visibility::Public => {
                let mut cc = vec![followers];
                cc.extend(mentions);
                (vec![public], cc)
            }
            Visibility::Unlisted => {
                let mut cc = vec![public];
                cc.extend(mentions);
                (vec![followers], cc)
            }
            Visibility::FollowersOnly => (vec![followers], mentions),
            Visibility::Direct => (mentions, Vec::new()),
        })
    }

    fn page_url(outbox_uri: &str, params: &[(&str, &str)]) -> AppResult<Url> {
        let mut url = parse_url(outbox_uri)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("page", "true");
        }
        Ok(url)
    }
}

#[async_trait]
impl TypeConverter for Converter {
    async fn account_to_api(&self, account: &account::Model) -> AppResult<api::Account> {
        let followers = self.db.get_followers(&account.id).await?;
        let following = self.db.get_following(&account.id).await?;
        Ok(api::Account {
            id: account.id.clone(),
            username: account.username.clone(),
            acct: account.acct(),
            display_name: account.display_name.clone().unwrap_or_default(),
            note: account.note.clone().unwrap_or_default(),
            url: account.url.clone(),
            locked: account.locked,
            bot: account.bot,
            discoverable: account.discoverable,
            suspended: account.is_suspended(),
            followers_count: followers.len(),
            following_count: following.len(),
            created_at: api_time(&account.created_at),
        })
    }

    async fn status_to_api(
        &self,
        status: &status::Model,
        viewer: Option<&account::Model>,
    ) -> AppResult<api::Status> {
        let author = self.account_by_id(&status.account_id).await?;

        let reblog = match &status.boost_of_id {
            Some(original_id) => {
                let original = self
                    .db
                    .get_status_by_id(original_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("status {original_id} not found")))?;
                Some(Box::new(self.status_to_api(&original, viewer).await?))
            }
            None => None,
        };

        let mentions = self
            .mentioned(status)
            .await?
            .into_iter()
            .map(|a| api::Mention {
                acct: a.acct(),
                url: a.url.clone().unwrap_or_else(|| a.uri.clone()),
                id: a.id,
                username: a.username,
            })
            .collect();
        let media_attachments = self
            .attachments(status)
            .await?
            .iter()
            .map(|a| self.attachment_to_api(a))
            .collect();
        let tags = status
            .tag_list()
            .into_iter()
            .map(|name| api::Tag {
                url: self.urls.tag_url(&name),
                name,
            })
            .collect();

        let (favourited, reblogged, bookmarked) = match viewer {
            Some(viewer) => (
                self.db.get_fave(&viewer.id, &status.id).await?.is_some(),
                self.db
                    .get_boost_by_account(&viewer.id, &status.id)
                    .await?
                    .is_some(),
                self.db.get_bookmark(&viewer.id, &status.id).await?.is_some(),
            ),
            None => (false, false, false),
        };

        Ok(api::Status {
            id: status.id.clone(),
            uri: status.uri.clone(),
            url: status.url.clone(),
            created_at: api_time(&status.created_at),
            account: self.account_to_api(&author).await?,
            content: status.content.clone(),
            spoiler_text: status.content_warning.clone().unwrap_or_default(),
            visibility: status.visibility.into(),
            sensitive: status.sensitive,
            in_reply_to_id: status.in_reply_to_id.clone(),
            in_reply_to_account_id: status.in_reply_to_account_id.clone(),
            reblog,
            media_attachments,
            mentions,
            tags,
            replies_count: self.db.get_status_replies(&status.id).await?.len(),
            reblogs_count: self.db.get_status_boosts(&status.id).await?.len(),
            favourites_count: self.db.get_status_faves(&status.id).await?.len(),
            favourited,
            reblogged,
            bookmarked,
        })
    }

    async fn context_to_api(
        &self,
        ancestors: &[status::Model],
        descendants: &[status::Model],
        viewer: Option<&account::Model>,
    ) -> AppResult<api::Context> {
        let mut context = api::Context::default();
        for status in ancestors {
            context.ancestors.push(self.status_to_api(status, viewer).await?);
        }
        for status in descendants {
            context
                .descendants
                .push(self.status_to_api(status, viewer).await?);
        }
        Ok(context)
    }

    async fn notification_to_api(
        &self,
        notification: &notification::Model,
        viewer: &account::Model,
    ) -> AppResult<api::Notification> {
        let origin = self.account_by_id(&notification.origin_account_id).await?;
        let status = match &notification.status_id {
            Some(id) => match self.db.get_status_by_id(id).await? {
                Some(status) => Some(self.status_to_api(&status, Some(viewer)).await?),
                None => None,
            },
            None => None,
        };
        Ok(api::Notification {
            id: notification.id.clone(),
            kind: notification.kind,
            created_at: api_time(&notification.created_at),
            account: self.account_to_api(&origin).await?,
            status,
            read: notification.read,
        })
    }

    fn attachment_to_api(&self, attachment: &media_attachment::Model) -> api::Attachment {
        let kind = match attachment.content_type.split('/').next() {
            Some("image") if attachment.content_type == "image/gif" => "gifv",
            Some("image") => "image",
            Some("video") => "video",
            Some("audio") => "audio",
            _ => "unknown",
        };
        api::Attachment {
            id: attachment.id.clone(),
            kind: kind.to_string(),
            url: attachment.url.clone(),
            content_type: attachment.content_type.clone(),
            size: attachment.file_size,
            description: attachment.description.clone(),
        }
    }

    async fn report_to_api(&self, report: &report::Model) -> AppResult<api::Report> {
        let target = self.account_by_id(&report.target_account_id).await?;
        let status_ids = report
            .status_ids
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(api::Report {
            id: report.id.clone(),
            action_taken: report.is_resolved(),
            action_taken_comment: report.action_taken.clone(),
            comment: report.comment.clone(),
            forwarded: report.forwarded,
            status_ids,
            target_account: self.account_to_api(&target).await?,
            created_at: api_time(&report.created_at),
        })
    }

    fn domain_block_to_api(&self, block: &domain_block::Model) -> api::DomainBlock {
        api::DomainBlock {
            id: block.id.clone(),
            domain: block.domain.clone(),
            public_comment: block.public_comment.clone(),
            private_comment: block.private_comment.clone(),
            created_at: api_time(&block.created_at),
        }
    }

    fn account_to_ap(&self, account: &account::Model) -> AppResult<ApPerson> {
        let id = parse_url(&account.uri)?;
        Ok(ApPerson {
            context: Some(plaza_federation::activitystreams_context()),
            kind: if account.bot {
                ApActorType::Service
            } else {
                ApActorType::Person
            },
            preferred_username: account.username.clone(),
            inbox: parse_url(&account.inbox_uri)?,
            outbox: parse_url(&account.outbox_uri)?,
            followers: Some(parse_url(&account.followers_uri)?),
            following: Some(parse_url(&account.following_uri)?),
            endpoints: Some(ApEndpoints {
                shared_inbox: account
                    .shared_inbox_uri
                    .as_deref()
                    .map(parse_url)
                    .transpose()?,
            }),
            name: account.display_name.clone(),
            summary: account.note.clone(),
            url: account.url.as_deref().map(parse_url).transpose()?,
            public_key: Some(ApPublicKey {
                id: account.public_key_uri.clone(),
                owner: id.clone(),
                public_key_pem: account.public_key_pem.clone(),
            }),
            manually_approves_followers: account.locked,
            discoverable: account.discoverable,
            id,
        })
    }

    async fn status_to_ap(&self, status: &status::Model) -> AppResult<ApNote> {
        let author = self.account_by_id(&status.account_id).await?;
        let mentioned = self.mentioned(status).await?;
        let (to, cc) = Self::addressing(status.visibility, &author, &mentioned)?;

        let mut note = ApNote::new(
            parse_url(&status.uri)?,
            parse_url(&author.uri)?,
            status.content.clone(),
            status.created_at.with_timezone(&Utc),
        );
        note.to = to;
        note.cc = cc;
        note.url = status.url.as_deref().map(parse_url).transpose()?;
        note.in_reply_to = status.in_reply_to_uri.as_deref().map(parse_url).transpose()?;
        note.summary = status.content_warning.clone();
        note.sensitive = status.sensitive;

        for account in &mentioned {
            note.tag
                .push(ApTag::mention(parse_url(&account.uri)?, format!("@{}", account.acct())));
        }
        for tag in status.tag_list() {
            note.tag
                .push(ApTag::hashtag(Some(parse_url(&self.urls.tag_url(&tag))?), &tag));
        }
        for attachment in self.attachments(status).await? {
            note.attachment.push(ApAttachment {
                kind: "Document".to_string(),
                url: parse_url(&attachment.url)?,
                media_type: Some(attachment.content_type),
                name: attachment.description,
            });
        }
        Ok(note)
    }

    async fn status_to_ap_create(&self, status: &status::Model) -> AppResult<Activity> {
        let note = self.status_to_ap(status).await?;
        let (to, cc) = (note.to.clone(), note.cc.clone());
        let activity = Activity::new(
            ActivityType::Create,
            parse_url(&format!("{}/activity", status.uri))?,
            note.attributed_to.clone(),
            serde_json::to_value(&note)?,
        );
        Ok(activity
            .addressed(to, cc)
            .published_at(status.created_at.with_timezone(&Utc)))
    }

    fn boost_to_ap_announce(
        &self,
        boost: &status::Model,
        booster: &account::Model,
        original: &status::Model,
    ) -> AppResult<Activity> {
        let to = vec![parse_url(PUBLIC_AUDIENCE)?];
        let cc = vec![
            parse_url(&booster.followers_uri)?,
            parse_url(&original.account_uri)?,
        ];
        Ok(Activity::new(
            ActivityType::Announce,
            parse_url(&boost.uri)?,
            parse_url(&booster.uri)?,
            original.uri.clone(),
        )
        .addressed(to, cc)
        .published_at(boost.created_at.with_timezone(&Utc)))
    }

    fn fave_to_ap_like(
        &self,
        fave: &status_fave::Model,
        account: &account::Model,
        status: &status::Model,
    ) -> AppResult<Activity> {
        Ok(Activity::new(
            ActivityType::Like,
            parse_url(&fave.uri)?,
            parse_url(&account.uri)?,
            status.uri.clone(),
        )
        .addressed(vec![parse_url(&status.account_uri)?], Vec::new()))
    }

    fn follow_to_ap(
        &self,
        follow: &follow::Model,
        account: &account::Model,
        target: &account::Model,
    ) -> AppResult<Activity> {
        Ok(Activity::new(
            ActivityType::Follow,
            parse_url(&follow.uri)?,
            parse_url(&account.uri)?,
            target.uri.clone(),
        )
        .addressed(vec![parse_url(&target.uri)?], Vec::new()))
    }

    fn block_to_ap(
        &self,
        block: &block::Model,
        account: &account::Model,
        target: &account::Model,
    ) -> AppResult<Activity> {
        Ok(Activity::new(
            ActivityType::Block,
            parse_url(&block.uri)?,
            parse_url(&account.uri)?,
            target.uri.clone(),
        )
        .addressed(vec![parse_url(&target.uri)?], Vec::new()))
    }

    fn outbox_to_collection(&self, outbox_uri: &str) -> AppResult<OrderedCollection> {
        Ok(OrderedCollection::paged(
            parse_url(outbox_uri)?,
            Self::page_url(outbox_uri, &[])?,
            Self::page_url(outbox_uri, &[("min_id", "0")])?,
        ))
    }

    async fn statuses_to_outbox_page(
        &self,
        outbox_uri: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        statuses: &[status::Model],
    ) -> AppResult<OrderedCollectionPage> {
        let mut params = Vec::new();
        if let Some(max_id) = max_id {
            params.push(("max_id", max_id));
        }
        if let Some(min_id) = min_id {
            params.push(("min_id", min_id));
        }

        let mut items = Vec::with_capacity(statuses.len());
        for status in statuses {
            items.push(self.status_to_ap_create(status).await?.to_json()?);
        }

        let mut page = OrderedCollectionPage::new(
            Self::page_url(outbox_uri, &params)?,
            parse_url(outbox_uri)?,
            items,
        );
        if let (Some(newest), Some(oldest)) = (statuses.first(), statuses.last()) {
            page.next = Some(Self::page_url(outbox_uri, &[("max_id", oldest.id.as_str())])?);
            page.prev = Some(Self::page_url(outbox_uri, &[("min_id", newest.id.as_str())])?);
        }
        Ok(page)
    }
}
