//! `ActivityPub` resources served to remote servers.
//!
//! Every request is answered only after the requesting actor has been
//! authenticated, resolved and checked against blocks in both directions.

use std::sync::Arc;

use plaza_common::{AppError, AppResult};
use plaza_db::entities::account;
use plaza_db::{AccountStatusesQuery, Database};
use plaza_federation::{Federator, InboundRequest};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::typeutils::TypeConverter;

/// Statuses per outbox page.
pub const OUTBOX_PAGE_SIZE: usize = 30;

#[derive(Clone)]
pub struct FederationProcessor {
    db: Arc<dyn Database>,
    federator: Arc<dyn Federator>,
    converter: Arc<dyn TypeConverter>,
}

impl FederationProcessor {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        federator: Arc<dyn Federator>,
        converter: Arc<dyn TypeConverter>,
    ) -> Self {
        Self {
            db,
            federator,
            converter,
        }
    }

    /// The local account `username` and the remote account signing
    /// `request`, once the requester is known and unblocked.
    async fn authorize(
        &self,
        request: &InboundRequest,
        username: &str,
    ) -> AppResult<(account::Model, account::Model)> {
        let target = self
            .db
            .get_local_account_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {username} not found")))?;

        let requester_uri = self
            .federator
            .authenticate_federated_request(request, username)
            .await
            .map_err(|e| AppError::Unauthorized(format!("not authenticated: {e}")))?;

        let requester = self
            .federator
            .get_account_by_uri(username, &requester_uri, false)
            .await
            .map_err(|e| {
                AppError::Unauthorized(format!("couldn't resolve {requester_uri}: {e}"))
            })?;

        if self
            .db
            .is_blocked(&target.id, &requester.id, true)
            .await?
        {
            return Err(AppError::blocked(&target.id, &requester.id));
        }
        debug!(target = %target.uri, requester = %requester.uri, "Authorized federated request");
        Ok((target, requester))
    }

    pub async fn followers_get(&self, request: &InboundRequest, username: &str) -> AppResult<Value> {
        let (target, _) = self.authorize(request, username).await?;
        let collection = self.federator.followers(&Url::parse(&target.uri)?).await?;
        Ok(serde_json::to_value(collection)?)
    }

    pub async fn following_get(&self, request: &InboundRequest, username: &str) -> AppResult<Value> {
        let (target, _) = self.authorize(request, username).await?;
        let collection = self.federator.following(&Url::parse(&target.uri)?).await?;
        Ok(serde_json::to_value(collection)?)
    }

    /// The outbox of `username`: without `page` only the collection linking
    /// to its first and last pages, otherwise one page of public statuses
    /// bounded by the cursors.
    pub async fn outbox_get(
        &self,
        request: &InboundRequest,
        username: &str,
        page: bool,
        max_id: Option<&str>,
        min_id: Option<&str>,
    ) -> AppResult<Value> {
        let (target, _) = self.authorize(request, username).await?;
        if !page {
            let collection = self.converter.outbox_to_collection(&target.outbox_uri)?;
            return Ok(serde_json::to_value(collection)?);
        }

        let query = AccountStatusesQuery {
            max_id: max_id.filter(|s| !s.is_empty()).map(str::to_string),
            min_id: min_id.filter(|s| !s.is_empty()).map(str::to_string),
            exclude_replies: true,
            exclude_boosts: true,
            public_only: true,
            federated_only: true,
            ..AccountStatusesQuery::new(&target.id, OUTBOX_PAGE_SIZE)
        };
        let statuses = self.db.get_account_statuses(&query).await?;
        let page = self
            .converter
            .statuses_to_outbox_page(&target.outbox_uri, max_id, min_id, &statuses)
            .await?;
        Ok(serde_json::to_value(page)?)
    }

    /// Hand an inbox POST to the federator. `false` means the request was not
    /// an `ActivityPub` request at all.
    pub async fn inbox_post(&self, request: InboundRequest) -> AppResult<bool> {
        self.federator.post_inbox(request).await
    }

    /// Actor document of a local account.
    pub async fn user_get(&self, request: &InboundRequest, username: &str) -> AppResult<Value> {
        let (target, _) = self.authorize(request, username).await?;
        let person = self.converter.account_to_ap(&target)?;
        Ok(serde_json::to_value(person)?)
    }

    /// Note of a public or unlisted status written by `username`.
    pub async fn status_get(
        &self,
        request: &InboundRequest,
        username: &str,
        status_id: &str,
    ) -> AppResult<Value> {
        let (target, _) = self.authorize(request, username).await?;
        let status = self
            .db
            .get_status_by_id(status_id)
            .await?
            .filter(|s| {
                s.account_id == target.id && s.local && !s.is_boost() && s.visibility.is_open()
            })
            .ok_or_else(|| AppError::NotFound(format!("status {status_id} not found")))?;
        let mut note = serde_json::to_value(self.converter.status_to_ap(&status).await?)?;
        if let Some(map) = note.as_object_mut() {
            map.insert("@context".to_string(), plaza_federation::activitystreams_context());
        }
        Ok(note)
    }
}
