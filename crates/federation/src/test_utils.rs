//! In-process [`Federator`] for tests.
//!
//! Accounts are only looked up in storage and deliveries are recorded
//! instead of sent.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::Database;
use plaza_db::entities::account;
use plaza_queue::{FromFederator, WorkerPool};
use url::Url;

use crate::activity::Activity;
use crate::federator::{FederatingDb, Federator};
use crate::inbox::InboxHandler;
use crate::objects::OrderedCollection;
use crate::request::InboundRequest;

/// One recorded call to [`Federator::deliver`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub actor_id: String,
    pub activity: Activity,
    pub inboxes: Vec<String>,
}

/// Federator that authenticates every request as a configured actor.
pub struct StubFederator {
    db: Arc<dyn Database>,
    federating_db: FederatingDb,
    inbox: InboxHandler,
    requester: Mutex<Option<Url>>,
    deliveries: Mutex<Vec<Delivery>>,
    pool: Option<Arc<WorkerPool<FromFederator>>>,
}

impl StubFederator {
    /// Create a federator over `db` that rejects every signature until
    /// [`Self::authenticate_as`] is called.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            federating_db: FederatingDb::new(db.clone()),
            inbox: InboxHandler::new(db.clone(), Arc::new(IdGenerator::new())),
            db,
            requester: Mutex::new(None),
            deliveries: Mutex::new(Vec::new()),
            pool: None,
        }
    }

    /// Queue received side effects on `pool`.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<WorkerPool<FromFederator>>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Treat every request as signed by `actor`; `None` rejects them all.
    pub fn authenticate_as(&self, actor: Option<&str>) {
        let actor = actor.and_then(|a| Url::parse(a).ok());
        *self.requester.lock().unwrap_or_else(PoisonError::into_inner) = actor;
    }

    /// Deliveries made so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Federator for StubFederator {
    async fn authenticate_federated_request(
        &self,
        _request: &InboundRequest,
        _username: &str,
    ) -> AppResult<Url> {
        self.requester
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AppError::Unauthorized("request is not signed".to_string()))
    }

    async fn get_account_by_uri(
        &self,
        _username: &str,
        uri: &Url,
        _refresh: bool,
    ) -> AppResult<account::Model> {
        self.db
            .get_account_by_uri(uri.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {uri}")))
    }

    async fn resolve_account(&self, username: &str, domain: &str) -> AppResult<account::Model> {
        let remote = self
            .db
            .get_account_by_username_domain(username, Some(domain))
            .await?;
        match remote {
            Some(account) => Ok(account),
            None => self
                .db
                .get_local_account_by_username(username)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{username}@{domain}"))),
        }
    }

    async fn followers(&self, account_uri: &Url) -> AppResult<OrderedCollection> {
        self.federating_db.followers(account_uri).await
    }

    async fn following(&self, account_uri: &Url) -> AppResult<OrderedCollection> {
        self.federating_db.following(account_uri).await
    }

    async fn deliver(
        &self,
        actor: &account::Model,
        activity: &Activity,
        inboxes: Vec<String>,
    ) -> AppResult<()> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                actor_id: actor.id.clone(),
                activity: activity.clone(),
                inboxes,
            });
        Ok(())
    }

    async fn post_inbox(&self, request: InboundRequest) -> AppResult<bool> {
        self.inbox
            .receive(self, request, self.pool.as_deref())
            .await
    }
}
