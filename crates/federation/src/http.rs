//! [`Federator`] over HTTP: signed requests through [`ApClient`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use plaza_common::{AppError, AppResult, Config, IdGenerator, get_metrics};
use plaza_db::Database;
use plaza_db::entities::account;
use plaza_queue::{FromFederator, RetryConfig, WorkerPool};
use tracing::{debug, info, warn};
use url::Url;

use crate::activity::Activity;
use crate::client::ApClient;
use crate::convert::account_from_person;
use crate::federator::{FederatingDb, Federator};
use crate::inbox::InboxHandler;
use crate::objects::OrderedCollection;
use crate::request::InboundRequest;
use crate::signature::{HttpSigner, HttpVerifier};
use crate::urls::UrlConfig;

/// Maximum number of inboxes delivered to concurrently for one activity.
const DELIVERY_CONCURRENCY: usize = 8;

/// Production federator.
pub struct HttpFederator {
    db: Arc<dyn Database>,
    client: ApClient,
    urls: UrlConfig,
    ids: Arc<IdGenerator>,
    retry: RetryConfig,
    federating_db: FederatingDb,
    inbox: InboxHandler,
    pool: Arc<WorkerPool<FromFederator>>,
    enabled: bool,
}

impl HttpFederator {
    /// Create a federator that queues received activities on `pool`.
    pub fn new(
        config: &Config,
        db: Arc<dyn Database>,
        ids: Arc<IdGenerator>,
        pool: Arc<WorkerPool<FromFederator>>,
    ) -> AppResult<Self> {
        let client = ApClient::new(
            &config.server.url,
            Duration::from_secs(config.federation.request_timeout_secs),
        )
        .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            urls: UrlConfig::new(&config.server.url),
            retry: RetryConfig::new(
                config.federation.delivery_attempts,
                Duration::from_millis(config.federation.delivery_backoff_ms),
            ),
            federating_db: FederatingDb::new(db.clone()),
            inbox: InboxHandler::new(db.clone(), ids.clone()),
            db,
            ids,
            pool,
            enabled: config.federation.enabled,
        })
    }

    /// Signer for requests made on behalf of a local account.
    async fn signer_for(&self, username: &str) -> AppResult<Option<HttpSigner>> {
        if username.is_empty() {
            return Ok(None);
        }
        let Some(account) = self.db.get_local_account_by_username(username).await? else {
            return Ok(None);
        };
        signer_of(&account).map(Some)
    }

    async fn fetch_account(
        &self,
        username: &str,
        uri: &Url,
        existing: Option<account::Model>,
    ) -> AppResult<account::Model> {
        let signer = self.signer_for(username).await?;
        let person = self
            .client
            .fetch_actor(uri.as_str(), signer.as_ref())
            .await
            .map_err(|e| AppError::Federation(format!("fetching {uri}: {e}")))?;

        // The document may name a canonical ID other than the requested IRI.
        let existing = match existing {
            Some(account) if account.uri == person.id.as_str() => Some(account),
            _ => self.db.get_account_by_uri(person.id.as_str()).await?,
        };
        let account = account_from_person(self.ids.generate(), &person, existing.as_ref())?;

        if existing.is_some() {
            debug!(uri = %account.uri, "Refreshed remote account");
            self.db.update_account(account).await
        } else {
            info!(uri = %account.uri, acct = %account.acct(), "Stored new remote account");
            self.db.put_account(account).await
        }
    }
}

fn signer_of(account: &account::Model) -> AppResult<HttpSigner> {
    let pem = account.private_key_pem.as_deref().ok_or_else(|| {
        AppError::Internal(format!("account {} has no private key", account.id))
    })?;
    HttpSigner::new(pem, account.public_key_uri.clone())
        .map_err(|e| AppError::Internal(format!("signing key of {}: {e}", account.id)))
}

fn unauthorized(e: impl std::fmt::Display) -> AppError {
    AppError::Unauthorized(e.to_string())
}

#[async_trait]
impl Federator for HttpFederator {
    async fn authenticate_federated_request(
        &self,
        request: &InboundRequest,
        username: &str,
    ) -> AppResult<Url> {
        let header = request
            .header("signature")
            .ok_or_else(|| unauthorized("request is not signed"))?;
        let components = HttpVerifier::parse_signature_header(header).map_err(unauthorized)?;
        let actor = Url::parse(components.actor_id()).map_err(unauthorized)?;

        let account = self
            .get_account_by_uri(username, &actor, false)
            .await
            .map_err(unauthorized)?;
        if HttpVerifier::verify(&account.public_key_pem, &components, request)
            .map_err(unauthorized)?
        {
            return Ok(actor);
        }

        // The actor may have rotated its key since we stored it.
        let account = self
            .get_account_by_uri(username, &actor, true)
            .await
            .map_err(unauthorized)?;
        if HttpVerifier::verify(&account.public_key_pem, &components, request)
            .map_err(unauthorized)?
        {
            return Ok(actor);
        }

        warn!(actor = %actor, username = %username, "Rejected request with bad signature");
        Err(unauthorized(format!("signature of {actor} does not verify")))
    }

    async fn get_account_by_uri(
        &self,
        username: &str,
        uri: &Url,
        refresh: bool,
    ) -> AppResult<account::Model> {
        let existing = self.db.get_account_by_uri(uri.as_str()).await?;
        if self.urls.is_local_uri(uri.as_str()) {
            return existing.ok_or_else(|| AppError::NotFound(format!("account {uri}")));
        }
        match existing {
            Some(account) if !refresh => Ok(account),
            existing => self.fetch_account(username, uri, existing).await,
        }
    }

    async fn resolve_account(&self, username: &str, domain: &str) -> AppResult<account::Model> {
        if domain == self.urls.domain() {
            return self
                .db
                .get_local_account_by_username(username)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("account {username}")));
        }
        if let Some(account) = self
            .db
            .get_account_by_username_domain(username, Some(domain))
            .await?
        {
            return Ok(account);
        }

        let iri = self
            .client
            .webfinger(username, domain)
            .await
            .map_err(|e| AppError::NotFound(format!("{username}@{domain}: {e}")))?;
        self.get_account_by_uri("", &Url::parse(&iri)?, false).await
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
        if !self.enabled {
            debug!(activity = %activity.kind, "Federation disabled, not delivering");
            return Ok(());
        }

        let inboxes: BTreeSet<String> = inboxes
            .into_iter()
            .filter(|inbox| !self.urls.is_local_uri(inbox))
            .collect();
        if inboxes.is_empty() {
            return Ok(());
        }

        let signer = signer_of(actor)?;
        let body = serde_json::to_vec(activity)?;
        info!(
            activity = %activity.kind,
            id = %activity.id,
            inboxes = inboxes.len(),
            "Delivering activity"
        );

        futures::stream::iter(inboxes)
            .for_each_concurrent(DELIVERY_CONCURRENCY, |inbox| {
                let signer = &signer;
                let body = &body;
                async move {
                    let result = self
                        .retry
                        .run(|_| self.client.deliver(&inbox, body, signer))
                        .await;
                    get_metrics().record_activity_delivered(result.is_ok());
                    if let Err(e) = result {
                        warn!(inbox = %inbox, error = %e, "Giving up on delivery");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn post_inbox(&self, request: InboundRequest) -> AppResult<bool> {
        if !self.enabled && request.is_activity_pub() {
            return Err(AppError::Forbidden("federation is disabled".to_string()));
        }
        self.inbox.receive(self, request, Some(&self.pool)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use plaza_db::test_utils::{MemoryDatabase, fixtures};

    async fn setup() -> (HttpFederator, Arc<MemoryDatabase>) {
        let db = Arc::new(MemoryDatabase::new());
        let config = Config::for_url("https://plaza.example");
        let pool = Arc::new(WorkerPool::new("federator", 1, 10));
        let federator =
            HttpFederator::new(&config, db.clone(), Arc::new(IdGenerator::new()), pool).unwrap();
        (federator, db)
    }

    #[tokio::test]
    async fn test_local_uri_is_never_fetched() {
        let (federator, _db) = setup().await;
        let uri = Url::parse("https://plaza.example/users/ghost").unwrap();

        let result = federator.get_account_by_uri("", &uri, true).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_known_account_is_served_from_storage() {
        let (federator, db) = setup().await;
        let bob = fixtures::remote_account("01b", "bob", "remote.example");
        db.put_account(bob.clone()).await.unwrap();

        let uri = Url::parse(&bob.uri).unwrap();
        let account = federator.get_account_by_uri("", &uri, false).await.unwrap();
        assert_eq!(account.id, bob.id);

        let resolved = federator
            .resolve_account("bob", "remote.example")
            .await
            .unwrap();
        assert_eq!(resolved.id, bob.id);
    }

    #[tokio::test]
    async fn test_authenticate_with_stored_key() {
        let (federator, db) = setup().await;
        let keys = generate_keypair().unwrap();
        let bob = plaza_db::entities::account::Model {
            public_key_pem: keys.public_key_pem.clone(),
            ..fixtures::remote_account("01b", "bob", "remote.example")
        };
        db.put_account(bob.clone()).await.unwrap();

        let signer = HttpSigner::new(&keys.private_key_pem, bob.public_key_uri.clone()).unwrap();
        let url = Url::parse("https://plaza.example/users/alice/followers").unwrap();
        let headers: HeaderMap = signer.sign_request("GET", &url, None).unwrap();
        let request = InboundRequest::new(
            Method::GET,
            "/users/alice/followers",
            headers,
            Bytes::new(),
        );

        let actor = federator
            .authenticate_federated_request(&request, "alice")
            .await
            .unwrap();
        assert_eq!(actor.as_str(), bob.uri);
    }

    #[tokio::test]
    async fn test_unsigned_request_is_unauthorized() {
        let (federator, _db) = setup().await;
        let request = InboundRequest::get("/users/alice/outbox", HeaderMap::new());

        let result = federator
            .authenticate_federated_request(&request, "alice")
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_non_activitypub_post_is_not_handled() {
        let (federator, _db) = setup().await;
        let request = InboundRequest::new(
            Method::POST,
            "/users/alice/inbox",
            HeaderMap::new(),
            Bytes::from_static(b"hello"),
        );
        assert!(!federator.post_inbox(request).await.unwrap());
    }

    #[tokio::test]
    async fn test_deliver_requires_private_key() {
        let (federator, _db) = setup().await;
        let alice = fixtures::local_account("01a", "alice", "plaza.example");
        let activity = Activity::new(
            plaza_queue::ActivityType::Follow,
            Url::parse("https://plaza.example/users/alice/follow/1").unwrap(),
            Url::parse(&alice.uri).unwrap(),
            "https://remote.example/users/bob",
        );

        let result = federator
            .deliver(&alice, &activity, vec!["https://remote.example/inbox".to_string()])
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        // Nothing remote to deliver to: no key needed.
        federator
            .deliver(&alice, &activity, vec![alice.inbox_uri.clone()])
            .await
            .unwrap();
    }
}
