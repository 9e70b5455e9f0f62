//! The federation contract consumed by the processing core.

use std::sync::Arc;

use async_trait::async_trait;
use plaza_common::{AppError, AppResult};
use plaza_db::Database;
use plaza_db::entities::{account, follow};
use serde_json::Value;
use url::Url;

use crate::activity::Activity;
use crate::objects::OrderedCollection;
use crate::request::InboundRequest;

/// Transport and protocol services of the federation layer.
#[async_trait]
pub trait Federator: Send + Sync {
    /// Verify the HTTP signature of a request made to `username`'s resources
    /// and return the URI of the signing actor.
    ///
    /// Fails with `Unauthorized` when the request is unsigned or the
    /// signature does not verify.
    async fn authenticate_federated_request(
        &self,
        request: &InboundRequest,
        username: &str,
    ) -> AppResult<Url>;

    /// Look up an account by its actor URI, dereferencing it when unknown or
    /// when `refresh` is set. `username` is the local account on whose
    /// behalf remote requests are signed.
    async fn get_account_by_uri(
        &self,
        username: &str,
        uri: &Url,
        refresh: bool,
    ) -> AppResult<account::Model>;

    /// Find or fetch `username@domain` through `WebFinger`.
    async fn resolve_account(&self, username: &str, domain: &str) -> AppResult<account::Model>;

    /// The followers collection of the account at `account_uri`.
    async fn followers(&self, account_uri: &Url) -> AppResult<OrderedCollection>;

    /// The following collection of the account at `account_uri`.
    async fn following(&self, account_uri: &Url) -> AppResult<OrderedCollection>;

    /// Deliver an activity signed by `actor` to every inbox.
    ///
    /// Individual inbox failures are retried and then logged; the call only
    /// fails when the activity cannot be prepared at all.
    async fn deliver(
        &self,
        actor: &account::Model,
        activity: &Activity,
        inboxes: Vec<String>,
    ) -> AppResult<()>;

    /// Handle a POST to a user or shared inbox.
    ///
    /// Returns `Ok(false)` when the request is not an `ActivityPub` request,
    /// so the caller may handle it some other way.
    async fn post_inbox(&self, request: InboundRequest) -> AppResult<bool>;
}

/// Serves the relationship collections straight from storage.
#[derive(Clone)]
pub struct FederatingDb {
    db: Arc<dyn Database>,
}

impl FederatingDb {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn owner(&self, account_uri: &Url) -> AppResult<account::Model> {
        self.db
            .get_account_by_uri(account_uri.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {account_uri}")))
    }

    async fn collection(
        &self,
        id: &str,
        edges: Vec<follow::Model>,
        pick: fn(&follow::Model) -> &str,
    ) -> AppResult<OrderedCollection> {
        let mut items = Vec::with_capacity(edges.len());
        for edge in &edges {
            if let Some(account) = self.db.get_account_by_id(pick(edge)).await? {
                items.push(Value::String(account.uri));
            }
        }
        Ok(OrderedCollection::with_items(Url::parse(id)?, items))
    }

    /// Actor URIs of every account following `account_uri`.
    pub async fn followers(&self, account_uri: &Url) -> AppResult<OrderedCollection> {
        let owner = self.owner(account_uri).await?;
        let edges = self.db.get_followers(&owner.id).await?;
        self.collection(&owner.followers_uri, edges, |f| f.account_id.as_str())
            .await
    }

    /// Actor URIs of every account `account_uri` follows.
    pub async fn following(&self, account_uri: &Url) -> AppResult<OrderedCollection> {
        let owner = self.owner(account_uri).await?;
        let edges = self.db.get_following(&owner.id).await?;
        self.collection(&owner.following_uri, edges, |f| f.target_account_id.as_str())
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use plaza_db::test_utils::{MemoryDatabase, fixtures};

    #[tokio::test]
    async fn test_followers_collection() {
        let db = Arc::new(MemoryDatabase::new());
        let alice = fixtures::local_account("01a", "alice", "plaza.example");
        let bob = fixtures::remote_account("01b", "bob", "remote.example");
        db.put_account(alice.clone()).await.unwrap();
        db.put_account(bob.clone()).await.unwrap();
        db.put_follow(fixtures::follow("01f", &bob.id, &alice.id))
            .await
            .unwrap();

        let fdb = FederatingDb::new(db);
        let alice_uri = Url::parse(&alice.uri).unwrap();

        let followers = fdb.followers(&alice_uri).await.unwrap();
        assert_eq!(followers.id.as_str(), alice.followers_uri);
        assert_eq!(followers.item_iris(), vec![bob.uri.clone()]);

        let following = fdb.following(&alice_uri).await.unwrap();
        assert_eq!(following.total_items, Some(0));
    }

    #[tokio::test]
    async fn test_unknown_owner() {
        let fdb = FederatingDb::new(Arc::new(MemoryDatabase::new()));
        let uri = Url::parse("https://plaza.example/users/nobody").unwrap();
        assert!(matches!(
            fdb.followers(&uri).await,
            Err(AppError::NotFound(_))
        ));
    }
}
