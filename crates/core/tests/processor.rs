//! End to end behaviour of the processor over the in-memory database and the
//! stub federator.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use plaza_common::{AppError, Config, LocalStorage};
use plaza_core::Processor;
use plaza_core::api::{StatusCreateForm, Visibility};
use plaza_db::{AccountStatusesQuery, Database};
use plaza_db::entities::{account, status};
use plaza_db::test_utils::{MemoryDatabase, fixtures};
use plaza_federation::InboundRequest;
use plaza_federation::test_utils::StubFederator;
use plaza_queue::{ActivityType, WorkerPool};

const HOST: &str = "plaza.test";

struct Harness {
    db: Arc<MemoryDatabase>,
    federator: Arc<StubFederator>,
    processor: Processor,
    yara: account::Model,
    zed: account::Model,
    xavier: account::Model,
}

async fn harness() -> Harness {
    let config = Config::for_url(&format!("https://{HOST}"));
    let db = Arc::new(MemoryDatabase::new());
    let client_pool = Arc::new(WorkerPool::new("client", 2, 64));
    let fed_pool = Arc::new(WorkerPool::new("federator", 2, 64));
    let federator = Arc::new(StubFederator::new(db.clone()).with_pool(fed_pool.clone()));
    let storage = Arc::new(LocalStorage::from_config(&config.media));

    let yara = fixtures::local_account("01y", "yara", HOST);
    let zed = fixtures::local_account("01z", "zed", HOST);
    let xavier = fixtures::remote_account("01x", "xavier", "remote.test");
    for account in [&yara, &zed, &xavier] {
        db.put_account(account.clone()).await.unwrap();
    }

    let processor = Processor::new(
        &config,
        db.clone(),
        federator.clone(),
        storage,
        client_pool,
        fed_pool,
    );
    processor.start().unwrap();

    Harness {
        db,
        federator,
        processor,
        yara,
        zed,
        xavier,
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn signed_get(path: &str) -> InboundRequest {
    InboundRequest::get(path, HeaderMap::new())
}

fn post(text: &str) -> StatusCreateForm {
    StatusCreateForm {
        status: Some(text.to_string()),
        visibility: Some(Visibility::Public),
        ..StatusCreateForm::default()
    }
}

#[tokio::test]
async fn test_bare_outbox_links_to_first_page() {
    let h = harness().await;
    h.db.put_status(fixtures::status("01s1", &h.yara, status::Visibility::Public))
        .await
        .unwrap();
    h.federator.authenticate_as(Some(h.xavier.uri.as_str()));

    let outbox = h
        .processor
        .federation()
        .outbox_get(&signed_get("/users/yara/outbox"), "yara", false, None, None)
        .await
        .unwrap();

    assert_eq!(outbox["type"], "OrderedCollection");
    assert_eq!(outbox["id"], h.yara.outbox_uri.as_str());
    assert_eq!(
        outbox["first"],
        format!("{}?page=true", h.yara.outbox_uri).as_str()
    );
    assert!(outbox.get("orderedItems").is_none());
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_blocked_requester_cannot_read_followers() {
    let h = harness().await;
    h.db.put_follow(fixtures::follow("01f", &h.zed.id, &h.yara.id))
        .await
        .unwrap();
    h.db.put_block(fixtures::block("01b", &h.yara.id, &h.xavier.id))
        .await
        .unwrap();
    h.federator.authenticate_as(Some(h.xavier.uri.as_str()));

    let result = h
        .processor
        .federation()
        .followers_get(&signed_get("/users/yara/followers"), "yara")
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));

    // unblocked requesters get the collection
    h.db.delete_block(&h.yara.id, &h.xavier.id).await.unwrap();
    let followers = h
        .processor
        .federation()
        .followers_get(&signed_get("/users/yara/followers"), "yara")
        .await
        .unwrap();
    assert_eq!(followers["orderedItems"][0], h.zed.uri.as_str());
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_unsigned_and_unknown_requests_are_rejected() {
    let h = harness().await;
    let request = signed_get("/users/yara/following");

    let unsigned = h.processor.federation().following_get(&request, "yara").await;
    assert!(matches!(unsigned, Err(AppError::Unauthorized(_))));

    h.federator.authenticate_as(Some("https://elsewhere.test/users/nobody"));
    let unknown = h.processor.federation().following_get(&request, "yara").await;
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));

    let missing = h.processor.federation().following_get(&request, "nobody").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_outbox_page_is_bounded_by_max_id() {
    let h = harness().await;
    for (id, visibility) in [
        ("01s0", status::Visibility::FollowersOnly),
        ("01s1", status::Visibility::Public),
        ("01s2", status::Visibility::Public),
        ("01s3", status::Visibility::Public),
    ] {
        h.db.put_status(fixtures::status(id, &h.yara, visibility))
            .await
            .unwrap();
    }
    h.federator.authenticate_as(Some(h.xavier.uri.as_str()));

    let page = h
        .processor
        .federation()
        .outbox_get(
            &signed_get("/users/yara/outbox?page=true&max_id=01s2"),
            "yara",
            true,
            Some("01s2"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(page["type"], "OrderedCollectionPage");
    let items = page["orderedItems"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "Create");
    assert_eq!(items[0]["object"]["id"], format!("{}/statuses/01s1", h.yara.uri).as_str());
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_created_status_reaches_follower_timeline_until_deleted() {
    let h = harness().await;
    h.db.put_follow(fixtures::follow("01f", &h.zed.id, &h.yara.id))
        .await
        .unwrap();

    let created = h
        .processor
        .status()
        .create(&h.yara, post("hello followers"))
        .await
        .unwrap();
    assert_eq!(created.content, "<p>hello followers</p>");

    let timelines = h.processor.timelines();
    let zed_id = h.zed.id.as_str();
    eventually(|| async move { timelines.timeline_len(zed_id).await == 1 }).await;

    let page = h
        .processor
        .timeline()
        .home_timeline_get(&h.zed, None, None, None)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, created.id);

    h.processor.status().delete(&h.yara, &created.id).await.unwrap();
    eventually(|| async move { timelines.timeline_len(zed_id).await == 0 }).await;
    let page = h
        .processor
        .timeline()
        .home_timeline_get(&h.zed, None, None, None)
        .await
        .unwrap();
    assert!(page.is_empty());
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_created_status_is_delivered_and_mentions_notify() {
    let h = harness().await;
    h.db.put_follow(fixtures::follow("01f", &h.xavier.id, &h.yara.id))
        .await
        .unwrap();

    let created = h
        .processor
        .status()
        .create(&h.yara, post("hi @zed"))
        .await
        .unwrap();
    assert_eq!(created.mentions.len(), 1);

    let federator = &h.federator;
    eventually(|| async move { !federator.deliveries().is_empty() }).await;
    let delivery = &federator.deliveries()[0];
    assert_eq!(delivery.activity.kind, ActivityType::Create);
    assert_eq!(delivery.actor_id, h.yara.id);
    assert_eq!(delivery.inboxes, vec!["https://remote.test/inbox".to_string()]);

    let db = &h.db;
    let zed_id = h.zed.id.as_str();
    eventually(|| async move { !db.get_notifications(zed_id, 10).await.unwrap().is_empty() }).await;
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_blocking_hides_statuses_both_ways() {
    let h = harness().await;
    h.db.put_follow(fixtures::follow("01f", &h.zed.id, &h.yara.id))
        .await
        .unwrap();
    let created = h
        .processor
        .status()
        .create(&h.yara, post("soon hidden"))
        .await
        .unwrap();

    h.processor.account().block(&h.yara, &h.zed.id).await.unwrap();
    assert!(!h.db.is_following(&h.zed.id, &h.yara.id).await.unwrap());

    let seen = h.processor.status().get(&h.zed, &created.id).await;
    assert!(matches!(seen, Err(AppError::NotFound(_))));
    let page = h
        .processor
        .timeline()
        .home_timeline_get(&h.zed, None, None, None)
        .await
        .unwrap();
    assert!(page.is_empty());

    let follow = h.processor.account().follow(&h.zed, &h.yara.id).await;
    assert!(matches!(follow, Err(AppError::Unauthorized(_))));
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_boost_twice_returns_the_same_boost() {
    let h = harness().await;
    let original = h
        .processor
        .status()
        .create(&h.yara, post("boost me"))
        .await
        .unwrap();

    let first = h.processor.status().boost(&h.zed, &original.id).await.unwrap();
    let second = h.processor.status().boost(&h.zed, &original.id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.reblog.as_ref().unwrap().id, original.id);

    let boosters = h
        .processor
        .status()
        .boosted_by(&h.yara, &original.id)
        .await
        .unwrap();
    assert_eq!(boosters.len(), 1);
    assert_eq!(boosters[0].id, h.zed.id);
    h.processor.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_misuse_is_reported() {
    let h = harness().await;
    assert!(h.processor.start().is_err());
    h.processor.stop().await.unwrap();
    assert!(h.processor.stop().await.is_err());

    let late = h.processor.status().create(&h.yara, post("too late")).await;
    assert!(matches!(late, Err(AppError::Queue(_))));
}

#[tokio::test]
async fn test_writes_are_refused_once_stopped() {
    let h = harness().await;
    h.processor.stop().await.unwrap();

    let created = h.processor.status().create(&h.yara, post("never stored")).await;
    assert!(matches!(created, Err(AppError::Queue(_))));
    let stored = h
        .db
        .get_account_statuses(&AccountStatusesQuery::new(&h.yara.id, 10))
        .await
        .unwrap();
    assert!(stored.is_empty());

    let followed = h.processor.account().follow(&h.zed, &h.yara.id).await;
    assert!(matches!(followed, Err(AppError::Queue(_))));
    assert!(!h.db.is_following(&h.zed.id, &h.yara.id).await.unwrap());

    let blocked = h.processor.account().block(&h.yara, &h.zed.id).await;
    assert!(matches!(blocked, Err(AppError::Queue(_))));
    assert!(!h.db.is_blocked(&h.yara.id, &h.zed.id, true).await.unwrap());
}

#[tokio::test]
async fn test_outbox_page_skips_statuses_that_stay_local() {
    let h = harness().await;
    h.db.put_status(fixtures::status("01a0", &h.yara, status::Visibility::Public))
        .await
        .unwrap();
    for n in 0..30 {
        let local_only = status::Model {
            federated: false,
            ..fixtures::status(&format!("01b{n:02}"), &h.yara, status::Visibility::Public)
        };
        h.db.put_status(local_only).await.unwrap();
    }
    h.federator.authenticate_as(Some(h.xavier.uri.as_str()));

    let page = h
        .processor
        .federation()
        .outbox_get(&signed_get("/users/yara/outbox?page=true"), "yara", true, None, None)
        .await
        .unwrap();

    let items = page["orderedItems"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["object"]["id"],
        format!("{}/statuses/01a0", h.yara.uri).as_str()
    );
    h.processor.stop().await.unwrap();
}
