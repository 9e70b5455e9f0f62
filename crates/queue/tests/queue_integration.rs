//! Queue integration tests.
//!
//! Drive two independent pools with real message types the way the
//! processor does.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use plaza_common::AppError;
use plaza_db::entities::status::Visibility;
use plaza_db::test_utils::fixtures;
use plaza_queue::{ActivityType, FromClientApi, FromFederator, Payload, WorkerPool};

fn client_message(n: usize) -> FromClientApi {
    let author = fixtures::local_account("01author", "author", "plaza.test");
    let status = fixtures::status(&format!("s{n:04}"), &author, Visibility::Public);
    FromClientApi::new(ActivityType::Create, Payload::Status(Box::new(status)), author)
}

fn status_id(msg: &FromClientApi) -> String {
    match &msg.object {
        Payload::Status(status) => status.id.clone(),
        other => panic!("unexpected payload {}", other.kind()),
    }
}

#[tokio::test]
async fn test_sequential_enqueue_is_observed_in_order() {
    let pool = WorkerPool::new("client", 1, 16);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pool.set_processor(move |msg: FromClientApi| {
        let sink = Arc::clone(&sink);
        async move {
            tokio::task::yield_now().await;
            sink.lock().unwrap().push(status_id(&msg));
            Ok(())
        }
        .boxed()
    })
    .unwrap();
    pool.start().unwrap();

    let expected: Vec<String> = (0..250).map(|n| format!("s{n:04}")).collect();
    for n in 0..250 {
        pool.enqueue(client_message(n)).await.unwrap();
    }
    pool.stop().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_failed_message_does_not_block_the_rest() {
    let pool = WorkerPool::new("client", 1, 4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pool.set_processor(move |msg: FromClientApi| {
        let sink = Arc::clone(&sink);
        async move {
            let id = status_id(&msg);
            if id == "s0004" {
                panic!("cannot process {id}");
            }
            if id == "s0007" {
                return Err(AppError::Federation("remote unreachable".to_string()));
            }
            sink.lock().unwrap().push(id);
            Ok(())
        }
        .boxed()
    })
    .unwrap();
    pool.start().unwrap();

    for n in 0..20 {
        pool.enqueue(client_message(n)).await.unwrap();
    }
    pool.stop().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 18);
    assert!(seen.contains(&"s0019".to_string()));
    assert!(!seen.contains(&"s0004".to_string()));
    assert_eq!(pool.stats().failed, 2);
}

#[tokio::test]
async fn test_pools_are_independent() {
    let client: WorkerPool<FromClientApi> = WorkerPool::new("client", 2, 4);
    let federator: WorkerPool<FromFederator> = WorkerPool::new("federator", 2, 4);
    client.set_processor(|_| async { Ok(()) }.boxed()).unwrap();
    federator
        .set_processor(|_| async { Ok(()) }.boxed())
        .unwrap();

    client.start().unwrap();
    federator.start().unwrap();
    client.stop().await.unwrap();

    let receiver = fixtures::local_account("01recv", "receiver", "plaza.test");
    let msg = FromFederator::new(
        ActivityType::Delete,
        Payload::Iri("https://remote.example/statuses/1".to_string()),
        receiver,
    );
    federator.enqueue(msg).await.unwrap();
    assert!(client.enqueue(client_message(1)).await.is_err());

    federator.stop().await.unwrap();
    assert_eq!(federator.stats().processed, 1);
}
