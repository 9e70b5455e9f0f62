//! `ActivityPub` HTTP surface over the processor.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use plaza_common::AppResult;
use plaza_core::Processor;
use plaza_federation::InboundRequest;
use serde::Deserialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info};

const ACTIVITY_JSON: &str = "application/activity+json; charset=utf-8";
/// Largest inbox body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutboxQuery {
    pub page: Option<bool>,
    pub max_id: Option<String>,
    pub min_id: Option<String>,
}

/// Every federation route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users/{username}", get(user_handler))
        .route("/users/{username}/statuses/{id}", get(status_handler))
        .route("/users/{username}/followers", get(followers_handler))
        .route("/users/{username}/following", get(following_handler))
        .route("/users/{username}/outbox", get(outbox_handler))
        .route("/users/{username}/inbox", post(inbox_handler))
        .route("/inbox", post(inbox_handler))
        .with_state(state)
}

/// The router with tracing, request timeout and body limit applied.
pub fn app(state: AppState) -> Router {
    router(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

fn inbound(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> InboundRequest {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    InboundRequest::new(method, path, headers, body)
}

fn activity_json(value: Value) -> Response {
    ([("Content-Type", ACTIVITY_JSON)], Json(value)).into_response()
}

async fn user_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let request = inbound(Method::GET, &uri, headers, Bytes::new());
    let person = state.processor.federation().user_get(&request, &username).await?;
    Ok(activity_json(person))
}

async fn status_handler(
    State(state): State<AppState>,
    Path((username, id)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let request = inbound(Method::GET, &uri, headers, Bytes::new());
    let note = state
        .processor
        .federation()
        .status_get(&request, &username, &id)
        .await?;
    Ok(activity_json(note))
}

async fn followers_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    debug!(username = %username, "ActivityPub followers lookup");
    let request = inbound(Method::GET, &uri, headers, Bytes::new());
    let collection = state
        .processor
        .federation()
        .followers_get(&request, &username)
        .await?;
    Ok(activity_json(collection))
}

async fn following_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    debug!(username = %username, "ActivityPub following lookup");
    let request = inbound(Method::GET, &uri, headers, Bytes::new());
    let collection = state
        .processor
        .federation()
        .following_get(&request, &username)
        .await?;
    Ok(activity_json(collection))
}

async fn outbox_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<OutboxQuery>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    debug!(username = %username, page = ?query.page, "ActivityPub outbox lookup");
    let request = inbound(Method::GET, &uri, headers, Bytes::new());
    let outbox = state
        .processor
        .federation()
        .outbox_get(
            &request,
            &username,
            query.page.unwrap_or(false),
            query.max_id.as_deref(),
            query.min_id.as_deref(),
        )
        .await?;
    Ok(activity_json(outbox))
}

/// Shared and per-user inbox. Requests that are not `ActivityPub` at all
/// are answered with 404 so another handler may claim the path.
async fn inbox_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let request = inbound(Method::POST, &uri, headers, body);
    if state.processor.federation().inbox_post(request).await? {
        info!(path = %uri.path(), "Accepted inbox delivery");
        Ok(StatusCode::ACCEPTED.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use plaza_common::{Config, LocalStorage};
    use plaza_db::Database;
    use plaza_db::test_utils::{MemoryDatabase, fixtures};
    use plaza_federation::test_utils::StubFederator;
    use plaza_queue::WorkerPool;
    use tower::ServiceExt;

    async fn setup() -> (Router, Arc<StubFederator>, Arc<Processor>) {
        let config = Config::for_url("https://plaza.example");
        let db = Arc::new(MemoryDatabase::new());
        db.put_account(fixtures::local_account("01a", "alice", "plaza.example"))
            .await
            .unwrap();
        db.put_account(fixtures::remote_account("01r", "rob", "remote.example"))
            .await
            .unwrap();

        let client_pool = Arc::new(WorkerPool::new("client", 1, 16));
        let fed_pool = Arc::new(WorkerPool::new("federator", 1, 16));
        let federator = Arc::new(StubFederator::new(db.clone()).with_pool(fed_pool.clone()));
        let processor = Arc::new(Processor::new(
            &config,
            db,
            federator.clone(),
            Arc::new(LocalStorage::from_config(&config.media)),
            client_pool,
            fed_pool,
        ));
        processor.start().unwrap();
        let app = app(AppState {
            processor: processor.clone(),
        });
        (app, federator, processor)
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (app, federator, processor) = setup().await;
        federator.authenticate_as(Some("https://remote.example/users/rob"));

        let response = app
            .oneshot(
                Request::get("/users/nobody/followers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        processor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsigned_collection_request_is_unauthorized() {
        let (app, _federator, processor) = setup().await;

        let response = app
            .oneshot(
                Request::get("/users/alice/following")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        processor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_outbox_is_served_as_activity_json() {
        let (app, federator, processor) = setup().await;
        federator.authenticate_as(Some("https://remote.example/users/rob"));

        let response = app
            .oneshot(
                Request::get("/users/alice/outbox")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], ACTIVITY_JSON);
        processor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_activitypub_inbox_post_falls_through() {
        let (app, _federator, processor) = setup().await;

        let response = app
            .oneshot(
                Request::post("/inbox")
                    .header("content-type", "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        processor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_inbox_body_is_rejected() {
        let (app, _federator, processor) = setup().await;

        let response = app
            .oneshot(
                Request::post("/inbox")
                    .header("content-type", "application/activity+json")
                    .body(Body::from(vec![b' '; MAX_BODY_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        processor.stop().await.unwrap();
    }
}
