//! Transport-agnostic view of an inbound federation request.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

const AP_CONTENT_TYPES: [&str; 2] = ["application/activity+json", "application/ld+json"];

/// An HTTP request addressed to a federation endpoint.
///
/// Handlers build one from the raw request parts so that signature
/// verification and inbox processing do not depend on the web framework.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path plus query string, exactly as signed by the sender.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Assemble a request from its parts.
    #[must_use]
    pub fn new(
        method: Method,
        path_and_query: impl Into<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers,
            body,
        }
    }

    /// A bodiless GET request.
    #[must_use]
    pub fn get(path_and_query: impl Into<String>, headers: HeaderMap) -> Self {
        Self::new(Method::GET, path_and_query, headers, Bytes::new())
    }

    /// A header value, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `(request-target)` pseudo header used in HTTP signatures.
    #[must_use]
    pub fn request_target(&self) -> String {
        format!(
            "{} {}",
            self.method.as_str().to_lowercase(),
            self.path_and_query
        )
    }

    /// Whether the request declares an `ActivityPub` body or asks for one.
    #[must_use]
    pub fn is_activity_pub(&self) -> bool {
        let header = if self.method == Method::POST {
            "content-type"
        } else {
            "accept"
        };
        self.header(header)
            .is_some_and(|value| AP_CONTENT_TYPES.iter().any(|ct| value.contains(ct)))
    }
}
