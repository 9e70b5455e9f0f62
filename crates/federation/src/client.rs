//! Outbound HTTP for federation: signed delivery, dereferencing and `WebFinger`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::actors::ApPerson;
use crate::signature::{HttpSigner, SignatureError};

const AP_ACCEPT: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

/// Error type for AP client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Signing failed: {0}")]
    Signing(#[from] SignatureError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApClientError {
    /// Client errors other than rate limiting will not succeed on retry.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 400 && *status < 500 && *status != 429,
            Self::InvalidUrl(_) | Self::Signing(_) => true,
            _ => false,
        }
    }
}

/// HTTP client for talking to remote `ActivityPub` servers.
#[derive(Clone, Debug)]
pub struct ApClient {
    client: Client,
    user_agent: String,
}

impl ApClient {
    /// Create a client identifying itself as this instance.
    pub fn new(instance_url: &str, timeout: Duration) -> Result<Self, ApClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            user_agent: format!("plaza/{} (+{instance_url})", env!("CARGO_PKG_VERSION")),
        })
    }

    /// The `User-Agent` sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// POST a serialized activity to an inbox, signed by `signer`.
    ///
    /// `410 Gone` counts as delivered: the recipient no longer exists.
    pub async fn deliver(
        &self,
        inbox: &str,
        body: &[u8],
        signer: &HttpSigner,
    ) -> Result<(), ApClientError> {
        let url = Url::parse(inbox).map_err(|e| ApClientError::InvalidUrl(e.to_string()))?;
        let headers = signer.sign_request("POST", &url, Some(body))?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .header("User-Agent", &self.user_agent)
            .header("Content-Type", "application/activity+json")
            .header("Accept", AP_ACCEPT)
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(inbox = %inbox, status = %status, "Activity delivered");
            return Ok(());
        }
        if status == StatusCode::GONE {
            warn!(inbox = %inbox, "Remote inbox is gone");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// GET an `ActivityPub` document, signing the request when a signer is given.
    pub async fn fetch(&self, iri: &str, signer: Option<&HttpSigner>) -> Result<Value, ApClientError> {
        let url = Url::parse(iri).map_err(|e| ApClientError::InvalidUrl(e.to_string()))?;
        debug!(iri = %iri, signed = signer.is_some(), "Dereferencing remote object");

        let mut request = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .header("Accept", AP_ACCEPT);
        if let Some(signer) = signer {
            request = request.headers(signer.sign_request("GET", &url, None)?);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch and parse an actor document.
    pub async fn fetch_actor(
        &self,
        iri: &str,
        signer: Option<&HttpSigner>,
    ) -> Result<ApPerson, ApClientError> {
        let document = self.fetch(iri, signer).await?;
        let person: ApPerson = serde_json::from_value(document)
            .map_err(|e| ApClientError::InvalidResponse(format!("not an actor: {e}")))?;
        if person.id.as_str() != iri {
            // Some servers redirect profile URLs to the canonical actor ID.
            info!(requested = %iri, actual = %person.id, "Actor ID differs from requested IRI");
        }
        Ok(person)
    }

    /// Resolve `username@domain` to an actor IRI through `WebFinger`.
    pub async fn webfinger(&self, username: &str, domain: &str) -> Result<String, ApClientError> {
        let url = Url::parse_with_params(
            &format!("https://{domain}/.well-known/webfinger"),
            &[("resource", format!("acct:{username}@{domain}"))],
        )
        .map_err(|e| ApClientError::InvalidUrl(e.to_string()))?;

        debug!(username = %username, domain = %domain, "Performing WebFinger lookup");

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/jrd+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let jrd: Value = response.json().await?;
        actor_link(&jrd).ok_or_else(|| {
            ApClientError::InvalidResponse(format!("no self link for {username}@{domain}"))
        })
    }
}

/// The `self` link of a `WebFinger` response with an `ActivityPub` media type.
fn actor_link(jrd: &Value) -> Option<String> {
    jrd.get("links")?
        .as_array()?
        .iter()
        .find(|link| {
            link.get("rel").and_then(Value::as_str) == Some("self")
                && link
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.contains("activity+json") || t.contains("ld+json"))
        })
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ApClient::new("https://plaza.example", Duration::from_secs(5)).unwrap();
        assert!(client.user_agent().starts_with("plaza/"));
        assert!(client.user_agent().contains("https://plaza.example"));
    }

    #[test]
    fn test_actor_link() {
        let jrd = serde_json::json!({
            "subject": "acct:bob@remote.example",
            "links": [
                { "rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": "https://remote.example/@bob" },
                { "rel": "self", "type": "application/activity+json", "href": "https://remote.example/users/bob" }
            ]
        });
        assert_eq!(
            actor_link(&jrd).as_deref(),
            Some("https://remote.example/users/bob")
        );
        assert!(actor_link(&serde_json::json!({ "links": [] })).is_none());
    }

    #[test]
    fn test_permanent_errors() {
        let gone = ApClientError::Status {
            status: 404,
            body: String::new(),
        };
        let limited = ApClientError::Status {
            status: 429,
            body: String::new(),
        };
        let unavailable = ApClientError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(gone.is_permanent());
        assert!(!limited.is_permanent());
        assert!(!unavailable.is_permanent());
    }
}
