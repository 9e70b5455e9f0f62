//! HTTP signatures (draft-cavage) for federation requests.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{SigningKey, VerifyingKey},
};
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use tracing::{debug, warn};
use url::Url;

use crate::request::InboundRequest;

/// Maximum accepted difference between a signed `Date` header and now.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// HTTP signature error.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
    #[error("Missing header: {0}")]
    MissingHeader(String),
    #[error("Invalid signature header")]
    InvalidSignatureHeader,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Signature expired: clock skew too large")]
    ExpiredSignature,
    #[error("Invalid date header: {0}")]
    InvalidDate(String),
    #[error("Digest does not match body")]
    DigestMismatch,
}

/// Signs outgoing requests on behalf of one local account.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl std::fmt::Debug for HttpSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl HttpSigner {
    /// Create a signer from a PKCS#8 PEM private key.
    pub fn new(private_key_pem: &str, key_id: impl Into<String>) -> Result<Self, SignatureError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignatureError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            private_key,
            key_id: key_id.into(),
        })
    }

    /// Sign a request and return the headers to send with it.
    ///
    /// `(request-target)`, `host` and `date` are always signed, `digest` when
    /// there is a body.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = url
            .host_str()
            .ok_or_else(|| SignatureError::InvalidUrl(format!("no host in {url}")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let query = url.query().map_or(String::new(), |q| format!("?{q}"));
        let request_target = format!("{} {}{query}", method.to_lowercase(), url.path());
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let digest = body.map(calculate_digest);

        let mut signed: Vec<(&str, String)> = vec![
            ("(request-target)", request_target),
            ("host", host.clone()),
            ("date", date.clone()),
        ];
        if let Some(d) = &digest {
            signed.push(("digest", d.clone()));
        }

        let signing_string = signed
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        debug!(key_id = %self.key_id, signing_string = %signing_string, "Signing request");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        let header_names = signed
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(" ");
        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{header_names}\",signature=\"{}\"",
            self.key_id,
            BASE64.encode(signature.to_bytes())
        );

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "host", &host)?;
        insert_header(&mut headers, "date", &date)?;
        if let Some(d) = &digest {
            insert_header(&mut headers, "digest", d)?;
        }
        insert_header(&mut headers, "signature", &signature_header)?;
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), SignatureError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}

/// Parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureComponents {
    pub key_id: String,
    pub algorithm: String,
    pub headers: Vec<String>,
    pub signature: String,
}

impl SignatureComponents {
    /// The actor owning the signing key: the key ID without its fragment.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        self.key_id.split('#').next().unwrap_or(&self.key_id)
    }
}

/// Verifies signatures on inbound requests.
pub struct HttpVerifier;

impl HttpVerifier {
    /// Parse a `Signature` header into its components.
    pub fn parse_signature_header(header: &str) -> Result<SignatureComponents, SignatureError> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for part in header.split(',') {
            if let Some((key, value)) = part.trim().split_once('=') {
                fields.insert(key.trim(), value.trim().trim_matches('"'));
            }
        }

        Ok(SignatureComponents {
            key_id: fields
                .get("keyId")
                .ok_or(SignatureError::InvalidSignatureHeader)?
                .to_string(),
            algorithm: fields
                .get("algorithm")
                .map_or_else(|| "rsa-sha256".to_string(), ToString::to_string),
            headers: fields
                .get("headers")
                .copied()
                .unwrap_or("date")
                .split_whitespace()
                .map(String::from)
                .collect(),
            signature: fields
                .get("signature")
                .ok_or(SignatureError::InvalidSignatureHeader)?
                .to_string(),
        })
    }

    /// Rebuild the signing string of `request` for the signed header list.
    pub fn signing_string(
        request: &InboundRequest,
        components: &SignatureComponents,
    ) -> Result<String, SignatureError> {
        let mut parts = Vec::with_capacity(components.headers.len());
        for name in &components.headers {
            let value = match name.as_str() {
                "(request-target)" => request.request_target(),
                h => request
                    .header(h)
                    .ok_or_else(|| SignatureError::MissingHeader(h.to_string()))?
                    .to_string(),
            };
            parts.push(format!("{name}: {value}"));
        }
        Ok(parts.join("\n"))
    }

    /// Verify the signature of `request` against the signer's public key.
    ///
    /// Checks the `Date` header freshness and the body digest before the
    /// signature itself.
    pub fn verify(
        public_key_pem: &str,
        components: &SignatureComponents,
        request: &InboundRequest,
    ) -> Result<bool, SignatureError> {
        if let Some(date) = request.header("date") {
            validate_date(date, Utc::now())?;
        }
        if !request.body.is_empty() {
            let digest = request
                .header("digest")
                .ok_or_else(|| SignatureError::MissingHeader("digest".to_string()))?;
            if !verify_digest(&request.body, digest) {
                return Err(SignatureError::DigestMismatch);
            }
        }

        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
        let signing_string = Self::signing_string(request, components)?;

        let signature_bytes = BASE64
            .decode(&components.signature)
            .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;
        let signature = rsa::pkcs1v15::Signature::try_from(signature_bytes.as_slice())
            .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;

        let verifying_key = VerifyingKey::<Sha256>::new(public_key);
        match verifying_key.verify(signing_string.as_bytes(), &signature) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(key_id = %components.key_id, error = %e, "Signature mismatch");
                Ok(false)
            }
        }
    }
}

/// Reject `Date` headers further than [`MAX_CLOCK_SKEW_SECS`] from `now`.
pub fn validate_date(date_header: &str, now: DateTime<Utc>) -> Result<(), SignatureError> {
    let date = parse_http_date(date_header)?;
    if (now - date).abs() > Duration::seconds(MAX_CLOCK_SKEW_SECS) {
        return Err(SignatureError::ExpiredSignature);
    }
    Ok(())
}

/// Parse an HTTP date (RFC 7231, RFC 2822 or RFC 850).
fn parse_http_date(value: &str) -> Result<DateTime<Utc>, SignatureError> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%a, %d %b %Y %H:%M:%S GMT", "%A, %d-%b-%y %H:%M:%S GMT"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }
    Err(SignatureError::InvalidDate(value.to_string()))
}

/// SHA-256 digest header value for a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    format!("SHA-256={}", BASE64.encode(Sha256::digest(body)))
}

/// Whether a digest header matches the body.
#[must_use]
pub fn verify_digest(body: &[u8], digest_header: &str) -> bool {
    calculate_digest(body) == digest_header
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use axum::body::Bytes;
    use axum::http::Method;

    fn inbound_from(signed: &HeaderMap, method: Method, path: &str, body: &[u8]) -> InboundRequest {
        InboundRequest::new(method, path, signed.clone(), Bytes::copy_from_slice(body))
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = generate_keypair().unwrap();
        let signer =
            HttpSigner::new(&keys.private_key_pem, "https://plaza.example/users/a#main-key")
                .unwrap();

        let url = Url::parse("https://remote.example/users/b/inbox").unwrap();
        let body = br#"{"type":"Create"}"#;
        let headers = signer.sign_request("POST", &url, Some(body)).unwrap();

        let request = inbound_from(&headers, Method::POST, "/users/b/inbox", body);
        let components =
            HttpVerifier::parse_signature_header(request.header("signature").unwrap()).unwrap();

        assert_eq!(components.actor_id(), "https://plaza.example/users/a");
        assert!(HttpVerifier::verify(&keys.public_key_pem, &components, &request).unwrap());
    }

    #[test]
    fn test_verify_rejects_other_path() {
        let keys = generate_keypair().unwrap();
        let signer = HttpSigner::new(&keys.private_key_pem, "https://a.example/u#main-key").unwrap();
        let url = Url::parse("https://b.example/users/b/outbox").unwrap();
        let headers = signer.sign_request("GET", &url, None).unwrap();

        let request = inbound_from(&headers, Method::GET, "/users/b/followers", b"");
        let components =
            HttpVerifier::parse_signature_header(request.header("signature").unwrap()).unwrap();

        assert!(!HttpVerifier::verify(&keys.public_key_pem, &components, &request).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let keys = generate_keypair().unwrap();
        let signer = HttpSigner::new(&keys.private_key_pem, "https://a.example/u#main-key").unwrap();
        let url = Url::parse("https://b.example/inbox").unwrap();
        let headers = signer.sign_request("POST", &url, Some(b"original")).unwrap();

        let request = inbound_from(&headers, Method::POST, "/inbox", b"tampered");
        let components =
            HttpVerifier::parse_signature_header(request.header("signature").unwrap()).unwrap();

        assert!(matches!(
            HttpVerifier::verify(&keys.public_key_pem, &components, &request),
            Err(SignatureError::DigestMismatch)
        ));
    }

    #[test]
    fn test_parse_signature_header() {
        let header = r#"keyId="https://example.com/users/test#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="abc123==""#;
        let components = HttpVerifier::parse_signature_header(header).unwrap();

        assert_eq!(components.key_id, "https://example.com/users/test#main-key");
        assert_eq!(
            components.headers,
            vec!["(request-target)", "host", "date", "digest"]
        );
        assert_eq!(components.signature, "abc123==");
    }

    #[test]
    fn test_parse_signature_header_requires_key_id() {
        assert!(HttpVerifier::parse_signature_header(r#"signature="abc""#).is_err());
    }

    #[test]
    fn test_validate_date() {
        let now = Utc::now();
        let fresh = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        assert!(validate_date(&fresh, now).is_ok());

        let stale = (now - Duration::hours(1))
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        assert!(matches!(
            validate_date(&stale, now),
            Err(SignatureError::ExpiredSignature)
        ));
        assert!(validate_date("yesterday", now).is_err());
    }

    #[test]
    fn test_digest() {
        let digest = calculate_digest(b"hello world");
        assert!(digest.starts_with("SHA-256="));
        assert!(verify_digest(b"hello world", &digest));
        assert!(!verify_digest(b"wrong body", &digest));
    }
}
