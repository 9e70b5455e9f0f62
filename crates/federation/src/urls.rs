//! `ActivityPub` URIs of local actors and objects.

/// Builds URIs under this instance's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlConfig {
    base_url: String,
}

impl UrlConfig {
    /// Create a URL config for `base_url`, e.g. `https://plaza.example`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Host (and port) of this instance.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest)
    }

    #[must_use]
    pub fn user_uri(&self, username: &str) -> String {
        format!("{}/users/{username}", self.base_url)
    }

    /// Human readable profile page.
    #[must_use]
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/@{username}", self.base_url)
    }

    #[must_use]
    pub fn inbox_uri(&self, username: &str) -> String {
        format!("{}/inbox", self.user_uri(username))
    }

    #[must_use]
    pub fn outbox_uri(&self, username: &str) -> String {
        format!("{}/outbox", self.user_uri(username))
    }

    #[must_use]
    pub fn followers_uri(&self, username: &str) -> String {
        format!("{}/followers", self.user_uri(username))
    }

    #[must_use]
    pub fn following_uri(&self, username: &str) -> String {
        format!("{}/following", self.user_uri(username))
    }

    #[must_use]
    pub fn shared_inbox_uri(&self) -> String {
        format!("{}/inbox", self.base_url)
    }

    #[must_use]
    pub fn public_key_uri(&self, username: &str) -> String {
        format!("{}#main-key", self.user_uri(username))
    }

    #[must_use]
    pub fn status_uri(&self, username: &str, status_id: &str) -> String {
        format!("{}/statuses/{status_id}", self.user_uri(username))
    }

    /// Human readable status page.
    #[must_use]
    pub fn status_url(&self, username: &str, status_id: &str) -> String {
        format!("{}/{status_id}", self.profile_url(username))
    }

    /// ID of an activity that has no stored object of its own, e.g. an Undo.
    #[must_use]
    pub fn activity_uri(&self, username: &str, id: &str) -> String {
        format!("{}#activities/{id}", self.user_uri(username))
    }

    #[must_use]
    pub fn follow_uri(&self, username: &str, follow_id: &str) -> String {
        format!("{}/follow/{follow_id}", self.user_uri(username))
    }

    #[must_use]
    pub fn like_uri(&self, username: &str, fave_id: &str) -> String {
        format!("{}/liked/{fave_id}", self.user_uri(username))
    }

    #[must_use]
    pub fn block_uri(&self, username: &str, block_id: &str) -> String {
        format!("{}/blocks/{block_id}", self.user_uri(username))
    }

    #[must_use]
    pub fn report_uri(&self, report_id: &str) -> String {
        format!("{}/reports/{report_id}", self.base_url)
    }

    /// Tag page linked from rendered hashtags.
    #[must_use]
    pub fn tag_url(&self, tag: &str) -> String {
        format!("{}/tags/{tag}", self.base_url)
    }

    /// Whether `uri` points into this instance.
    #[must_use]
    pub fn is_local_uri(&self, uri: &str) -> bool {
        uri.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('#'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let urls = UrlConfig::new("https://plaza.example/");
        assert_eq!(urls.domain(), "plaza.example");
        assert_eq!(urls.user_uri("alice"), "https://plaza.example/users/alice");
        assert_eq!(
            urls.outbox_uri("alice"),
            "https://plaza.example/users/alice/outbox"
        );
        assert_eq!(
            urls.public_key_uri("alice"),
            "https://plaza.example/users/alice#main-key"
        );
        assert_eq!(
            urls.status_uri("alice", "01h"),
            "https://plaza.example/users/alice/statuses/01h"
        );
    }

    #[test]
    fn test_is_local_uri() {
        let urls = UrlConfig::new("https://plaza.example");
        assert!(urls.is_local_uri("https://plaza.example/users/alice"));
        assert!(!urls.is_local_uri("https://plaza.example.evil/users/alice"));
        assert!(!urls.is_local_uri("https://remote.example/users/bob"));
    }
}
