//! Plain-text status bodies: mention and hashtag extraction, HTML rendering.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use plaza_federation::UrlConfig;
use regex::{Captures, Regex};

#[allow(clippy::unwrap_used)]
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w/@])@([a-zA-Z0-9_]{1,64})(?:@([a-zA-Z0-9][a-zA-Z0-9.\-]*[a-zA-Z0-9](?::\d{1,5})?))?")
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w/&#])#(\w{1,100})").unwrap());

/// A mention as written in a status body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MentionName {
    pub username: String,
    /// `None` for `@user`, which refers to a local account.
    pub domain: Option<String>,
}

impl MentionName {
    /// Parse `@user` or `@user@domain`, with or without the leading `@`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.strip_prefix('@').unwrap_or(name);
        let (username, domain) = match name.split_once('@') {
            Some((user, domain)) => (user, Some(domain)),
            None => (name, None),
        };
        if username.is_empty() || domain.is_some_and(str::is_empty) {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            domain: domain.map(str::to_lowercase),
        })
    }

    /// Case-insensitive lookup key, `user` or `user@domain`.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}@{domain}", self.username.to_lowercase()),
            None => self.username.to_lowercase(),
        }
    }
}

impl fmt::Display for MentionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "@{}@{domain}", self.username),
            None => write!(f, "@{}", self.username),
        }
    }
}

/// Mentions in `text`, first occurrence order, without duplicates.
#[must_use]
pub fn extract_mentions(text: &str) -> Vec<MentionName> {
    let mut seen = Vec::new();
    for caps in MENTION_RE.captures_iter(text) {
        let name = MentionName {
            username: caps[2].to_string(),
            domain: caps.get(3).map(|d| d.as_str().to_lowercase()),
        };
        if !seen.iter().any(|m: &MentionName| m.key() == name.key()) {
            seen.push(name);
        }
    }
    seen
}

/// Lowercased hashtags in `text`, first occurrence order, without duplicates.
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(text) {
        let tag = caps[2].to_lowercase();
        // all-digit tags are issue numbers, not hashtags
        if tag.chars().all(|c| c.is_ascii_digit()) || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
    }
    tags
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a plain-text body as HTML.
///
/// Blank lines separate paragraphs and single newlines become line breaks.
/// Mentions whose [`MentionName::key`] is in `mentions` link to the mapped
/// profile URL; unresolved mentions stay plain text.
#[must_use]
pub fn render_plain(text: &str, mentions: &HashMap<String, String>, urls: &UrlConfig) -> String {
    let local_suffix = format!("@{}", urls.domain());
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|paragraph| {
            let html = escape(paragraph);
            let html = MENTION_RE.replace_all(&html, |caps: &Captures<'_>| {
                let name = MentionName {
                    username: caps[2].to_string(),
                    domain: caps.get(3).map(|d| d.as_str().to_lowercase()),
                };
                let key = name.key();
                let href = mentions
                    .get(&key)
                    .or_else(|| mentions.get(key.trim_end_matches(&local_suffix)));
                match href {
                    Some(href) => format!(
                        r#"{}<span class="h-card"><a href="{href}" class="u-url mention">@<span>{}</span></a></span>"#,
                        &caps[1], &caps[2]
                    ),
                    None => caps[0].to_string(),
                }
            });
            let html = TAG_RE.replace_all(&html, |caps: &Captures<'_>| {
                let tag = &caps[2];
                if tag.chars().all(|c| c.is_ascii_digit()) {
                    return caps[0].to_string();
                }
                format!(
                    r#"{}<a href="{}" class="mention hashtag" rel="tag">#<span>{tag}</span></a>"#,
                    &caps[1],
                    urls.tag_url(&tag.to_lowercase())
                )
            });
            format!("<p>{}</p>", html.replace('\n', "<br />"))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn urls() -> UrlConfig {
        UrlConfig::new("https://plaza.example")
    }

    #[test]
    fn test_extract_mentions() {
        let mentions = extract_mentions(
            "hi @alice and @Bob@Remote.Example, also @alice again; mail me@example.com",
        );
        assert_eq!(
            mentions,
            vec![
                MentionName {
                    username: "alice".to_string(),
                    domain: None
                },
                MentionName {
                    username: "Bob".to_string(),
                    domain: Some("remote.example".to_string())
                },
            ]
        );
        assert_eq!(mentions[1].to_string(), "@Bob@remote.example");
        assert_eq!(mentions[1].key(), "bob@remote.example");
    }

    #[test]
    fn test_parse_mention_name() {
        let name = MentionName::parse("@zork@plaza.example").unwrap();
        assert_eq!(name.username, "zork");
        assert_eq!(name.domain.as_deref(), Some("plaza.example"));
        assert_eq!(MentionName::parse("zork").unwrap().domain, None);
        assert!(MentionName::parse("@").is_none());
        assert!(MentionName::parse("@zork@").is_none());
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("#Rust and #rust, not a#tag, issue #42, #fedi_dev");
        assert_eq!(tags, vec!["rust", "fedi_dev"]);
    }

    #[test]
    fn test_render_escapes_and_links() {
        let mut mentions = HashMap::new();
        mentions.insert(
            "bob@remote.example".to_string(),
            "https://remote.example/@bob".to_string(),
        );
        let html = render_plain(
            "<b>hi</b> @bob@remote.example @nobody\nsee #Rust\n\nbye",
            &mentions,
            &urls(),
        );
        assert_eq!(
            html,
            concat!(
                "<p>&lt;b&gt;hi&lt;/b&gt; ",
                r#"<span class="h-card"><a href="https://remote.example/@bob" class="u-url mention">@<span>bob</span></a></span>"#,
                " @nobody<br />see ",
                r#"<a href="https://plaza.example/tags/rust" class="mention hashtag" rel="tag">#<span>Rust</span></a>"#,
                "</p><p>bye</p>"
            )
        );
    }

    #[test]
    fn test_render_local_mention_with_domain() {
        let mut mentions = HashMap::new();
        mentions.insert(
            "alice".to_string(),
            "https://plaza.example/@alice".to_string(),
        );
        let html = render_plain("@alice@plaza.example it's me", &mentions, &urls());
        assert!(html.contains(r#"href="https://plaza.example/@alice""#));
        assert!(html.contains("it&#39;s"));
    }
}
