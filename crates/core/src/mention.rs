//! Resolving `@user@domain` mentions to accounts.

use std::sync::Arc;

use plaza_common::{AppError, AppResult};
use plaza_db::Database;
use plaza_db::entities::account;
use plaza_federation::{Federator, UrlConfig};
use tracing::debug;

use crate::text::MentionName;

/// Looks mentions up locally, then in stored remote accounts, then remotely.
#[derive(Clone)]
pub struct MentionResolver {
    db: Arc<dyn Database>,
    federator: Arc<dyn Federator>,
    urls: UrlConfig,
}

impl MentionResolver {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, federator: Arc<dyn Federator>, urls: UrlConfig) -> Self {
        Self { db, federator, urls }
    }

    /// Resolve `name`, written by `origin`, to an account.
    ///
    /// Fails with `NotFound` when nobody answers to the name.
    pub async fn parse_mention(
        &self,
        name: &MentionName,
        origin: &account::Model,
    ) -> AppResult<account::Model> {
        let local = name
            .domain
            .as_deref()
            .is_none_or(|domain| domain.eq_ignore_ascii_case(self.urls.domain()));

        let found = if local {
            self.db
                .get_local_account_by_username(&name.username.to_lowercase())
                .await?
        } else {
            let domain = name.domain.as_deref().unwrap_or_default();
            match self
                .db
                .get_account_by_username_domain(&name.username, Some(domain))
                .await?
            {
                Some(account) => Some(account),
                None => {
                    debug!(mention = %name, origin = %origin.acct(), "Resolving remote mention");
                    Some(self.federator.resolve_account(&name.username, domain).await?)
                }
            }
        };

        found
            .filter(|account| !account.is_suspended())
            .ok_or_else(|| AppError::NotFound(format!("account {name}")))
    }
}
