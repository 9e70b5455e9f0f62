//! Home timelines: the strategies driving the timeline manager, and serving pages.

use std::sync::Arc;

use futures::FutureExt;
use plaza_common::AppResult;
use plaza_common::config::TimelineConfig;
use plaza_db::Database;
use plaza_db::entities::account;

use crate::api;
use crate::timeline::{Manager, Strategies, Timelineable};
use crate::typeutils::TypeConverter;
use crate::visibility::Filter;

/// Largest page a client may ask for.
const MAX_PAGE_LIMIT: usize = 80;

/// Strategies for home timelines of prepared API statuses.
///
/// - grab: the account's own statuses and those of accounts it follows
/// - filter: [`Filter::status_home_timelineable`] on fresh copies of both sides
/// - prepare: the API status as seen by the owner
/// - skip-insert: a boost whose original, or another boost of it, is already
///   near the top
pub fn home_timeline_strategies(
    db: Arc<dyn Database>,
    filter: Filter,
    converter: Arc<dyn TypeConverter>,
    config: &TimelineConfig,
) -> Strategies<api::Status> {
    let grab_db = Arc::clone(&db);
    let filter_db = Arc::clone(&db);
    let prepare_db = db;
    let depth = config.boost_reinsertion_depth;

    Strategies {
        grab: Arc::new(move |account_id, max_id, min_id, limit| {
            let db = Arc::clone(&grab_db);
            async move {
                let statuses = db
                    .get_home_timeline_statuses(
                        &account_id,
                        max_id.as_deref(),
                        min_id.as_deref(),
                        limit,
                    )
                    .await?;
                let exhausted = statuses.len() < limit;
                Ok((statuses.iter().map(Timelineable::from).collect(), exhausted))
            }
            .boxed()
        }),
        filter: Arc::new(move |account_id, item| {
            let db = Arc::clone(&filter_db);
            let filter = filter.clone();
            async move {
                let (Some(owner), Some(status)) = (
                    db.get_account_by_id(&account_id).await?,
                    db.get_status_by_id(&item.id).await?,
                ) else {
                    return Ok(false);
                };
                filter.status_home_timelineable(&owner, &status).await
            }
            .boxed()
        }),
        prepare: Arc::new(move |account_id, item| {
            let db = Arc::clone(&prepare_db);
            let converter = Arc::clone(&converter);
            async move {
                let owner = db.get_account_by_id(&account_id).await?;
                let status = db.get_status_by_id(&item.id).await?.ok_or_else(|| {
                    plaza_common::AppError::NotFound(format!("status {} not found", item.id))
                })?;
                converter.status_to_api(&status, owner.as_ref()).await
            }
            .boxed()
        }),
        skip_insert: Arc::new(move |new, next, position| {
            if new.id == next.id {
                return true;
            }
            new.boost_of_id.is_some()
                && (new.boost_of_id == next.boost_of_id
                    || new.boost_of_id.as_deref() == Some(next.id.as_str()))
                && position < depth
        }),
    }
}

/// Serves home timelines.
#[derive(Clone)]
pub struct TimelineProcessor {
    timelines: Arc<Manager<api::Status>>,
    default_limit: usize,
}

impl TimelineProcessor {
    #[must_use]
    pub const fn new(timelines: Arc<Manager<api::Status>>, default_limit: usize) -> Self {
        Self {
            timelines,
            default_limit,
        }
    }

    /// A page of `account`'s home timeline, newest first.
    pub async fn home_timeline_get(
        &self,
        account: &account::Model,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: Option<usize>,
    ) -> AppResult<Vec<api::Status>> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.default_limit)
            .min(MAX_PAGE_LIMIT);
        self.timelines
            .get_timeline_page(&account.id, max_id, min_id, limit)
            .await
    }
}
