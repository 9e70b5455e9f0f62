//! Per-account timeline caches.
//!
//! A [`Manager`] keeps one ordered cache of prepared entries per account and
//! is driven by four strategies supplied by its owner:
//!
//! - **grab**: fetch candidate items from storage within cursor bounds
//! - **filter**: decide whether an item belongs in an account's timeline
//! - **prepare**: turn an item into the cached projection `P`
//! - **skip-insert**: veto an insertion given a newer cached neighbour,
//!   e.g. a boost of something already near the top

mod manager;

use std::sync::Arc;

use futures::future::BoxFuture;
use plaza_common::{AppError, AppResult};
use plaza_db::entities::status;
use thiserror::Error;

pub use manager::Manager;

/// The minimal fields of a status a timeline needs to order and dedupe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timelineable {
    pub id: String,
    pub account_id: String,
    pub boost_of_id: Option<String>,
    pub boost_of_account_id: Option<String>,
}

impl From<&status::Model> for Timelineable {
    fn from(status: &status::Model) -> Self {
        Self {
            id: status.id.clone(),
            account_id: status.account_id.clone(),
            boost_of_id: status.boost_of_id.clone(),
            boost_of_account_id: status.boost_of_account_id.clone(),
        }
    }
}

/// `(timeline_account_id, max_id, min_id, limit)` to items newest first, plus
/// whether storage has nothing further in that direction.
pub type GrabFn = Arc<
    dyn Fn(
            String,
            Option<String>,
            Option<String>,
            usize,
        ) -> BoxFuture<'static, AppResult<(Vec<Timelineable>, bool)>>
        + Send
        + Sync,
>;

/// Whether an item may appear in the given account's timeline.
pub type FilterFn =
    Arc<dyn Fn(String, Timelineable) -> BoxFuture<'static, AppResult<bool>> + Send + Sync>;

/// The cached projection of an item for the given account.
pub type PrepareFn<P> =
    Arc<dyn Fn(String, Timelineable) -> BoxFuture<'static, AppResult<P>> + Send + Sync>;

/// `(new, next, depth)`: whether `new` should not be inserted because of the
/// cached entry `next`, found `depth` entries from the top.
pub type SkipInsertFn = Arc<dyn Fn(&Timelineable, &Timelineable, usize) -> bool + Send + Sync>;

/// The strategies a [`Manager`] is built with.
pub struct Strategies<P> {
    pub grab: GrabFn,
    pub filter: FilterFn,
    pub prepare: PrepareFn<P>,
    pub skip_insert: SkipInsertFn,
}

impl<P> Clone for Strategies<P> {
    fn clone(&self) -> Self {
        Self {
            grab: Arc::clone(&self.grab),
            filter: Arc::clone(&self.filter),
            prepare: Arc::clone(&self.prepare),
            skip_insert: Arc::clone(&self.skip_insert),
        }
    }
}

/// Misuse of the manager lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("timeline manager already started")]
    AlreadyStarted,

    #[error("timeline manager not started")]
    NotStarted,

    #[error("timeline manager already stopped")]
    AlreadyStopped,

    #[error("timeline pruner failed: {0}")]
    Pruner(String),
}

impl From<TimelineError> for AppError {
    fn from(err: TimelineError) -> Self {
        Self::Internal(err.to_string())
    }
}
