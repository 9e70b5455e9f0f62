//! The processor: every client API and federation operation, plus the
//! asynchronous side effects run by the two worker pools.
//!
//! Sub-processors are reached through accessors:
//!
//! - [`Processor::account`], [`Processor::status`], [`Processor::media`],
//!   [`Processor::user`], [`Processor::report`], [`Processor::admin`]
//! - [`Processor::timeline`] and [`Processor::streaming`]
//! - [`Processor::federation`] for the `ActivityPub` endpoints

mod account;
mod admin;
mod effects;
mod federation;
mod from_client_api;
mod from_federator;
mod media;
mod report;
mod status;
mod streaming;
mod timeline;
mod user;

use std::sync::Arc;

use futures::FutureExt;
use plaza_common::{AppError, AppResult, Config, IdGenerator, StorageBackend};
use plaza_db::Database;
use plaza_federation::{Federator, UrlConfig};
use plaza_queue::{FromClientApi, FromFederator, WorkerPool};
use tracing::{error, info, warn};

pub use account::AccountProcessor;
pub use admin::AdminProcessor;
pub use federation::{FederationProcessor, OUTBOX_PAGE_SIZE};
pub use media::MediaProcessor;
pub use report::ReportProcessor;
pub use status::StatusProcessor;
pub use streaming::{StreamEvent, StreamingProcessor};
pub use timeline::{TimelineProcessor, home_timeline_strategies};
pub use user::UserProcessor;

use effects::SideEffects;

use crate::api;
use crate::mention::MentionResolver;
use crate::timeline::Manager;
use crate::typeutils::{Converter, TypeConverter};
use crate::visibility::Filter;

/// Queue follow-up work for a change already written to storage. The change
/// stands even when the pool refuses the message; callers check
/// [`WorkerPool::ensure_accepting`] before writing.
async fn enqueue_stored(pool: &WorkerPool<FromClientApi>, msg: FromClientApi) {
    let activity = msg.activity;
    if let Err(e) = pool.enqueue(msg).await {
        warn!(pool = pool.name(), ?activity, error = %e, "Dropped follow-up work for a stored change");
    }
}

/// Root of the processing core.
pub struct Processor {
    client_pool: Arc<WorkerPool<FromClientApi>>,
    fed_pool: Arc<WorkerPool<FromFederator>>,
    timelines: Arc<Manager<api::Status>>,
    filter: Filter,
    effects: Arc<SideEffects>,

    account: AccountProcessor,
    admin: AdminProcessor,
    federation: FederationProcessor,
    media: MediaProcessor,
    report: ReportProcessor,
    status: StatusProcessor,
    streaming: StreamingProcessor,
    timeline: TimelineProcessor,
    user: UserProcessor,
}

impl Processor {
    /// Wire every sub-processor around one shared filter, converter and
    /// timeline manager. Nothing runs until [`Self::start`].
    #[must_use]
    pub fn new(
        config: &Config,
        db: Arc<dyn Database>,
        federator: Arc<dyn Federator>,
        storage: Arc<dyn StorageBackend>,
        client_pool: Arc<WorkerPool<FromClientApi>>,
        fed_pool: Arc<WorkerPool<FromFederator>>,
    ) -> Self {
        let urls = UrlConfig::new(&config.server.url);
        let ids = Arc::new(IdGenerator::new());
        let filter = Filter::new(Arc::clone(&db));
        let converter: Arc<dyn TypeConverter> =
            Arc::new(Converter::new(Arc::clone(&db), urls.clone()));

        let timelines = Arc::new(Manager::new(
            home_timeline_strategies(
                Arc::clone(&db),
                filter.clone(),
                Arc::clone(&converter),
                &config.timeline,
            ),
            config.timeline.clone(),
        ));
        let streaming = StreamingProcessor::new();

        let effects = Arc::new(SideEffects {
            db: Arc::clone(&db),
            federator: Arc::clone(&federator),
            converter: Arc::clone(&converter),
            filter: filter.clone(),
            timelines: Arc::clone(&timelines),
            streams: streaming.clone(),
            ids: Arc::clone(&ids),
            urls: urls.clone(),
        });

        let mentions = MentionResolver::new(Arc::clone(&db), Arc::clone(&federator), urls.clone());

        Self {
            account: AccountProcessor::new(
                Arc::clone(&db),
                filter.clone(),
                Arc::clone(&converter),
                Arc::clone(&client_pool),
                Arc::clone(&ids),
                urls.clone(),
                config.accounts.clone(),
            ),
            admin: AdminProcessor::new(
                Arc::clone(&db),
                Arc::clone(&converter),
                Arc::clone(&timelines),
                Arc::clone(&client_pool),
                Arc::clone(&ids),
            ),
            federation: FederationProcessor::new(
                Arc::clone(&db),
                federator,
                Arc::clone(&converter),
            ),
            media: MediaProcessor::new(
                Arc::clone(&db),
                storage,
                Arc::clone(&converter),
                Arc::clone(&ids),
                config.media.clone(),
            ),
            report: ReportProcessor::new(
                Arc::clone(&db),
                Arc::clone(&converter),
                Arc::clone(&client_pool),
                Arc::clone(&ids),
                urls.clone(),
            ),
            status: StatusProcessor::new(
                Arc::clone(&db),
                filter.clone(),
                converter,
                mentions,
                Arc::clone(&client_pool),
                ids,
                urls,
                config.accounts.clone(),
            ),
            timeline: TimelineProcessor::new(Arc::clone(&timelines), config.timeline.default_limit),
            user: UserProcessor::new(db, config.accounts.min_password_length),
            streaming,
            client_pool,
            fed_pool,
            timelines,
            filter,
            effects,
        }
    }

    /// Register the processing functions and start the client pool, the
    /// federator pool and the timeline manager, in that order.
    pub fn start(&self) -> AppResult<()> {
        let effects = Arc::clone(&self.effects);
        self.client_pool.set_processor(move |msg| {
            let effects = Arc::clone(&effects);
            async move { effects.process_from_client_api(msg).await }.boxed()
        })?;
        let effects = Arc::clone(&self.effects);
        self.fed_pool.set_processor(move |msg| {
            let effects = Arc::clone(&effects);
            async move { effects.process_from_federator(msg).await }.boxed()
        })?;

        self.client_pool.start()?;
        self.fed_pool.start()?;
        self.timelines.start()?;
        info!("Processor started");
        Ok(())
    }

    /// Drain both pools and stop the timeline manager. Every component is
    /// stopped even when an earlier one fails; the first error is returned.
    pub async fn stop(&self) -> AppResult<()> {
        let results: [AppResult<()>; 3] = [
            self.client_pool.stop().await.map_err(AppError::from),
            self.fed_pool.stop().await.map_err(AppError::from),
            self.timelines.stop().await.map_err(AppError::from),
        ];
        let mut first = None;
        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Failed to stop processor component");
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => {
                info!("Processor stopped");
                Ok(())
            }
        }
    }

    /// Run the side effects of a client API message right away.
    pub async fn process_from_client_api(&self, msg: FromClientApi) -> AppResult<()> {
        self.effects.process_from_client_api(msg).await
    }

    /// Run the side effects of a federated message right away.
    pub async fn process_from_federator(&self, msg: FromFederator) -> AppResult<()> {
        self.effects.process_from_federator(msg).await
    }

    #[must_use]
    pub const fn account(&self) -> &AccountProcessor {
        &self.account
    }

    #[must_use]
    pub const fn admin(&self) -> &AdminProcessor {
        &self.admin
    }

    #[must_use]
    pub const fn federation(&self) -> &FederationProcessor {
        &self.federation
    }

    #[must_use]
    pub const fn media(&self) -> &MediaProcessor {
        &self.media
    }

    #[must_use]
    pub const fn report(&self) -> &ReportProcessor {
        &self.report
    }

    #[must_use]
    pub const fn status(&self) -> &StatusProcessor {
        &self.status
    }

    #[must_use]
    pub const fn streaming(&self) -> &StreamingProcessor {
        &self.streaming
    }

    #[must_use]
    pub const fn timeline(&self) -> &TimelineProcessor {
        &self.timeline
    }

    #[must_use]
    pub const fn user(&self) -> &UserProcessor {
        &self.user
    }

    /// The visibility filter shared by every sub-processor.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The home timeline cache.
    #[must_use]
    pub fn timelines(&self) -> &Manager<api::Status> {
        &self.timelines
    }
}
