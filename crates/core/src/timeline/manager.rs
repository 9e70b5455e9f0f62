//! The timeline manager.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use plaza_common::config::TimelineConfig;
use plaza_common::{AppResult, get_metrics};
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Strategies, TimelineError, Timelineable};

/// Upper bound on storage round trips made to fill one page.
const MAX_GRAB_ROUNDS: usize = 5;

struct Entry<P> {
    item: Timelineable,
    prepared: P,
}

/// One account's cache, keyed and therefore ordered by status ID.
struct AccountTimeline<P> {
    entries: BTreeMap<String, Entry<P>>,
}

impl<P> AccountTimeline<P> {
    const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn oldest_id(&self) -> Option<String> {
        self.entries.keys().next().cloned()
    }

    /// Drop every entry matching `pred`, returning how many went.
    fn remove_where(&mut self, pred: impl Fn(&Timelineable) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !pred(&entry.item));
        before - self.entries.len()
    }

    /// Keep only the newest `retain` entries.
    fn prune(&mut self, retain: usize) -> usize {
        let excess = self.entries.len().saturating_sub(retain);
        for _ in 0..excess {
            self.entries.pop_first();
        }
        excess
    }
}

type Timelines<P> = Arc<RwLock<HashMap<String, Arc<Mutex<AccountTimeline<P>>>>>>;

enum Lifecycle {
    Idle,
    Running {
        shutdown: oneshot::Sender<()>,
        pruner: JoinHandle<()>,
    },
    Stopped,
}

/// Cached, paginated per-account timelines of prepared entries `P`.
///
/// Operations on different accounts only share the map lookup; operations on
/// one account are serialized by that account's lock.
pub struct Manager<P> {
    strategies: Strategies<P>,
    config: TimelineConfig,
    timelines: Timelines<P>,
    lifecycle: StdMutex<Lifecycle>,
}

fn lock(mutex: &StdMutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P> Manager<P>
where
    P: Clone + Send + 'static,
{
    /// Create a manager driven by `strategies`.
    #[must_use]
    pub fn new(strategies: Strategies<P>, config: TimelineConfig) -> Self {
        Self {
            strategies,
            config,
            timelines: Arc::new(RwLock::new(HashMap::new())),
            lifecycle: StdMutex::new(Lifecycle::Idle),
        }
    }

    /// Spawn the background task pruning every timeline down to the
    /// configured length.
    pub fn start(&self) -> Result<(), TimelineError> {
        let mut lifecycle = lock(&self.lifecycle);
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } | Lifecycle::Stopped => {
                return Err(TimelineError::AlreadyStarted);
            }
        }

        let (shutdown, mut signal) = oneshot::channel();
        let timelines = Arc::clone(&self.timelines);
        let retain = self.config.retain_length;
        let period = self.config.prune_interval();

        let pruner = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let evicted = prune_all(&timelines, retain).await;
                        if evicted > 0 {
                            debug!(evicted, "Pruned timelines");
                        }
                    }
                    _ = &mut signal => break,
                }
            }
        });

        *lifecycle = Lifecycle::Running { shutdown, pruner };
        info!(retain, period_secs = period.as_secs(), "Timeline manager started");
        Ok(())
    }

    /// Stop the pruning task and wait for it to exit.
    pub async fn stop(&self) -> Result<(), TimelineError> {
        let previous = std::mem::replace(&mut *lock(&self.lifecycle), Lifecycle::Stopped);
        let pruner = match previous {
            Lifecycle::Running { shutdown, pruner } => {
                // the task may already be gone; the join below reports that
                let _ = shutdown.send(());
                pruner
            }
            Lifecycle::Idle => {
                *lock(&self.lifecycle) = Lifecycle::Idle;
                return Err(TimelineError::NotStarted);
            }
            Lifecycle::Stopped => return Err(TimelineError::AlreadyStopped),
        };

        pruner
            .await
            .map_err(|e| TimelineError::Pruner(e.to_string()))?;
        info!("Timeline manager stopped");
        Ok(())
    }

    async fn timeline(&self, account_id: &str) -> Arc<Mutex<AccountTimeline<P>>> {
        if let Some(timeline) = self.timelines.read().await.get(account_id) {
            return Arc::clone(timeline);
        }
        let mut timelines = self.timelines.write().await;
        Arc::clone(
            timelines
                .entry(account_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AccountTimeline::new()))),
        )
    }

    async fn existing_timeline(&self, account_id: &str) -> Option<Arc<Mutex<AccountTimeline<P>>>> {
        self.timelines.read().await.get(account_id).cloned()
    }

    /// The cached timeline, or a detached empty one and `false` when the
    /// account has none. Reads never register a timeline they do not fill.
    async fn timeline_for_read(&self, account_id: &str) -> (Arc<Mutex<AccountTimeline<P>>>, bool) {
        match self.existing_timeline(account_id).await {
            Some(timeline) => (timeline, true),
            None => (Arc::new(Mutex::new(AccountTimeline::new())), false),
        }
    }

    /// Insert `item` into `account_id`'s timeline.
    ///
    /// Returns false when the item was already present, vetoed by skip-insert
    /// or rejected by the filter.
    pub async fn ingest_status(&self, account_id: &str, item: Timelineable) -> AppResult<bool> {
        let timeline = self.timeline(account_id).await;
        let mut timeline = timeline.lock().await;

        if timeline.entries.contains_key(&item.id) {
            return Ok(false);
        }
        let vetoed = timeline
            .entries
            .values()
            .rev()
            .take(self.config.boost_reinsertion_depth)
            .enumerate()
            .any(|(depth, next)| (self.strategies.skip_insert)(&item, &next.item, depth));
        if vetoed {
            debug!(account_id, status_id = %item.id, "Skipped timeline insert");
            return Ok(false);
        }

        if !(self.strategies.filter)(account_id.to_string(), item.clone()).await? {
            return Ok(false);
        }
        let prepared = (self.strategies.prepare)(account_id.to_string(), item.clone()).await?;

        timeline.entries.insert(item.id.clone(), Entry { item, prepared });
        get_metrics().timeline_inserts.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Up to `limit` entries of `account_id`'s timeline, newest first, with
    /// IDs strictly between `min_id` and `max_id`.
    ///
    /// With only `min_id` the entries immediately newer than it are returned.
    /// Cached entries are filtered again and evicted when they no longer
    /// pass; gaps are filled from storage.
    pub async fn get_timeline_page(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<P>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match (max_id, min_id) {
            (None, Some(min_id)) => self.page_above(account_id, min_id, limit).await,
            _ => self.page_below(account_id, max_id, min_id, limit).await,
        }
    }

    async fn page_below(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        min_id: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<P>> {
        let (handle, registered) = self.timeline_for_read(account_id).await;
        let mut timeline = handle.lock().await;

        let oldest = timeline.oldest_id();
        let cached: Vec<(Timelineable, P)> = timeline
            .entries
            .values()
            .rev()
            .filter(|e| max_id.is_none_or(|max| e.item.id.as_str() < max))
            .filter(|e| min_id.is_none_or(|min| e.item.id.as_str() > min))
            .map(|e| (e.item.clone(), e.prepared.clone()))
            .collect();

        let mut page = Vec::with_capacity(limit);
        let mut cursor = max_id.map(str::to_string);
        let mut evicted = Vec::new();
        for (item, prepared) in cached {
            if page.len() >= limit {
                break;
            }
            cursor = Some(item.id.clone());
            if (self.strategies.filter)(account_id.to_string(), item.clone()).await? {
                page.push(prepared);
            } else {
                evicted.push(item.id);
            }
        }
        for id in &evicted {
            timeline.entries.remove(id);
        }
        get_metrics().record_evictions(evicted.len());

        if page.len() >= limit {
            return Ok(page);
        }

        // Only cache what extends the cached run downwards without a gap.
        let contiguous = match (&cursor, &oldest) {
            (Some(cursor), Some(oldest)) => cursor == oldest,
            (None, None) => true,
            _ => false,
        };

        let mut backfilled = 0;
        for _ in 0..MAX_GRAB_ROUNDS {
            let want = limit - page.len();
            let (items, exhausted) = (self.strategies.grab)(
                account_id.to_string(),
                cursor.clone(),
                min_id.map(str::to_string),
                want,
            )
            .await?;
            if items.is_empty() {
                break;
            }

            for item in items {
                cursor = Some(item.id.clone());
                if timeline.entries.contains_key(&item.id)
                    || !(self.strategies.filter)(account_id.to_string(), item.clone()).await?
                {
                    continue;
                }
                let prepared =
                    (self.strategies.prepare)(account_id.to_string(), item.clone()).await?;
                page.push(prepared.clone());
                if contiguous {
                    timeline
                        .entries
                        .insert(item.id.clone(), Entry { item, prepared });
                    backfilled += 1;
                }
                if page.len() >= limit {
                    break;
                }
            }

            if exhausted || page.len() >= limit {
                break;
            }
        }

        if backfilled > 0 {
            if !registered {
                self.timelines
                    .write()
                    .await
                    .entry(account_id.to_string())
                    .or_insert_with(|| Arc::clone(&handle));
            }
            get_metrics()
                .timeline_backfills
                .fetch_add(backfilled, Ordering::Relaxed);
            debug!(account_id, backfilled, "Backfilled timeline from storage");
        }
        Ok(page)
    }

    async fn page_above(&self, account_id: &str, min_id: &str, limit: usize) -> AppResult<Vec<P>> {
        let (handle, _) = self.timeline_for_read(account_id).await;
        let mut timeline = handle.lock().await;

        let covered = timeline
            .oldest_id()
            .is_some_and(|oldest| oldest.as_str() <= min_id);
        let cached: Vec<(Timelineable, P)> = timeline
            .entries
            .range::<str, _>((std::ops::Bound::Excluded(min_id), std::ops::Bound::Unbounded))
            .map(|(_, e)| (e.item.clone(), e.prepared.clone()))
            .collect();

        let mut above = BTreeMap::new();
        let mut evicted = Vec::new();
        for (item, prepared) in cached {
            if above.len() >= limit {
                break;
            }
            if (self.strategies.filter)(account_id.to_string(), item.clone()).await? {
                above.insert(item.id, prepared);
            } else {
                evicted.push(item.id);
            }
        }
        for id in &evicted {
            timeline.entries.remove(id);
        }
        get_metrics().record_evictions(evicted.len());

        if !covered {
            let (items, _) = (self.strategies.grab)(
                account_id.to_string(),
                None,
                Some(min_id.to_string()),
                limit,
            )
            .await?;
            for item in items {
                if above.contains_key(&item.id)
                    || timeline.entries.contains_key(&item.id)
                    || !(self.strategies.filter)(account_id.to_string(), item.clone()).await?
                {
                    continue;
                }
                let prepared =
                    (self.strategies.prepare)(account_id.to_string(), item.clone()).await?;
                above.insert(item.id, prepared);
            }
        }

        let mut page: Vec<P> = above.into_values().take(limit).collect();
        page.reverse();
        Ok(page)
    }

    /// Evict one entry. Returns whether it was cached.
    pub async fn remove_status(&self, account_id: &str, status_id: &str) -> bool {
        let Some(timeline) = self.existing_timeline(account_id).await else {
            return false;
        };
        let removed = timeline.lock().await.entries.remove(status_id).is_some();
        if removed {
            get_metrics().record_evictions(1);
        }
        removed
    }

    /// Evict a status and every boost of it from every timeline.
    pub async fn wipe_status_from_all_timelines(&self, status_id: &str) -> usize {
        self.remove_everywhere(|item| {
            item.id == status_id || item.boost_of_id.as_deref() == Some(status_id)
        })
        .await
    }

    /// Evict everything authored or boosted by `account_id` from
    /// `timeline_account_id`'s timeline.
    pub async fn remove_all_by_account(&self, timeline_account_id: &str, account_id: &str) -> usize {
        let Some(timeline) = self.existing_timeline(timeline_account_id).await else {
            return 0;
        };
        let removed = timeline.lock().await.remove_where(|item| {
            item.account_id == account_id
                || item.boost_of_account_id.as_deref() == Some(account_id)
        });
        get_metrics().record_evictions(removed);
        removed
    }

    /// Evict everything authored or boosted by `account_id` from every timeline.
    pub async fn remove_account_everywhere(&self, account_id: &str) -> usize {
        self.remove_everywhere(|item| {
            item.account_id == account_id
                || item.boost_of_account_id.as_deref() == Some(account_id)
        })
        .await
    }

    async fn remove_everywhere(&self, pred: impl Fn(&Timelineable) -> bool) -> usize {
        let timelines: Vec<_> = self.timelines.read().await.values().cloned().collect();
        let mut removed = 0;
        for timeline in timelines {
            removed += timeline.lock().await.remove_where(&pred);
        }
        get_metrics().record_evictions(removed);
        removed
    }

    /// Number of cached entries for an account.
    pub async fn timeline_len(&self, account_id: &str) -> usize {
        match self.existing_timeline(account_id).await {
            Some(timeline) => timeline.lock().await.entries.len(),
            None => 0,
        }
    }

    /// Prune every timeline now, as the background task does.
    pub async fn prune(&self) -> usize {
        prune_all(&self.timelines, self.config.retain_length).await
    }
}

async fn prune_all<P>(timelines: &Timelines<P>, retain: usize) -> usize {
    let snapshot: Vec<_> = timelines.read().await.values().cloned().collect();
    let mut evicted = 0;
    for timeline in snapshot {
        evicted += timeline.lock().await.prune(retain);
    }
    // Unshared handles can only be reached through the map, which is locked here.
    timelines.write().await.retain(|_, timeline| {
        Arc::strong_count(timeline) > 1
            || !timeline
                .try_lock()
                .is_ok_and(|timeline| timeline.entries.is_empty())
    });
    if evicted > 0 {
        get_metrics().record_evictions(evicted);
    }
    evicted
}

impl<P> Drop for Manager<P> {
    fn drop(&mut self) {
        if let Lifecycle::Running { pruner, .. } = &*lock(&self.lifecycle) {
            warn!("Timeline manager dropped while running");
            pruner.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::collections::BTreeSet;
    use std::sync::Mutex as SyncMutex;

    /// Backing store and deny list shared with the strategies.
    #[derive(Default)]
    struct Store {
        items: SyncMutex<BTreeMap<String, Timelineable>>,
        denied: SyncMutex<BTreeSet<String>>,
        grabs: SyncMutex<usize>,
    }

    impl Store {
        fn add(&self, item: Timelineable) {
            self.items.lock().unwrap().insert(item.id.clone(), item);
        }

        fn deny(&self, id: &str) {
            self.denied.lock().unwrap().insert(id.to_string());
        }
    }

    fn item(id: &str) -> Timelineable {
        Timelineable {
            id: id.to_string(),
            account_id: "author".to_string(),
            boost_of_id: None,
            boost_of_account_id: None,
        }
    }

    fn boost(id: &str, of: &str) -> Timelineable {
        Timelineable {
            id: id.to_string(),
            account_id: "booster".to_string(),
            boost_of_id: Some(of.to_string()),
            boost_of_account_id: Some("author".to_string()),
        }
    }

    fn strategies(store: &Arc<Store>) -> Strategies<String> {
        let grab_store = Arc::clone(store);
        let filter_store = Arc::clone(store);
        Strategies {
            grab: Arc::new(move |_account, max_id, min_id, limit| {
                let store = Arc::clone(&grab_store);
                async move {
                    *store.grabs.lock().unwrap() += 1;
                    let items = store.items.lock().unwrap();
                    let in_range = items
                        .values()
                        .filter(|i| max_id.as_ref().is_none_or(|max| &i.id < max))
                        .filter(|i| min_id.as_ref().is_none_or(|min| &i.id > min));
                    let page: Vec<Timelineable> = if min_id.is_some() && max_id.is_none() {
                        let mut page: Vec<_> = in_range.take(limit).cloned().collect();
                        page.reverse();
                        page
                    } else {
                        in_range.rev().take(limit).cloned().collect()
                    };
                    let exhausted = page.len() < limit;
                    Ok((page, exhausted))
                }
                .boxed()
            }),
            filter: Arc::new(move |_account, item| {
                let store = Arc::clone(&filter_store);
                async move { Ok(!store.denied.lock().unwrap().contains(&item.id)) }.boxed()
            }),
            prepare: Arc::new(|_account, item| async move { Ok(item.id) }.boxed()),
            skip_insert: Arc::new(|new, next, depth| {
                new.id == next.id
                    || (new.boost_of_id.is_some()
                        && (new.boost_of_id == next.boost_of_id
                            || new.boost_of_id.as_deref() == Some(next.id.as_str()))
                        && depth < 50)
            }),
        }
    }

    fn manager(store: &Arc<Store>) -> Manager<String> {
        Manager::new(strategies(store), TimelineConfig::default())
    }

    fn config(retain: usize) -> TimelineConfig {
        TimelineConfig {
            retain_length: retain,
            prune_interval_secs: 1,
            ..TimelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_same_status_twice() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);

        assert!(manager.ingest_status("z", item("01b")).await.unwrap());
        assert!(!manager.ingest_status("z", item("01b")).await.unwrap());
        assert_eq!(manager.timeline_len("z").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_ingests_insert_once() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);

        let inserted = futures::future::join_all(
            (0..16).map(|_| manager.ingest_status("z", item("01b"))),
        )
        .await;
        let inserted = inserted.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(inserted, 1);
        assert_eq!(manager.timeline_len("z").await, 1);
    }

    #[tokio::test]
    async fn test_reads_of_unknown_accounts_cache_nothing() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);

        for n in 0..10 {
            let account = format!("reader{n}");
            let below = manager.get_timeline_page(&account, None, None, 5).await;
            assert!(below.unwrap().is_empty());
            let above = manager.get_timeline_page(&account, None, Some("01a"), 5).await;
            assert!(above.unwrap().is_empty());
        }
        assert!(manager.timelines.read().await.is_empty());

        store.add(item("01a"));
        manager.get_timeline_page("filled", None, None, 5).await.unwrap();
        assert_eq!(manager.timeline_len("filled").await, 1);
        assert_eq!(manager.timelines.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_drops_emptied_timelines() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("z", item("01a")).await.unwrap();
        manager.ingest_status("y", item("01b")).await.unwrap();

        assert!(manager.remove_status("z", "01a").await);
        manager.prune().await;

        let timelines = manager.timelines.read().await;
        assert!(!timelines.contains_key("z"));
        assert!(timelines.contains_key("y"));
    }

    #[tokio::test]
    async fn test_page_is_strictly_descending() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);

        for id in ["01c", "01a", "01e", "01b", "01d"] {
            manager.ingest_status("z", item(id)).await.unwrap();
        }
        let page = manager.get_timeline_page("z", None, None, 10).await.unwrap();
        assert_eq!(page, vec!["01e", "01d", "01c", "01b", "01a"]);
        assert!(page.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    async fn test_cursors_are_exclusive() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        for id in ["01a", "01b", "01c", "01d", "01e"] {
            manager.ingest_status("z", item(id)).await.unwrap();
        }

        let page = manager
            .get_timeline_page("z", Some("01d"), Some("01a"), 10)
            .await
            .unwrap();
        assert_eq!(page, vec!["01c", "01b"]);

        let page = manager
            .get_timeline_page("z", Some("01e"), None, 2)
            .await
            .unwrap();
        assert_eq!(page, vec!["01d", "01c"]);
    }

    #[tokio::test]
    async fn test_min_id_only_returns_nearest_newer() {
        let store = Arc::new(Store::default());
        for id in ["01a", "01b", "01c", "01d", "01e"] {
            store.add(item(id));
        }
        let manager = manager(&store);
        manager.ingest_status("z", item("01e")).await.unwrap();

        let page = manager
            .get_timeline_page("z", None, Some("01a"), 2)
            .await
            .unwrap();
        assert_eq!(page, vec!["01c", "01b"]);
    }

    #[tokio::test]
    async fn test_removed_status_is_not_served() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("z", item("01a")).await.unwrap();
        manager.ingest_status("z", item("01b")).await.unwrap();

        assert!(manager.remove_status("z", "01b").await);
        assert!(!manager.remove_status("z", "01b").await);
        assert!(!manager.remove_status("nobody", "01b").await);

        let page = manager.get_timeline_page("z", None, None, 10).await.unwrap();
        assert_eq!(page, vec!["01a"]);
    }

    #[tokio::test]
    async fn test_filter_rejects_on_ingest() {
        let store = Arc::new(Store::default());
        store.deny("01a");
        let manager = manager(&store);
        assert!(!manager.ingest_status("z", item("01a")).await.unwrap());
        assert_eq!(manager.timeline_len("z").await, 0);
    }

    #[tokio::test]
    async fn test_stale_entries_are_evicted_at_read() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("z", item("01a")).await.unwrap();
        manager.ingest_status("z", item("01b")).await.unwrap();

        store.deny("01b");
        let page = manager.get_timeline_page("z", None, None, 10).await.unwrap();
        assert_eq!(page, vec!["01a"]);
        assert_eq!(manager.timeline_len("z").await, 1);
    }

    #[tokio::test]
    async fn test_miss_backfills_from_storage() {
        let store = Arc::new(Store::default());
        for id in ["01a", "01b", "01c", "01d"] {
            store.add(item(id));
        }
        store.deny("01b");
        let manager = manager(&store);
        manager.ingest_status("z", item("01d")).await.unwrap();

        let page = manager.get_timeline_page("z", None, None, 10).await.unwrap();
        assert_eq!(page, vec!["01d", "01c", "01a"]);
        assert_eq!(manager.timeline_len("z").await, 3);

        // Served from cache the second time.
        let grabs = *store.grabs.lock().unwrap();
        let page = manager.get_timeline_page("z", None, None, 2).await.unwrap();
        assert_eq!(page, vec!["01d", "01c"]);
        assert_eq!(*store.grabs.lock().unwrap(), grabs);
    }

    #[tokio::test]
    async fn test_gap_is_not_cached() {
        let store = Arc::new(Store::default());
        for id in ["01a", "01b", "01c", "01d", "01e", "01f"] {
            store.add(item(id));
        }
        let manager = manager(&store);
        manager.ingest_status("z", item("01f")).await.unwrap();

        let page = manager
            .get_timeline_page("z", Some("01c"), None, 10)
            .await
            .unwrap();
        assert_eq!(page, vec!["01b", "01a"]);
        assert_eq!(manager.timeline_len("z").await, 1);
    }

    #[tokio::test]
    async fn test_boost_of_recent_status_is_skipped() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("z", item("01a")).await.unwrap();

        assert!(!manager.ingest_status("z", boost("01b", "01a")).await.unwrap());
        assert!(manager.ingest_status("z", boost("01c", "01x")).await.unwrap());
        assert!(!manager.ingest_status("z", boost("01d", "01x")).await.unwrap());
        assert_eq!(manager.timeline_len("z").await, 2);
    }

    #[tokio::test]
    async fn test_boost_beyond_depth_is_reinserted() {
        let store = Arc::new(Store::default());
        let config = TimelineConfig {
            boost_reinsertion_depth: 2,
            ..TimelineConfig::default()
        };
        let manager = Manager::new(strategies(&store), config);
        for id in ["01a", "01b", "01c"] {
            manager.ingest_status("z", item(id)).await.unwrap();
        }
        assert!(manager.ingest_status("z", boost("01d", "01a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_wipe_removes_boosts_everywhere() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("y", item("01a")).await.unwrap();
        manager.ingest_status("z", boost("01b", "01a")).await.unwrap();
        manager.ingest_status("z", item("01c")).await.unwrap();

        assert_eq!(manager.wipe_status_from_all_timelines("01a").await, 2);
        assert_eq!(manager.timeline_len("y").await, 0);
        assert_eq!(manager.timeline_len("z").await, 1);
    }

    #[tokio::test]
    async fn test_remove_all_by_account() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);
        manager.ingest_status("z", item("01a")).await.unwrap();
        manager.ingest_status("z", boost("01b", "01x")).await.unwrap();
        let mut other = item("01c");
        other.account_id = "other".to_string();
        manager.ingest_status("z", other).await.unwrap();

        assert_eq!(manager.remove_all_by_account("z", "author").await, 2);
        let page = manager.get_timeline_page("z", None, None, 10).await.unwrap();
        assert_eq!(page, vec!["01c"]);
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let store = Arc::new(Store::default());
        let manager = Manager::new(strategies(&store), config(2));
        for id in ["01a", "01b", "01c", "01d"] {
            manager.ingest_status("z", item(id)).await.unwrap();
        }
        assert_eq!(manager.prune().await, 2);

        let timeline = manager.existing_timeline("z").await.unwrap();
        let ids: Vec<String> = timeline.lock().await.entries.keys().cloned().collect();
        assert_eq!(ids, vec!["01c", "01d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_pruning() {
        let store = Arc::new(Store::default());
        let manager = Manager::new(strategies(&store), config(1));
        manager.start().unwrap();
        for id in ["01a", "01b", "01c"] {
            manager.ingest_status("z", item(id)).await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert_eq!(manager.timeline_len("z").await, 1);
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        let store = Arc::new(Store::default());
        let manager = manager(&store);

        assert_eq!(manager.stop().await, Err(TimelineError::NotStarted));
        manager.start().unwrap();
        assert_eq!(manager.start(), Err(TimelineError::AlreadyStarted));
        manager.stop().await.unwrap();
        assert_eq!(manager.stop().await, Err(TimelineError::AlreadyStopped));
        assert_eq!(manager.start(), Err(TimelineError::AlreadyStarted));
    }
}
