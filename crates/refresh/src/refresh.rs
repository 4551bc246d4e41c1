//! Refresh loop: periodically fetches statistics and the catalog, runs the
//! allocation pipeline and publishes a new snapshot.

use crate::state::{CycleTracker, RefreshState};
use adserve_allocation::{AllocationPipeline, Snapshot, SnapshotHandle, StatsStore};
use adserve_core::config::AllocationConfig;
use adserve_core::error::{AdServeError, AdServeResult};
use adserve_core::types::{AdStatsRecord, AdvertiserStatsRecord, Catalog};
use adserve_sources::{CatalogSource, StatisticsSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { generation: u64, publishers: usize },
    /// Another cycle held the slot; nothing was fetched.
    Skipped,
}

type Fetched = (Vec<AdStatsRecord>, Vec<AdvertiserStatsRecord>, Catalog);

/// Resolves once shutdown is signalled. A dropped sender never resolves, so
/// an orphaned receiver cannot cancel work on its own.
async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct RefreshLoop {
    statistics: Arc<dyn StatisticsSource>,
    catalog: Arc<dyn CatalogSource>,
    pipeline: AllocationPipeline,
    snapshots: Arc<SnapshotHandle>,
    interval: Duration,
    fetch_timeout: Duration,
    tracker: CycleTracker,
}

impl RefreshLoop {
    pub fn new(
        config: &AllocationConfig,
        statistics: Arc<dyn StatisticsSource>,
        catalog: Arc<dyn CatalogSource>,
        snapshots: Arc<SnapshotHandle>,
    ) -> Self {
        Self {
            statistics,
            catalog,
            pipeline: AllocationPipeline::new(config),
            snapshots,
            interval: config.refresh_interval(),
            fetch_timeout: config.fetch_timeout(),
            tracker: CycleTracker::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> RefreshState {
        self.tracker.state()
    }

    pub fn snapshots(&self) -> &Arc<SnapshotHandle> {
        &self.snapshots
    }

    /// Run one full cycle unless one is already in flight. On any failure the
    /// active snapshot is left untouched.
    pub async fn run_once(&self, shutdown: watch::Receiver<bool>) -> AdServeResult<CycleOutcome> {
        let Some(cycle) = self.tracker.try_begin() else {
            return Ok(CycleOutcome::Skipped);
        };
        let start = Instant::now();

        cycle.enter(RefreshState::Fetching);
        let (ad_records, advertiser_records, catalog) =
            self.fetch_with_shutdown(shutdown.clone()).await?;

        cycle.enter(RefreshState::Computing);
        let pipeline = self.pipeline;
        let (catalog, allocation) = tokio::task::spawn_blocking(move || {
            let store = StatsStore::from_records(ad_records, advertiser_records);
            let allocation = pipeline.compute(&catalog, store);
            (catalog, allocation)
        })
        .await
        .map_err(|e| AdServeError::Internal(anyhow::anyhow!("pipeline task failed: {e}")))?;

        if *shutdown.borrow() {
            return Err(AdServeError::Cancelled);
        }

        cycle.enter(RefreshState::Publishing);
        let generation = self.snapshots.generation() + 1;
        let publishers = allocation.distributions.len();
        let ads = catalog.ads.len();
        self.snapshots
            .publish(Snapshot::new(generation, catalog, allocation));

        let elapsed_ms = start.elapsed().as_millis() as u64;
        metrics::counter!("refresh.cycles").increment(1);
        metrics::histogram!("refresh.duration_ms").record(elapsed_ms as f64);
        metrics::gauge!("snapshot.generation").set(generation as f64);
        metrics::gauge!("snapshot.publishers").set(publishers as f64);

        info!(
            generation = generation,
            ads = ads,
            publishers = publishers,
            elapsed_ms = elapsed_ms,
            "Published allocation snapshot"
        );

        Ok(CycleOutcome::Published {
            generation,
            publishers,
        })
    }

    async fn fetch_with_shutdown(&self, shutdown: watch::Receiver<bool>) -> AdServeResult<Fetched> {
        if *shutdown.borrow() {
            return Err(AdServeError::Cancelled);
        }
        tokio::select! {
            fetched = self.fetch() => fetched,
            _ = stop_requested(shutdown) => Err(AdServeError::Cancelled),
        }
    }

    async fn fetch(&self) -> AdServeResult<Fetched> {
        let fetch_all = async {
            tokio::try_join!(
                self.statistics.fetch_ad_stats(),
                self.statistics.fetch_advertiser_stats(),
                self.catalog.fetch_catalog(),
            )
        };

        match tokio::time::timeout(self.fetch_timeout, fetch_all).await {
            Ok(fetched) => fetched,
            Err(_) => Err(AdServeError::fetch(
                "refresh",
                format!("collaborator fetch timed out after {:?}", self.fetch_timeout),
            )),
        }
    }

    /// Spawn the loop as a background task. It stops once `shutdown` flips
    /// to `true`, after the in-flight cycle (if any) has finished or
    /// abandoned its work.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            fetch_timeout_ms = self.fetch_timeout.as_millis() as u64,
            "Refresh loop started"
        );

        // first tick completes immediately
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.tracker.is_running() {
                        warn!(state = %self.state(), "Refresh cycle still running, skipping tick");
                        metrics::counter!("refresh.skipped_ticks").increment(1);
                        continue;
                    }
                    let this = self.clone();
                    let cycle_shutdown = shutdown.clone();
                    current = Some(tokio::spawn(async move {
                        this.run_logged(cycle_shutdown).await;
                    }));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Refresh loop stopping");
        if let Some(handle) = current {
            if let Err(e) = handle.await {
                error!(error = %e, "Refresh cycle task panicked");
            }
        }
        info!(generation = self.snapshots.generation(), "Refresh loop stopped");
    }

    async fn run_logged(&self, shutdown: watch::Receiver<bool>) {
        match self.run_once(shutdown).await {
            Ok(CycleOutcome::Published { .. }) => {}
            Ok(CycleOutcome::Skipped) => {
                debug!("Refresh cycle skipped, another cycle in flight");
                metrics::counter!("refresh.skipped_ticks").increment(1);
            }
            Err(AdServeError::Cancelled) => {
                info!("Refresh cycle abandoned for shutdown");
            }
            Err(e) => {
                metrics::counter!("refresh.failures").increment(1);
                warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    generation = self.snapshots.generation(),
                    "Refresh cycle failed, keeping previous snapshot"
                );
            }
        }
    }
}
