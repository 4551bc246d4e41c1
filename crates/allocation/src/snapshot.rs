//! Immutable refresh results and the atomically swapped active reference.

use crate::distribution::Distribution;
use adserve_core::error::{AdServeError, AdServeResult};
use adserve_core::types::{
    Ad, AdCollaboration, AdId, AdvertiserCollaboration, Catalog, ConfidenceInterval, PublisherId,
    Statistics,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything one pipeline run derives from a catalog and a stats fetch.
/// A pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Allocation {
    /// CTR estimates after priors, for every reachable pair.
    pub ad_stats: BTreeMap<AdCollaboration, Statistics>,
    pub advertiser_stats: BTreeMap<AdvertiserCollaboration, Statistics>,
    pub revenue: BTreeMap<AdCollaboration, f64>,
    pub bounds: BTreeMap<AdCollaboration, ConfidenceInterval>,
    /// Present for winners only.
    pub weights: BTreeMap<AdCollaboration, f64>,
    pub distributions: BTreeMap<PublisherId, Distribution>,
}

/// One published refresh result. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub catalog: Catalog,
    pub allocation: Allocation,
    /// Position of each ad in `catalog.ads`; the first occurrence wins.
    ad_index: BTreeMap<AdId, usize>,
}

impl Snapshot {
    pub fn new(generation: u64, catalog: Catalog, allocation: Allocation) -> Self {
        let mut ad_index = BTreeMap::new();
        for (position, ad) in catalog.ads.iter().enumerate() {
            ad_index.entry(ad.id).or_insert(position);
        }
        Self {
            generation,
            published_at: Utc::now(),
            catalog,
            allocation,
            ad_index,
        }
    }

    pub fn distribution(&self, publisher_id: PublisherId) -> AdServeResult<&Distribution> {
        self.allocation
            .distributions
            .get(&publisher_id)
            .ok_or(AdServeError::EmptyWinnerSet(publisher_id))
    }

    pub fn ad(&self, ad_id: AdId) -> Option<&Ad> {
        self.ad_index
            .get(&ad_id)
            .and_then(|&position| self.catalog.ads.get(position))
    }

    pub fn publisher_count(&self) -> usize {
        self.allocation.distributions.len()
    }
}

/// Holder of the active snapshot. Readers clone the `Arc` under a short read
/// lock and then work without holding anything; the refresh loop replaces
/// the whole reference under a short write lock.
#[derive(Debug, Default)]
pub struct SnapshotHandle {
    active: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.active.read().clone()
    }

    /// Replace the active snapshot, returning the one it superseded.
    pub fn publish(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let next = Arc::new(snapshot);
        let mut active = self.active.write();
        active.replace(next)
    }

    pub fn generation(&self) -> u64 {
        self.active
            .read()
            .as_ref()
            .map(|snapshot| snapshot.generation)
            .unwrap_or(0)
    }

    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }
}
