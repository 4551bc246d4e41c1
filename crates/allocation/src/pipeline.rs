//! The pure allocation pipeline: priors, revenue, bounds, winners and
//! distributions over one fetched view of the world.

use crate::bounds::{compute_bounds, BoundParams};
use crate::distribution::build_distribution;
use crate::prior::fill_priors;
use crate::revenue::estimate_revenue;
use crate::snapshot::Allocation;
use crate::stats::StatsStore;
use crate::winners::select_winners;
use adserve_core::config::AllocationConfig;
use adserve_core::types::{AdCollaboration, Catalog};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationPipeline {
    min_impressions: u64,
    bounds: BoundParams,
}

impl AllocationPipeline {
    pub fn new(config: &AllocationConfig) -> Self {
        Self {
            min_impressions: config.prior_min_impressions,
            bounds: BoundParams::from(config),
        }
    }

    pub fn with_params(min_impressions: u64, bounds: BoundParams) -> Self {
        Self {
            min_impressions,
            bounds,
        }
    }

    pub fn compute(&self, catalog: &Catalog, store: StatsStore) -> Allocation {
        let ad_stats = fill_priors(&store, catalog, self.min_impressions);
        let revenue = estimate_revenue(catalog, &ad_stats);
        let bounds = compute_bounds(&ad_stats, &self.bounds);

        let mut weights = BTreeMap::new();
        let mut distributions = BTreeMap::new();

        for &publisher_id in &catalog.publisher_ids {
            let winners = select_winners(publisher_id, catalog, &bounds);
            let Some(distribution) = build_distribution(publisher_id, &winners, &revenue) else {
                debug!(publisher_id = publisher_id, "Publisher has no eligible ads");
                continue;
            };

            debug!(
                publisher_id = publisher_id,
                candidates = catalog.ads.len(),
                winners = winners.len(),
                "Built serving distribution"
            );

            for entry in &distribution.entries {
                weights.insert(AdCollaboration::new(entry.ad_id, publisher_id), entry.weight);
            }
            distributions.insert(publisher_id, distribution);
        }

        Allocation {
            ad_stats,
            advertiser_stats: store.advertiser_stats,
            revenue,
            bounds,
            weights,
            distributions,
        }
    }
}

impl Default for AllocationPipeline {
    fn default() -> Self {
        Self::new(&AllocationConfig::default())
    }
}
