//! Cold-start priors: statistically thin (ad, publisher) entries borrow the
//! advertiser's aggregate CTR on that publisher.

use crate::stats::StatsStore;
use adserve_core::types::{AdCollaboration, AdvertiserCollaboration, Catalog, Statistics};
use std::collections::BTreeMap;
use tracing::debug;

/// Produce a CTR estimate for every pair in catalog x publishers.
///
/// An entry is thin when it has no impressions or fewer than
/// `min_impressions`. Thin entries become `{0, 0, advertiser_ctr}`. A thin
/// entry that does have impressions keeps its own numbers when the
/// advertiser has no aggregate to offer; an entry with no impressions and no
/// aggregate ends up at CTR 0.
pub fn fill_priors(
    store: &StatsStore,
    catalog: &Catalog,
    min_impressions: u64,
) -> BTreeMap<AdCollaboration, Statistics> {
    let mut estimates = BTreeMap::new();
    let mut filled = 0usize;

    for &publisher_id in &catalog.publisher_ids {
        for ad in &catalog.ads {
            let key = AdCollaboration::new(ad.id, publisher_id);
            let observed = store.ad(&key).copied();
            let prior = store.advertiser_ctr(&AdvertiserCollaboration::new(
                ad.advertiser_id,
                publisher_id,
            ));

            let estimate = match observed {
                Some(stats) if stats.impressions >= min_impressions.max(1) => stats,
                Some(stats) if stats.impressions > 0 && prior.is_none() => stats,
                _ => {
                    filled += 1;
                    Statistics::prior(prior.unwrap_or(0.0))
                }
            };
            estimates.insert(key, estimate);
        }
    }

    debug!(
        pairs = estimates.len(),
        filled = filled,
        "Applied advertiser priors to thin entries"
    );

    estimates
}
