//! Per-publisher winner sets: ads that are not statistically dominated.

use adserve_core::types::{AdCollaboration, AdId, Catalog, ConfidenceInterval, PublisherId};
use std::collections::{BTreeMap, HashSet};

/// Ads eligible for serving on `publisher_id`, in catalog order.
///
/// An ad is dropped only when even its optimistic CTR cannot reach the best
/// pessimistic CTR on the publisher. Wide bands (new ads) therefore keep
/// more candidates in play. An empty result means the publisher has no ads.
pub fn select_winners(
    publisher_id: PublisherId,
    catalog: &Catalog,
    bounds: &BTreeMap<AdCollaboration, ConfidenceInterval>,
) -> Vec<AdId> {
    let mut seen = HashSet::new();
    let candidates: Vec<(AdId, ConfidenceInterval)> = catalog
        .ads
        .iter()
        .filter(|ad| seen.insert(ad.id))
        .filter_map(|ad| {
            bounds
                .get(&AdCollaboration::new(ad.id, publisher_id))
                .map(|ci| (ad.id, *ci))
        })
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let max_lower = candidates
        .iter()
        .map(|(_, ci)| ci.lower_bound)
        .fold(0.0_f64, f64::max);

    candidates
        .into_iter()
        .filter(|(_, ci)| ci.upper_bound >= max_lower)
        .map(|(ad_id, _)| ad_id)
        .collect()
}
