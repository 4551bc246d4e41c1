//! Expected revenue of showing an ad on a publisher.

use adserve_core::types::{AdCollaboration, Catalog, Statistics};
use std::collections::BTreeMap;

/// `bid * ctr` for every pair that has an estimate.
pub fn estimate_revenue(
    catalog: &Catalog,
    estimates: &BTreeMap<AdCollaboration, Statistics>,
) -> BTreeMap<AdCollaboration, f64> {
    let mut revenue = BTreeMap::new();
    for &publisher_id in &catalog.publisher_ids {
        for ad in &catalog.ads {
            let key = AdCollaboration::new(ad.id, publisher_id);
            if let Some(stats) = estimates.get(&key) {
                revenue.insert(key, ad.effective_bid() * stats.ctr);
            }
        }
    }
    revenue
}

#[cfg(test)]
mod tests {
    use super::*;
    use adserve_core::types::Ad;

    fn ad(id: u64, bid_value: f64) -> Ad {
        Ad {
            id,
            title: String::new(),
            redirect_link: String::new(),
            image_path: String::new(),
            bid_value,
            advertiser_id: 1,
        }
    }

    #[test]
    fn test_revenue_is_bid_times_ctr() {
        let catalog = Catalog::new(vec![ad(1, 10.0), ad(2, 20.0)], vec![5]);
        let estimates = BTreeMap::from([
            (AdCollaboration::new(1, 5), Statistics::from_counts(100, 10)),
            (AdCollaboration::new(2, 5), Statistics::prior(0.05)),
        ]);

        let revenue = estimate_revenue(&catalog, &estimates);
        assert!((revenue[&AdCollaboration::new(1, 5)] - 1.0).abs() < 1e-9);
        assert!((revenue[&AdCollaboration::new(2, 5)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_bid_clamped() {
        let catalog = Catalog::new(vec![ad(1, -3.0)], vec![5]);
        let estimates = BTreeMap::from([(AdCollaboration::new(1, 5), Statistics::prior(0.5))]);
        assert_eq!(estimate_revenue(&catalog, &estimates)[&AdCollaboration::new(1, 5)], 0.0);
    }
}
