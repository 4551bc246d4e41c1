//! Statistics ingestion: turns Reporter records into repaired per-key
//! statistics and holds the latest fetched view for one refresh cycle.

use adserve_core::error::{AdServeError, AdServeResult};
use adserve_core::types::{
    AdCollaboration, AdStatsRecord, AdvertiserCollaboration, AdvertiserStatsRecord, Statistics,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Latest known success statistics at both granularities. Built wholesale
/// from one fetch and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsStore {
    pub ad_stats: BTreeMap<AdCollaboration, Statistics>,
    pub advertiser_stats: BTreeMap<AdvertiserCollaboration, Statistics>,
}

impl StatsStore {
    pub fn from_records(
        ad_records: Vec<AdStatsRecord>,
        advertiser_records: Vec<AdvertiserStatsRecord>,
    ) -> Self {
        Self {
            ad_stats: ingest_ad_stats(ad_records),
            advertiser_stats: ingest_advertiser_stats(advertiser_records),
        }
    }

    pub fn ad(&self, key: &AdCollaboration) -> Option<&Statistics> {
        self.ad_stats.get(key)
    }

    /// Aggregate CTR of an advertiser on a publisher, if one was observed.
    pub fn advertiser_ctr(&self, key: &AdvertiserCollaboration) -> Option<f64> {
        self.advertiser_stats.get(key).map(|s| s.ctr)
    }
}

pub fn ingest_ad_stats(records: Vec<AdStatsRecord>) -> BTreeMap<AdCollaboration, Statistics> {
    records
        .into_iter()
        .map(|record| (record.collaboration, repair("ad", record.stat)))
        .collect()
}

pub fn ingest_advertiser_stats(
    records: Vec<AdvertiserStatsRecord>,
) -> BTreeMap<AdvertiserCollaboration, Statistics> {
    records
        .into_iter()
        .map(|record| (record.collaboration, repair("advertiser", record.stat)))
        .collect()
}

/// Re-derive the CTR from counts. The Reporter already applies the same
/// rule, but the engine does not trust collaborator arithmetic.
fn repair(granularity: &'static str, stat: Statistics) -> Statistics {
    if !stat.is_consistent() {
        debug!(
            granularity,
            impressions = stat.impressions,
            clicks = stat.clicks,
            "Repairing statistics with more clicks than impressions"
        );
        metrics::counter!("stats.repaired").increment(1);
    }
    Statistics::from_counts(stat.impressions, stat.clicks)
}

/// One grouped row of raw event counts, as produced by
/// `SELECT key, event_type, count(1) ... GROUP BY key, event_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount<K> {
    pub key: K,
    pub event_type: String,
    pub total: u64,
}

/// Fold grouped impression/click counts into repaired statistics per key.
/// Any event type other than `impression` or `click` rejects the batch.
pub fn aggregate_event_counts<K: Ord + Copy>(
    rows: &[EventCount<K>],
) -> AdServeResult<BTreeMap<K, Statistics>> {
    let mut counts: BTreeMap<K, (u64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = counts.entry(row.key).or_default();
        match row.event_type.as_str() {
            "impression" => entry.0 = row.total,
            "click" => entry.1 = row.total,
            other => {
                return Err(AdServeError::parse(
                    "events",
                    format!("unknown event type '{other}'"),
                ))
            }
        }
    }

    Ok(counts
        .into_iter()
        .map(|(key, (impressions, clicks))| (key, Statistics::from_counts(impressions, clicks)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad_record(ad: u64, publisher: u64, impressions: u64, clicks: u64) -> AdStatsRecord {
        AdStatsRecord {
            collaboration: AdCollaboration::new(ad, publisher),
            stat: Statistics {
                impressions,
                clicks,
                ctr: 0.0,
            },
        }
    }

    #[test]
    fn test_ingest_recomputes_ctr() {
        let stats = ingest_ad_stats(vec![ad_record(1, 1, 200, 10)]);
        let s = stats[&AdCollaboration::new(1, 1)];
        assert!((s.ctr - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_ingest_repairs_and_bounds_ctr() {
        let stats = ingest_ad_stats(vec![ad_record(1, 1, 4, 9), ad_record(2, 1, 0, 0)]);
        for s in stats.values() {
            assert!(s.clicks <= s.impressions);
            assert!((0.0..=1.0).contains(&s.ctr));
        }
        assert_eq!(stats[&AdCollaboration::new(1, 1)].impressions, 9);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let stats = ingest_ad_stats(vec![ad_record(1, 1, 10, 1), ad_record(1, 1, 10, 5)]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[&AdCollaboration::new(1, 1)].clicks, 5);
    }

    #[test]
    fn test_advertiser_ctr_lookup() {
        let store = StatsStore::from_records(
            Vec::new(),
            vec![AdvertiserStatsRecord {
                collaboration: AdvertiserCollaboration::new(3, 1),
                stat: Statistics {
                    impressions: 40,
                    clicks: 2,
                    ctr: 0.0,
                },
            }],
        );
        assert_eq!(store.advertiser_ctr(&AdvertiserCollaboration::new(3, 1)), Some(0.05));
        assert_eq!(store.advertiser_ctr(&AdvertiserCollaboration::new(3, 2)), None);
    }

    #[test]
    fn test_aggregate_event_counts() {
        let key = AdCollaboration::new(5, 2);
        let rows = vec![
            EventCount {
                key,
                event_type: "impression".to_string(),
                total: 3,
            },
            EventCount {
                key,
                event_type: "click".to_string(),
                total: 4,
            },
        ];
        let stats = aggregate_event_counts(&rows).unwrap();
        assert_eq!(stats[&key].impressions, 4);
        assert_eq!(stats[&key].ctr, 1.0);
    }

    #[test]
    fn test_aggregate_rejects_unknown_event_type() {
        let rows = vec![EventCount {
            key: AdvertiserCollaboration::new(1, 1),
            event_type: "conversion".to_string(),
            total: 1,
        }];
        let err = aggregate_event_counts(&rows).unwrap_err();
        assert!(matches!(err, AdServeError::Parse { .. }));
    }
}
