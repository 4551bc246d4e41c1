//! Serving distributions over winner sets.

use adserve_core::types::{AdCollaboration, AdId, PublisherId};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeightedAd {
    pub ad_id: AdId,
    pub weight: f64,
    /// Running sum of weights up to and including this ad.
    pub cumulative: f64,
}

/// Probability distribution over one publisher's winner set.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Distribution {
    pub publisher_id: PublisherId,
    pub entries: Vec<WeightedAd>,
}

impl Distribution {
    /// Map a uniform draw `u` in `[0, 1)` to an ad by cumulative-weight
    /// inversion. Rounding residue at the top end lands on the last entry
    /// with positive weight.
    pub fn pick(&self, u: f64) -> Option<AdId> {
        self.entries
            .iter()
            .find(|entry| u < entry.cumulative)
            .or_else(|| self.entries.iter().rev().find(|entry| entry.weight > 0.0))
            .map(|entry| entry.ad_id)
    }

    pub fn weight(&self, ad_id: AdId) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.ad_id == ad_id)
            .map(|entry| entry.weight)
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|entry| entry.weight).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalize winner revenue into weights. Winners with zero total revenue
/// share the traffic uniformly. Returns `None` for an empty winner set.
pub fn build_distribution(
    publisher_id: PublisherId,
    winners: &[AdId],
    revenue: &BTreeMap<AdCollaboration, f64>,
) -> Option<Distribution> {
    if winners.is_empty() {
        return None;
    }

    let revenues: Vec<f64> = winners
        .iter()
        .map(|&ad_id| {
            revenue
                .get(&AdCollaboration::new(ad_id, publisher_id))
                .copied()
                .unwrap_or(0.0)
        })
        .collect();
    let total: f64 = revenues.iter().sum();
    let uniform = 1.0 / winners.len() as f64;

    let mut cumulative = 0.0;
    let entries = winners
        .iter()
        .zip(revenues)
        .map(|(&ad_id, ad_revenue)| {
            let weight = if total > 0.0 {
                ad_revenue / total
            } else {
                uniform
            };
            cumulative += weight;
            WeightedAd {
                ad_id,
                weight,
                cumulative,
            }
        })
        .collect();

    Some(Distribution {
        publisher_id,
        entries,
    })
}
