//! CTR confidence bands.
//!
//! Each band is the intersection of two beliefs about the true CTR:
//!
//! * an additive concentration bound `ctr ± c / sqrt(N)` that tightens as
//!   impressions accumulate (`[0, 1]` with no impressions), and
//! * a relative tolerance band `[ctr / R, ctr * R]` that caps how far the
//!   truth may sit from the estimate regardless of sample size.

use adserve_core::config::AllocationConfig;
use adserve_core::types::{AdCollaboration, ConfidenceInterval, Statistics};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundParams {
    pub confidence_constant: f64,
    pub tolerance_factor: f64,
    pub clamp_upper_to_one: bool,
}

impl Default for BoundParams {
    fn default() -> Self {
        Self::from(&AllocationConfig::default())
    }
}

impl From<&AllocationConfig> for BoundParams {
    fn from(config: &AllocationConfig) -> Self {
        Self {
            confidence_constant: config.confidence_constant,
            tolerance_factor: config.tolerance_factor,
            clamp_upper_to_one: config.clamp_upper_to_one,
        }
    }
}

pub fn additive_bound(stats: &Statistics, confidence_constant: f64) -> (f64, f64) {
    if stats.impressions == 0 {
        return (0.0, 1.0);
    }
    let epsilon = confidence_constant / (stats.impressions as f64).sqrt();
    (stats.ctr - epsilon, stats.ctr + epsilon)
}

pub fn relative_bound(ctr: f64, tolerance_factor: f64) -> (f64, f64) {
    (ctr / tolerance_factor, ctr * tolerance_factor)
}

pub fn confidence_interval(stats: &Statistics, params: &BoundParams) -> ConfidenceInterval {
    let (add_lower, add_upper) = additive_bound(stats, params.confidence_constant);
    let (rel_lower, rel_upper) = relative_bound(stats.ctr, params.tolerance_factor);

    let lower = add_lower.max(rel_lower).max(0.0);
    let mut upper = add_upper.min(rel_upper);
    if params.clamp_upper_to_one {
        upper = upper.min(1.0);
    }
    upper = upper.max(0.0);

    ConfidenceInterval::new(lower.min(upper), upper)
}

pub fn compute_bounds(
    estimates: &BTreeMap<AdCollaboration, Statistics>,
    params: &BoundParams,
) -> BTreeMap<AdCollaboration, ConfidenceInterval> {
    estimates
        .iter()
        .map(|(key, stats)| (*key, confidence_interval(stats, params)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_relative_band_dominates_with_many_impressions() {
        // N=100: additive [-0.036, 0.236], relative [0.05, 0.2]
        let ci = confidence_interval(&Statistics::from_counts(100, 10), &BoundParams::default());
        assert!(approx(ci.lower_bound, 0.05));
        assert!(approx(ci.upper_bound, 0.2));
    }

    #[test]
    fn test_additive_bound_dominates_with_huge_sample() {
        // N=1_000_000: epsilon = 0.00136
        let ci = confidence_interval(
            &Statistics::from_counts(1_000_000, 100_000),
            &BoundParams::default(),
        );
        assert!(approx(ci.lower_bound, 0.1 - 0.00136));
        assert!(approx(ci.upper_bound, 0.1 + 0.00136));
    }

    #[test]
    fn test_zero_impressions_uses_relative_band_only() {
        let ci = confidence_interval(&Statistics::prior(0.05), &BoundParams::default());
        assert!(approx(ci.lower_bound, 0.025));
        assert!(approx(ci.upper_bound, 0.1));
    }

    #[test]
    fn test_zero_ctr_collapses_to_zero() {
        let ci = confidence_interval(&Statistics::prior(0.0), &BoundParams::default());
        assert_eq!(ci, ConfidenceInterval::new(0.0, 0.0));
    }

    #[test]
    fn test_upper_clamp_policy() {
        let stats = Statistics::from_counts(4, 3);
        let clamped = confidence_interval(&stats, &BoundParams::default());
        assert!(clamped.upper_bound <= 1.0);

        let params = BoundParams {
            clamp_upper_to_one: false,
            ..BoundParams::default()
        };
        let unclamped = confidence_interval(&stats, &params);
        // min(0.75 + 0.68, 1.5)
        assert!(approx(unclamped.upper_bound, 1.43));
    }

    #[test]
    fn test_bounds_ordered_and_non_negative() {
        let params = BoundParams::default();
        for impressions in [0u64, 1, 2, 5, 17, 100, 10_000] {
            for clicks in 0..=impressions.min(20) {
                let ci = confidence_interval(&Statistics::from_counts(impressions, clicks), &params);
                assert!(ci.lower_bound >= 0.0);
                assert!(ci.lower_bound <= ci.upper_bound);
            }
        }
    }

    #[test]
    fn test_constant_is_configurable() {
        let params = BoundParams {
            confidence_constant: 0.5,
            tolerance_factor: 10.0,
            clamp_upper_to_one: true,
        };
        let ci = confidence_interval(&Statistics::from_counts(100, 10), &params);
        assert!(approx(ci.lower_bound, 0.05));
        assert!(approx(ci.upper_bound, 0.15));
    }
}
