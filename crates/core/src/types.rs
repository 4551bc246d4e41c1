use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type AdId = u64;
pub type AdvertiserId = u64;
pub type PublisherId = u64;

/// Performance record key of one ad on one publisher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct AdCollaboration {
    #[serde(rename = "AdID")]
    pub ad_id: AdId,
    #[serde(rename = "PublisherID")]
    pub publisher_id: PublisherId,
}

impl AdCollaboration {
    pub fn new(ad_id: AdId, publisher_id: PublisherId) -> Self {
        Self {
            ad_id,
            publisher_id,
        }
    }
}

/// Aggregate performance key of all of one advertiser's ads on one publisher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct AdvertiserCollaboration {
    #[serde(rename = "AdvertiserID")]
    pub advertiser_id: AdvertiserId,
    #[serde(rename = "PublisherID")]
    pub publisher_id: PublisherId,
}

impl AdvertiserCollaboration {
    pub fn new(advertiser_id: AdvertiserId, publisher_id: PublisherId) -> Self {
        Self {
            advertiser_id,
            publisher_id,
        }
    }
}

/// Success statistics of a collaboration over the Reporter's trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Statistics {
    #[serde(rename = "Impressions", default)]
    pub impressions: u64,
    #[serde(rename = "Clicks", default)]
    pub clicks: u64,
    #[serde(rename = "CTR", default)]
    pub ctr: f64,
}

impl Statistics {
    /// Build statistics from raw counts, repairing `impressions < clicks`
    /// (late-arriving impression events) before deriving the CTR. With no
    /// impressions the CTR is left at 0 for the prior to fill in.
    pub fn from_counts(impressions: u64, clicks: u64) -> Self {
        let impressions = impressions.max(clicks);
        let ctr = if impressions > 0 {
            clicks as f64 / impressions as f64
        } else {
            0.0
        };
        Self {
            impressions,
            clicks,
            ctr,
        }
    }

    /// A cold-start entry: no observations, CTR taken from an aggregate.
    pub fn prior(ctr: f64) -> Self {
        Self {
            impressions: 0,
            clicks: 0,
            ctr: sanitize_ctr(ctr),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.clicks <= self.impressions
    }
}

fn sanitize_ctr(ctr: f64) -> f64 {
    if ctr.is_finite() {
        ctr.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Range in which the true CTR of a collaboration most likely lies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceInterval {
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ConfidenceInterval {
    pub fn new(lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// One row of the Reporter's `/ad_publisher` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdStatsRecord {
    pub collaboration: AdCollaboration,
    pub stat: Statistics,
}

/// One row of the Reporter's `/mean_ctr` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdvertiserStatsRecord {
    pub collaboration: AdvertiserCollaboration,
    pub stat: Statistics,
}

/// An active ad as listed by the Panel. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Ad {
    pub id: AdId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub redirect_link: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub bid_value: f64,
    #[serde(default)]
    pub advertiser_id: AdvertiserId,
}

impl Ad {
    /// Bid used for revenue estimation; malformed bids count as zero.
    pub fn effective_bid(&self) -> f64 {
        if self.bid_value.is_finite() && self.bid_value > 0.0 {
            self.bid_value
        } else {
            0.0
        }
    }
}

/// The active ad catalog and publisher list at one point in time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub ads: Vec<Ad>,
    pub publisher_ids: Vec<PublisherId>,
}

impl Catalog {
    pub fn new(ads: Vec<Ad>, publisher_ids: Vec<PublisherId>) -> Self {
        Self { ads, publisher_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty() || self.publisher_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts_repairs_inconsistent_clicks() {
        let stats = Statistics::from_counts(3, 5);
        assert_eq!(stats.impressions, 5);
        assert_eq!(stats.clicks, 5);
        assert_eq!(stats.ctr, 1.0);
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_from_counts_zero_impressions() {
        let stats = Statistics::from_counts(0, 0);
        assert_eq!(stats.ctr, 0.0);
    }

    #[test]
    fn test_prior_sanitizes_ctr() {
        assert_eq!(Statistics::prior(f64::NAN).ctr, 0.0);
        assert_eq!(Statistics::prior(1.7).ctr, 1.0);
        assert_eq!(Statistics::prior(0.05).ctr, 0.05);
    }

    #[test]
    fn test_reporter_wire_format() {
        let json = r#"[{"Collaboration":{"AdID":7,"PublisherID":3},"Stat":{"Impressions":100,"Clicks":10,"CTR":0.1}}]"#;
        let records: Vec<AdStatsRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].collaboration, AdCollaboration::new(7, 3));
        assert_eq!(records[0].stat.impressions, 100);

        let json = r#"{"Collaboration":{"AdvertiserID":2,"PublisherID":3},"Stat":{"Impressions":0,"Clicks":0,"CTR":0}}"#;
        let record: AdvertiserStatsRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.collaboration, AdvertiserCollaboration::new(2, 3));
    }

    #[test]
    fn test_ad_effective_bid() {
        let mut ad = Ad {
            id: 1,
            title: "Shoes".to_string(),
            redirect_link: String::new(),
            image_path: String::new(),
            bid_value: -4.0,
            advertiser_id: 1,
        };
        assert_eq!(ad.effective_bid(), 0.0);
        ad.bid_value = f64::INFINITY;
        assert_eq!(ad.effective_bid(), 0.0);
        ad.bid_value = 12.5;
        assert_eq!(ad.effective_bid(), 12.5);
    }

    #[test]
    fn test_ad_panel_format() {
        let json = r#"{"Id":4,"Title":"Sale","RedirectLink":"https://shop","ImagePath":"/img/4.png","BidValue":20,"AdvertiserId":9}"#;
        let ad: Ad = serde_json::from_str(json).unwrap();
        assert_eq!(ad.id, 4);
        assert_eq!(ad.bid_value, 20.0);
        assert_eq!(ad.advertiser_id, 9);
    }
}
