//! Collaborator clients: the Reporter (success statistics) and the Panel
//! (active ad catalog), behind traits the refresh loop depends on.

#![warn(clippy::unwrap_used)]

mod http;
pub mod panel;
pub mod reporter;

pub use panel::PanelClient;
pub use reporter::ReporterClient;

use adserve_core::error::AdServeResult;
use adserve_core::types::{AdStatsRecord, AdvertiserStatsRecord, Catalog};
use async_trait::async_trait;

/// Source of windowed success statistics.
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    async fn fetch_advertiser_stats(&self) -> AdServeResult<Vec<AdvertiserStatsRecord>>;
    async fn fetch_ad_stats(&self) -> AdServeResult<Vec<AdStatsRecord>>;
}

/// Source of the active ad catalog and publisher list.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> AdServeResult<Catalog>;
}
