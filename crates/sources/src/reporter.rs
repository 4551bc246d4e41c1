//! HTTP client for the Reporter's aggregation endpoints.

use crate::http::{build_client, get_json, join_url};
use crate::StatisticsSource;
use adserve_core::config::ReporterConfig;
use adserve_core::error::AdServeResult;
use adserve_core::types::{AdStatsRecord, AdvertiserStatsRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub const MEAN_CTR_PATH: &str = "/mean_ctr";
pub const AD_PUBLISHER_PATH: &str = "/ad_publisher";

const SOURCE: &str = "reporter";

pub struct ReporterClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReporterClient {
    pub fn new(config: &ReporterConfig) -> AdServeResult<Self> {
        info!(url = %config.base_url, timeout_ms = config.timeout_ms, "Configuring Reporter client");
        Ok(Self {
            client: build_client(SOURCE, Duration::from_millis(config.timeout_ms))?,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl StatisticsSource for ReporterClient {
    async fn fetch_advertiser_stats(&self) -> AdServeResult<Vec<AdvertiserStatsRecord>> {
        // an empty window serializes as `null`
        let records: Option<Vec<AdvertiserStatsRecord>> =
            get_json(&self.client, SOURCE, &join_url(&self.base_url, MEAN_CTR_PATH)).await?;
        Ok(records.unwrap_or_default())
    }

    async fn fetch_ad_stats(&self) -> AdServeResult<Vec<AdStatsRecord>> {
        let records: Option<Vec<AdStatsRecord>> =
            get_json(&self.client, SOURCE, &join_url(&self.base_url, AD_PUBLISHER_PATH)).await?;
        Ok(records.unwrap_or_default())
    }
}
