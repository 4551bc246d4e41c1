//! HTTP client for the Panel's read endpoints.

use crate::http::{build_client, get_json, join_url};
use crate::CatalogSource;
use adserve_core::config::PanelConfig;
use adserve_core::error::AdServeResult;
use adserve_core::types::{Ad, Catalog, PublisherId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

pub const ACTIVE_ADS_PATH: &str = "/api/v1/ads/active";
pub const PUBLISHERS_PATH: &str = "/api/v1/publishers";

const SOURCE: &str = "panel";

/// The Panel returns full publisher rows; only the ID matters here.
#[derive(Debug, Deserialize)]
struct PublisherRecord {
    #[serde(rename = "ID", alias = "Id", alias = "id")]
    id: PublisherId,
}

pub struct PanelClient {
    client: reqwest::Client,
    base_url: String,
}

impl PanelClient {
    pub fn new(config: &PanelConfig) -> AdServeResult<Self> {
        info!(url = %config.base_url, timeout_ms = config.timeout_ms, "Configuring Panel client");
        Ok(Self {
            client: build_client(SOURCE, Duration::from_millis(config.timeout_ms))?,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for PanelClient {
    async fn fetch_catalog(&self) -> AdServeResult<Catalog> {
        let ads: Option<Vec<Ad>> =
            get_json(&self.client, SOURCE, &join_url(&self.base_url, ACTIVE_ADS_PATH)).await?;
        let publishers: Option<Vec<PublisherRecord>> =
            get_json(&self.client, SOURCE, &join_url(&self.base_url, PUBLISHERS_PATH)).await?;

        Ok(normalize_catalog(
            ads.unwrap_or_default(),
            publishers.unwrap_or_default().into_iter().map(|p| p.id),
        ))
    }
}

/// Drop repeated ads and publishers, keeping first occurrences in order.
fn normalize_catalog(ads: Vec<Ad>, publishers: impl IntoIterator<Item = PublisherId>) -> Catalog {
    let listed = ads.len();
    let mut seen_ads = HashSet::new();
    let ads: Vec<Ad> = ads.into_iter().filter(|ad| seen_ads.insert(ad.id)).collect();
    if ads.len() != listed {
        warn!(listed, kept = ads.len(), "Panel listed duplicate ads");
    }

    let mut seen_publishers = HashSet::new();
    let publisher_ids = publishers
        .into_iter()
        .filter(|id| seen_publishers.insert(*id))
        .collect();

    Catalog::new(ads, publisher_ids)
}
