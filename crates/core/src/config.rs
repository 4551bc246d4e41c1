use crate::error::{AdServeError, AdServeResult};
use serde::Deserialize;
use std::time::Duration;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADSERVE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Tunables of the allocation pipeline and its refresh loop.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// `R` in the relative band `[ctr / R, ctr * R]`. Must exceed 1.
    #[serde(default = "default_tolerance_factor")]
    pub tolerance_factor: f64,
    /// Numerator of the additive half-width `c / sqrt(N)`.
    #[serde(default = "default_confidence_constant")]
    pub confidence_constant: f64,
    /// Entries with fewer impressions than this take the advertiser prior.
    #[serde(default = "default_prior_min_impressions")]
    pub prior_min_impressions: u64,
    #[serde(default = "default_clamp_upper_to_one")]
    pub clamp_upper_to_one: bool,
    /// Upper bound on each collaborator fetch within a cycle.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReporterConfig {
    #[serde(default = "default_reporter_url")]
    pub base_url: String,
    #[serde(default = "default_collaborator_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_panel_url")]
    pub base_url: String,
    #[serde(default = "default_collaborator_timeout_ms")]
    pub timeout_ms: u64,
}

// Default functions
fn default_node_id() -> String {
    "adserve-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    9090
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_tolerance_factor() -> f64 {
    2.0
}
fn default_confidence_constant() -> f64 {
    1.36
}
fn default_prior_min_impressions() -> u64 {
    10
}
fn default_clamp_upper_to_one() -> bool {
    true
}
fn default_fetch_timeout_ms() -> u64 {
    10_000
}
fn default_reporter_url() -> String {
    "http://localhost:9999".to_string()
}
fn default_panel_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_collaborator_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            tolerance_factor: default_tolerance_factor(),
            confidence_constant: default_confidence_constant(),
            prior_min_impressions: default_prior_min_impressions(),
            clamp_upper_to_one: default_clamp_upper_to_one(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            base_url: default_reporter_url(),
            timeout_ms: default_collaborator_timeout_ms(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: default_panel_url(),
            timeout_ms: default_collaborator_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            allocation: AllocationConfig::default(),
            reporter: ReporterConfig::default(),
            panel: PanelConfig::default(),
        }
    }
}

impl AllocationConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> AdServeResult<()> {
        if self.refresh_interval_secs == 0 {
            return Err(AdServeError::Config(
                "allocation.refresh_interval_secs must be positive".to_string(),
            ));
        }
        if !self.tolerance_factor.is_finite() || self.tolerance_factor <= 1.0 {
            return Err(AdServeError::Config(format!(
                "allocation.tolerance_factor must be greater than 1, got {}",
                self.tolerance_factor
            )));
        }
        if !self.confidence_constant.is_finite() || self.confidence_constant <= 0.0 {
            return Err(AdServeError::Config(format!(
                "allocation.confidence_constant must be positive, got {}",
                self.confidence_constant
            )));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(AdServeError::Config(
                "allocation.fetch_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADSERVE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> AdServeResult<()> {
        self.allocation.validate()?;
        if self.reporter.base_url.is_empty() {
            return Err(AdServeError::Config("reporter.base_url is empty".to_string()));
        }
        if self.panel.base_url.is_empty() {
            return Err(AdServeError::Config("panel.base_url is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.allocation.tolerance_factor, 2.0);
        assert_eq!(config.allocation.confidence_constant, 1.36);
        assert_eq!(config.allocation.refresh_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_tolerance_factor_must_exceed_one() {
        let config = AllocationConfig {
            tolerance_factor: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AdServeError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = AllocationConfig {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let json = r#"{"allocation": {"tolerance_factor": 3.0}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.allocation.tolerance_factor, 3.0);
        assert_eq!(config.allocation.prior_min_impressions, 10);
        assert_eq!(config.api.http_port, 9090);
    }
}
