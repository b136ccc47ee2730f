//! # Core Configuration Module
//!
//! Configuration for the catalog sync engine.
//!
//! ## Overview
//!
//! Two pieces live here:
//!
//! - [`SyncSettings`]: plain values (page size, crawl ceiling, throttle,
//!   callback base URL, database path, bind address) read from the
//!   environment with defaults.
//! - [`CoreConfig`]: the settings plus the host bridges the engine needs,
//!   assembled through [`CoreConfigBuilder`] with fail-fast validation.
//!
//! ## Required Dependencies
//!
//! - `ConnectionDirectory` - Connection and credential lookup
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `HttpClient` - desktop default: reqwest (requires the `desktop-shims` feature)
//! - `Clock` - default: [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .settings(SyncSettings::from_env()?)
//!     .connection_directory(Arc::new(directory))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, ConnectionDirectory, HttpClient, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Hard upper bound on page size accepted by the provider.
pub const MAX_PER_PAGE: u32 = 100;

pub const DEFAULT_PER_PAGE: u32 = 100;
pub const DEFAULT_MAX_PAGES: u32 = 250;
pub const DEFAULT_PAGE_THROTTLE: Duration = Duration::from_millis(150);
pub const DEFAULT_BACKSTOP_MAX_PAGES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "CATALOG_SYNC_";

/// Tunables for crawling, webhooks and the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Items requested per provider page (1..=100)
    pub per_page: u32,
    /// Pages fetched by a single crawl before it stops
    pub max_pages: u32,
    /// Pause between consecutive page fetches
    pub page_throttle: Duration,
    /// Page budget for the nightly backstop crawl
    pub backstop_max_pages: u32,
    pub request_timeout: Duration,
    /// Public base URL used to build webhook callback URLs
    pub callback_base_url: Option<String>,
    pub database_path: PathBuf,
    pub bind_addr: String,
    /// Run the nightly backstop on this interval when set
    pub nightly_backstop_interval: Option<Duration>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
            page_throttle: DEFAULT_PAGE_THROTTLE,
            backstop_max_pages: DEFAULT_BACKSTOP_MAX_PAGES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            callback_base_url: None,
            database_path: PathBuf::from("catalog-sync.db"),
            bind_addr: "0.0.0.0:8080".to_string(),
            nightly_backstop_interval: None,
        }
    }
}

impl SyncSettings {
    /// Read settings from `CATALOG_SYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();

        if let Some(path) = var("DATABASE_PATH") {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(base) = var("CALLBACK_BASE_URL") {
            settings.callback_base_url = Some(base);
        }
        if let Some(addr) = var("BIND_ADDR") {
            settings.bind_addr = addr;
        }
        if let Some(raw) = var("PER_PAGE") {
            settings.per_page = parse_number("PER_PAGE", &raw)?;
        }
        if let Some(raw) = var("MAX_PAGES") {
            settings.max_pages = parse_number("MAX_PAGES", &raw)?;
        }
        if let Some(raw) = var("PAGE_THROTTLE_MS") {
            settings.page_throttle = Duration::from_millis(parse_number("PAGE_THROTTLE_MS", &raw)?);
        }
        if let Some(raw) = var("BACKSTOP_MAX_PAGES") {
            settings.backstop_max_pages = parse_number("BACKSTOP_MAX_PAGES", &raw)?;
        }
        if let Some(raw) = var("REQUEST_TIMEOUT_SECS") {
            settings.request_timeout =
                Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = var("BACKSTOP_INTERVAL_SECS") {
            let secs: u64 = parse_number("BACKSTOP_INTERVAL_SECS", &raw)?;
            settings.nightly_backstop_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(Error::Config(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.per_page
            )));
        }

        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be greater than 0".to_string()));
        }

        if self.backstop_max_pages == 0 {
            return Err(Error::Config(
                "backstop_max_pages must be greater than 0".to_string(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if let Some(base) = &self.callback_base_url {
            let parsed = url::Url::parse(base).map_err(|e| {
                Error::Config(format!("Invalid callback base URL '{}': {}", base, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::Config(format!(
                    "Callback base URL must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }

    pub fn with_callback_base_url(mut self, base: impl Into<String>) -> Self {
        self.callback_base_url = Some(base.into());
        self
    }

    pub fn with_page_throttle(mut self, throttle: Duration) -> Self {
        self.page_throttle = throttle;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| Error::InvalidEnv {
        var: format!("{}{}", ENV_PREFIX, name),
        value: raw.to_string(),
    })
}

/// Settings plus the host bridges the engine depends on.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub settings: SyncSettings,
    pub http_client: Arc<dyn HttpClient>,
    pub connection_directory: Arc<dyn ConnectionDirectory>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings", &self.settings)
            .field("http_client", &"HttpClient { ... }")
            .field("connection_directory", &"ConnectionDirectory { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(settings: &SyncSettings) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(settings.request_timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_settings: &SyncSettings) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the catalog provider. \
                 Enable the 'desktop-shims' feature to use the reqwest client, or inject one."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings: Option<SyncSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    connection_directory: Option<Arc<dyn ConnectionDirectory>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest client is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the connection directory (required).
    pub fn connection_directory(mut self, directory: Arc<dyn ConnectionDirectory>) -> Self {
        self.connection_directory = Some(directory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// Fails with [`Error::CapabilityMissing`] when a required bridge is absent
    /// and with [`Error::Config`] when the settings do not validate.
    pub fn build(self) -> Result<CoreConfig> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let connection_directory =
            self.connection_directory
                .ok_or_else(|| Error::CapabilityMissing {
                    capability: "ConnectionDirectory".to_string(),
                    message: "ConnectionDirectory implementation is required to resolve \
                         connection credentials. Desktop: use SqliteConnectionDirectory."
                        .to_string(),
                })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&settings)?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(CoreConfig {
            settings,
            http_client,
            connection_directory,
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{ConnectionId, Credential, HttpRequest, HttpResponse, ManualClock};
    use std::collections::HashMap;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!()
        }
    }

    struct MockDirectory;

    #[async_trait]
    impl ConnectionDirectory for MockDirectory {
        async fn credential(&self, _id: &ConnectionId) -> BridgeResult<Option<Credential>> {
            Ok(None)
        }

        async fn list_connections(&self) -> BridgeResult<Vec<ConnectionId>> {
            Ok(Vec::new())
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.per_page, 100);
        assert_eq!(settings.max_pages, 250);
        assert_eq!(settings.page_throttle, Duration::from_millis(150));
        assert_eq!(settings.backstop_max_pages, 3);
        assert!(settings.callback_base_url.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides() {
        let settings = SyncSettings::from_env_with(env(&[
            ("CATALOG_SYNC_CALLBACK_BASE_URL", "https://hooks.example.com/"),
            ("CATALOG_SYNC_PER_PAGE", "50"),
            ("CATALOG_SYNC_PAGE_THROTTLE_MS", "0"),
            ("CATALOG_SYNC_BACKSTOP_INTERVAL_SECS", "86400"),
            ("CATALOG_SYNC_BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(
            settings.callback_base_url.as_deref(),
            Some("https://hooks.example.com/")
        );
        assert_eq!(settings.per_page, 50);
        assert_eq!(settings.page_throttle, Duration::ZERO);
        assert_eq!(
            settings.nightly_backstop_interval,
            Some(Duration::from_secs(86_400))
        );
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_from_env_blank_values_fall_back_to_defaults() {
        let settings =
            SyncSettings::from_env_with(env(&[("CATALOG_SYNC_CALLBACK_BASE_URL", "  ")])).unwrap();
        assert!(settings.callback_base_url.is_none());
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let result = SyncSettings::from_env_with(env(&[("CATALOG_SYNC_MAX_PAGES", "lots")]));
        match result {
            Err(Error::InvalidEnv { var, value }) => {
                assert_eq!(var, "CATALOG_SYNC_MAX_PAGES");
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_bounds() {
        assert!(SyncSettings::default().with_per_page(0).validate().is_err());
        assert!(SyncSettings::default().with_per_page(101).validate().is_err());
        assert!(SyncSettings::default().with_max_pages(0).validate().is_err());
        assert!(SyncSettings::default()
            .with_callback_base_url("ftp://example.com")
            .validate()
            .is_err());
        assert!(SyncSettings::default()
            .with_callback_base_url("not a url")
            .validate()
            .is_err());
    }

    #[test]
    fn test_builder_requires_connection_directory() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "ConnectionDirectory")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let clock = Arc::new(ManualClock::new(42));
        let config = CoreConfig::builder()
            .settings(SyncSettings::default().with_max_pages(5))
            .http_client(Arc::new(MockHttpClient))
            .connection_directory(Arc::new(MockDirectory))
            .clock(clock)
            .build()
            .unwrap();

        assert_eq!(config.settings.max_pages, 5);
        assert_eq!(config.clock.unix_timestamp_millis(), 42);
        assert!(format!("{:?}", config).contains("ConnectionDirectory { ... }"));
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        let result = CoreConfig::builder()
            .settings(SyncSettings::default().with_per_page(500))
            .http_client(Arc::new(MockHttpClient))
            .connection_directory(Arc::new(MockDirectory))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client_without_shims() {
        let result = CoreConfig::builder()
            .connection_directory(Arc::new(MockDirectory))
            .build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_builder_defaults_http_client_with_shims() {
        let config = CoreConfig::builder()
            .connection_directory(Arc::new(MockDirectory))
            .build();
        assert!(config.is_ok());
    }
}
