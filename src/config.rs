use crate::data_structures::DashboardVariant;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

// Price provider settings
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub rate_limit_per_minute: u32,
    pub use_adjusted_close: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            rate_limit_per_minute: 60,
            use_adjusted_close: true,
        }
    }
}

// Per-IP limit on the JSON/CSV API routes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiRateLimit {
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for ApiRateLimit {
    fn default() -> Self {
        Self {
            per_second: 10,
            burst_size: 20,
        }
    }
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub app_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub provider_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub rate_limit_per_minute: Option<u32>,
    pub use_adjusted_close: Option<bool>,
    pub api_rate_limit: Option<ApiRateLimit>,
    pub enable_api_rate_limit: Option<bool>,
    pub default_variant: Option<String>,
    #[serde(default)]
    pub variants: Vec<DashboardVariant>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub port: u16,
    pub provider: ProviderConfig,
    /// Upper bound on retrieving both price series for one request.
    pub fetch_timeout: Duration,
    pub api_rate_limit: Option<ApiRateLimit>,
    pub default_variant: String,
    pub variants: Vec<DashboardVariant>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "beta-dashboard".to_string(),
            environment: "development".to_string(),
            port: 8501,
            provider: ProviderConfig::default(),
            fetch_timeout: Duration::from_secs(30),
            api_rate_limit: Some(ApiRateLimit::default()),
            default_variant: "pro".to_string(),
            variants: DashboardVariant::builtin(),
        }
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            dotenvy::dotenv().ok(); // Load .env file if present
            Self::from_lookup(|key| env::var(key).ok())
        }
    }

    pub fn from_yaml(file_path: &str) -> anyhow::Result<Self> {
        let yaml_content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file {}", file_path))?;
        Self::from_yaml_str(&yaml_content).with_context(|| format!("Invalid config file {}", file_path))
    }

    pub fn from_yaml_str(yaml_content: &str) -> anyhow::Result<Self> {
        let yaml_config: ConfigYaml =
            serde_yaml::from_str(yaml_content).context("Failed to parse YAML config")?;
        let defaults = Self::default();

        let api_rate_limit = match yaml_config.enable_api_rate_limit {
            Some(false) => None,
            _ => Some(yaml_config.api_rate_limit.unwrap_or_default()),
        };

        let config = Self {
            app_name: yaml_config.app_name.unwrap_or(defaults.app_name),
            environment: yaml_config.environment.unwrap_or(defaults.environment),
            port: yaml_config.port.unwrap_or(defaults.port),
            provider: ProviderConfig {
                base_url: yaml_config.provider_base_url.unwrap_or(defaults.provider.base_url),
                request_timeout: yaml_config
                    .request_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.provider.request_timeout),
                rate_limit_per_minute: yaml_config
                    .rate_limit_per_minute
                    .unwrap_or(defaults.provider.rate_limit_per_minute),
                use_adjusted_close: yaml_config
                    .use_adjusted_close
                    .unwrap_or(defaults.provider.use_adjusted_close),
            },
            fetch_timeout: yaml_config
                .fetch_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            api_rate_limit,
            default_variant: yaml_config.default_variant.unwrap_or(defaults.default_variant),
            variants: if yaml_config.variants.is_empty() {
                defaults.variants
            } else {
                yaml_config.variants
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from key/value lookups, normally the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &str,
        ) -> anyhow::Result<Option<T>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| anyhow::anyhow!("{} has an invalid value '{}'", key, raw)),
                None => Ok(None),
            }
        }

        let defaults = Self::default();
        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;

        let api_rate_limit = match parsed::<bool>(lookup, "ENABLE_API_RATE_LIMIT")? {
            Some(false) => None,
            _ => Some(ApiRateLimit {
                per_second: parsed(lookup, "API_RATE_LIMIT_PER_SECOND")?.unwrap_or(10),
                burst_size: parsed(lookup, "API_RATE_LIMIT_BURST")?.unwrap_or(20),
            }),
        };

        let config = Self {
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parsed(lookup, "PORT")?.unwrap_or(defaults.port),
            provider: ProviderConfig {
                base_url: lookup("PROVIDER_BASE_URL").unwrap_or(defaults.provider.base_url),
                request_timeout: parsed(lookup, "REQUEST_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.provider.request_timeout),
                rate_limit_per_minute: parsed(lookup, "RATE_LIMIT_PER_MINUTE")?
                    .unwrap_or(defaults.provider.rate_limit_per_minute),
                use_adjusted_close: parsed(lookup, "USE_ADJUSTED_CLOSE")?
                    .unwrap_or(defaults.provider.use_adjusted_close),
            },
            fetch_timeout: parsed(lookup, "FETCH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            api_rate_limit,
            default_variant: lookup("DEFAULT_VARIANT").unwrap_or(defaults.default_variant),
            variants: defaults.variants,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.variants.is_empty() {
            bail!("at least one dashboard variant is required");
        }
        let mut names = HashSet::new();
        for variant in &self.variants {
            variant
                .validate()
                .with_context(|| format!("invalid dashboard variant '{}'", variant.name))?;
            if !names.insert(variant.name.as_str()) {
                bail!("duplicate dashboard variant '{}'", variant.name);
            }
        }
        if self.variant(&self.default_variant).is_none() {
            bail!("default variant '{}' is not configured", self.default_variant);
        }
        if self.fetch_timeout.is_zero() || self.provider.request_timeout.is_zero() {
            bail!("timeouts must be greater than zero");
        }
        if let Some(limit) = &self.api_rate_limit {
            if limit.per_second == 0 || limit.burst_size == 0 {
                bail!("API rate limit values must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn variant(&self, name: &str) -> Option<&DashboardVariant> {
        self.variants.iter().find(|v| v.name == name)
    }
}
