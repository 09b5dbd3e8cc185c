//! Configuration management for the propagation report service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides (unprefixed, e.g. `PORT`, `OPENAI_API_KEY`)

use std::collections::HashMap;

use clap::ValueEnum;
use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_K_INDEX_URL: &str =
    "https://services.swpc.noaa.gov/json/planetary_k_index_1m.json";
pub const DEFAULT_SOLAR_URL: &str =
    "https://services.swpc.noaa.gov/json/solar-cycle/observed-solar-cycle-indices.json";
pub const DEFAULT_N0NBH_URL: &str = "https://www.hamqsl.com/solarxml.php";
pub const DEFAULT_SIDC_URL: &str = "https://www.sidc.be/SILSO/INFO/snmtotcsv.php";

/// Root of the local storage back-end unless `LOCAL_REPORTS_DIR` is set
pub const LOCAL_STORAGE_ROOT: &str = "local_gcs";

/// Where report bundles are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Deployment {
    #[default]
    Local,
    Gcs,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Chat-completion configuration
    pub llm: LlmConfig,

    /// Storage back-end configuration
    pub storage: StorageConfig,

    /// Upstream feed URLs
    pub sources: SourcesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Use the built-in sample dataset instead of fetching and calling the LLM
    pub mockup_mode: bool,

    /// Static key guarding `/generate`; open when unset
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Bind address
    pub host: String,

    /// Write timeout for `/generate`, in seconds
    pub generate_timeout_secs: u64,

    /// Directory served under `/static`
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the chat-completion endpoint
    pub api_key: String,

    /// Model name
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// System prompt template file
    pub system_prompt_path: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Cloud project (sent as the billing project when set)
    pub gcp_project_id: Option<String>,

    /// Bucket for the object-store back-end
    pub gcs_bucket: Option<String>,

    /// Root of the local back-end
    pub local_root: String,
}

#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub k_index_url: String,
    pub solar_url: String,
    pub n0nbh_url: String,
    pub sidc_url: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// DEBUG, INFO, WARN, ERROR or FATAL
    pub level: String,

    /// `json` or `text`
    pub format: String,
}

/// Flat view of the environment keys
#[derive(Debug, Deserialize)]
struct Settings {
    environment: String,
    port: u16,
    bind_address: String,
    generate_timeout_secs: u64,
    static_dir: String,
    openai_api_key: Option<String>,
    openai_model: String,
    openai_base_url: String,
    system_prompt_path: String,
    gcp_project_id: Option<String>,
    gcs_bucket: Option<String>,
    local_reports_dir: Option<String>,
    mockup_mode: bool,
    noaa_k_index_url: String,
    noaa_solar_url: String,
    n0nbh_solar_url: String,
    sidc_rss_url: String,
    log_level: String,
    log_format: String,
    report_api_key: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None)
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let environment = match &vars {
            Some(vars) => vars.get("ENVIRONMENT").cloned(),
            None => std::env::var("ENVIRONMENT").ok(),
        }
        .unwrap_or_else(|| "development".into());

        let settings: Settings = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("port", 8981)?
            .set_default("bind_address", "0.0.0.0")?
            .set_default("generate_timeout_secs", 300)?
            .set_default("static_dir", "static")?
            .set_default("openai_model", "gpt-4.1")?
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("system_prompt_path", "prompts/system_prompt.md")?
            .set_default("mockup_mode", false)?
            .set_default("noaa_k_index_url", DEFAULT_K_INDEX_URL)?
            .set_default("noaa_solar_url", DEFAULT_SOLAR_URL)?
            .set_default("n0nbh_solar_url", DEFAULT_N0NBH_URL)?
            .set_default("sidc_rss_url", DEFAULT_SIDC_URL)?
            .set_default("log_level", "INFO")?
            .set_default("log_format", "text")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables
            .add_source(Environment::default().try_parsing(true).source(vars))
            .build()?
            .try_deserialize()?;

        Ok(Self::from_settings(settings))
    }

    fn from_settings(settings: Settings) -> Self {
        Self {
            environment: settings.environment,
            server: ServerConfig {
                port: settings.port,
                host: settings.bind_address,
                generate_timeout_secs: settings.generate_timeout_secs,
                static_dir: settings.static_dir,
            },
            llm: LlmConfig {
                api_key: non_empty(settings.openai_api_key).unwrap_or_default(),
                model: settings.openai_model,
                base_url: settings.openai_base_url,
                system_prompt_path: settings.system_prompt_path,
            },
            storage: StorageConfig {
                gcp_project_id: non_empty(settings.gcp_project_id),
                gcs_bucket: non_empty(settings.gcs_bucket),
                local_root: non_empty(settings.local_reports_dir)
                    .unwrap_or_else(|| LOCAL_STORAGE_ROOT.to_string()),
            },
            sources: SourcesConfig {
                k_index_url: settings.noaa_k_index_url,
                solar_url: settings.noaa_solar_url,
                n0nbh_url: settings.n0nbh_solar_url,
                sidc_url: settings.sidc_rss_url,
            },
            logging: LoggingConfig {
                level: settings.log_level,
                format: settings.log_format,
            },
            mockup_mode: settings.mockup_mode,
            api_key: non_empty(settings.report_api_key),
        }
    }

    /// Check the settings required by the chosen mode and deployment
    pub fn validate(&self, deployment: Deployment) -> Result<(), AppError> {
        if !self.mockup_mode && self.llm.api_key.is_empty() {
            return Err(AppError::Configuration(
                "OPENAI_API_KEY is required unless MOCKUP_MODE=true".to_string(),
            ));
        }
        if deployment == Deployment::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(AppError::Configuration(
                "GCS_BUCKET is required for the gcs deployment".to_string(),
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    /// `tracing` filter level for `LOG_LEVEL`; FATAL maps to error
    pub fn filter_level(&self) -> &'static str {
        match self.level.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "FATAL" => "error",
            _ => "info",
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}
