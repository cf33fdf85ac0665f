use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_CSV_NAME: &str = "Dummy_dashboardV2.csv";
pub const DEFAULT_DATASET: &str = "dummy_dashboardv2";
pub const DEFAULT_CATALOG_URL: &str = "https://nidap.nih.gov/foundry-data-proxy/api";
pub const DEFAULT_MARKER_SIZE: f32 = 5.0;
pub const MARKER_SIZE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=50.0;

const ENV_SOURCE: &str = "HALO_VIEWER_SOURCE";
const ENV_CSV: &str = "HALO_VIEWER_CSV";
const ENV_CATALOG_URL: &str = "HALO_VIEWER_CATALOG_URL";
const ENV_DATASET: &str = "HALO_VIEWER_DATASET";
const ENV_TOKEN: &str = "HALO_VIEWER_CATALOG_TOKEN";
const ENV_MARKER_SIZE: &str = "HALO_VIEWER_MARKER_SIZE";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var}: unknown data source '{value}' (expected auto, local or catalog)")]
    UnknownSource { var: &'static str, value: String },
    #[error("{var}: '{value}' is not a marker size between 1 and 50")]
    InvalidMarkerSize { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Which data source to read at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelector {
    /// Probe the package-manager channels for the platform host.
    #[default]
    Auto,
    Local,
    Catalog,
}

impl FromStr for SourceSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(SourceSelector::Auto),
            "local" | "csv" | "file" => Ok(SourceSelector::Local),
            "catalog" | "remote" | "nidap" => Ok(SourceSelector::Catalog),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub source: SourceSelector,
    pub local_path: PathBuf,
    pub catalog_url: String,
    pub dataset: String,
    pub catalog_token: Option<String>,
    pub marker_size: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            source: SourceSelector::Auto,
            local_path: cwd.join(DEFAULT_CSV_NAME),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            catalog_token: None,
            marker_size: DEFAULT_MARKER_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(value) = lookup(ENV_SOURCE) {
            cfg.source = value.parse().map_err(|value| ConfigError::UnknownSource {
                var: ENV_SOURCE,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_CSV) {
            cfg.local_path = PathBuf::from(non_empty(ENV_CSV, value)?);
        }
        if let Some(value) = lookup(ENV_CATALOG_URL) {
            cfg.catalog_url = non_empty(ENV_CATALOG_URL, value)?
                .trim_end_matches('/')
                .to_string();
        }
        if let Some(value) = lookup(ENV_DATASET) {
            cfg.dataset = non_empty(ENV_DATASET, value)?;
        }
        cfg.catalog_token = lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty());
        if let Some(value) = lookup(ENV_MARKER_SIZE) {
            cfg.marker_size = value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|size| MARKER_SIZE_RANGE.contains(size))
                .ok_or(ConfigError::InvalidMarkerSize {
                    var: ENV_MARKER_SIZE,
                    value,
                })?;
        }
        Ok(cfg)
    }
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty { var })
    } else {
        Ok(value)
    }
}
