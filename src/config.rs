use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{FairnessConfig, MatchingDefaults};
use crate::models::SimilarityAlgorithm;
use crate::services::{ProfileServiceCollections, StoreConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub fairness: FairnessConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where feature vectors and profiles come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Fixture file loaded into memory
    #[default]
    Fixture,
    /// Remote profile service
    ProfileService,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_database_id")]
    pub database_id: String,
    #[serde(default = "default_vectors_collection")]
    pub vectors_collection: String,
    #[serde(default = "default_profiles_collection")]
    pub profiles_collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Documents requested per page when listing a collection
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            fixture_path: None,
            endpoint: default_endpoint(),
            api_key: String::new(),
            database_id: default_database_id(),
            vectors_collection: default_vectors_collection(),
            profiles_collection: default_profiles_collection(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl SourceSettings {
    pub fn collections(&self) -> ProfileServiceCollections {
        ProfileServiceCollections {
            feature_vectors: self.vectors_collection.clone(),
            profiles: self.profiles_collection.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_endpoint() -> String { "http://localhost:8080/v1".to_string() }
fn default_database_id() -> String { "mentorship".to_string() }
fn default_vectors_collection() -> String { ProfileServiceCollections::default().feature_vectors }
fn default_profiles_collection() -> String { ProfileServiceCollections::default().profiles }
fn default_timeout_secs() -> u64 { 30 }
fn default_page_size() -> usize { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs() }
    }
}

impl CacheSettings {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            ttl: Duration::from_secs(self.ttl_secs),
        }
    }
}

fn default_ttl_secs() -> u64 { 300 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    #[serde(default)]
    pub default_algorithm: SimilarityAlgorithm,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_threshold: default_threshold(),
            default_algorithm: SimilarityAlgorithm::default(),
        }
    }
}

impl MatchingSettings {
    pub fn defaults(&self) -> MatchingDefaults {
        MatchingDefaults {
            limit: self.default_limit,
            threshold: self.default_threshold,
            algorithm: self.default_algorithm,
        }
    }
}

fn default_limit() -> usize { 10 }
fn default_threshold() -> f64 { 0.5 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default, config/local)
    /// 3. Environment variables (prefixed with MENTOR_MATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MENTOR_MATCH__CACHE__TTL_SECS -> cache.ttl_secs
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("MENTOR_MATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply well-known variables that live outside the MENTOR_MATCH namespace
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("PROFILE_SERVICE_API_KEY") {
        builder = builder.set_override("source.api_key", api_key)?;
    }
    if let Ok(endpoint) = env::var("PROFILE_SERVICE_ENDPOINT") {
        builder = builder.set_override("source.endpoint", endpoint)?;
    }

    builder.build()
}
