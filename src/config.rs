use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub listing: ListingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on request bodies, attachments included.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Supabase,
    #[default]
    Fs,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "fs" => Ok(StorageBackend::Fs),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the `fs` backend.
    pub root: PathBuf,
    pub supabase: SupabaseSettings,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: PathBuf::from("data/blobs"),
            supabase: SupabaseSettings::default(),
        }
    }
}

/// Supabase Storage connection settings. Either `url` or `project_ref` must
/// be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub project_ref: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: Option<String>,
    pub prefix: String,
}

impl SupabaseSettings {
    pub fn base_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| {
                self.project_ref
                    .as_ref()
                    .map(|r| format!("https://{}.supabase.co", r))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Maximum number of blob fetches in flight per listing request.
    pub fetch_concurrency: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `config.toml` when present), then
    /// apply environment overrides. A missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("GALLERY_PORT") {
            self.server.port = parse_value("GALLERY_PORT", &v)?;
        }
        if let Some(v) = lookup("GALLERY_MAX_BODY_BYTES") {
            self.server.max_body_bytes = parse_value("GALLERY_MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = lookup("GALLERY_STORAGE") {
            self.storage.backend = parse_value("GALLERY_STORAGE", &v)?;
        }
        if let Some(v) = lookup("GALLERY_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("GALLERY_FETCH_CONCURRENCY") {
            self.listing.fetch_concurrency = parse_value("GALLERY_FETCH_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("GALLERY_LOG_DIR") {
            self.logging.dir = PathBuf::from(v);
        }

        let supabase = &mut self.storage.supabase;
        if let Some(v) = lookup("SUPABASE_URL") {
            supabase.url = Some(v);
        }
        if let Some(v) = lookup("SUPABASE_PROJECT_REF") {
            supabase.project_ref = Some(v);
        }
        if let Some(v) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            supabase.service_role_key = Some(v);
        }
        if let Some(v) = lookup("SUPABASE_BUCKET") {
            supabase.bucket = Some(v);
        }
        if let Some(v) = lookup("SUPABASE_PREFIX") {
            supabase.prefix = v;
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.listing.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "listing.fetch_concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: format!("{} ({})", value, e),
    })
}
