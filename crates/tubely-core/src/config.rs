//! Configuration module
//!
//! Server, storage, and ingestion settings loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::{StorageBackend, ThumbnailStrategy};

const SERVER_PORT: u16 = 8091;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_VIDEO_SIZE_MB: usize = 1024;
const MAX_THUMBNAIL_SIZE_MB: usize = 10;
const PROBE_TIMEOUT_SECS: u64 = 10;
const ASPECT_TOLERANCE: f64 = 0.05;
const ASSETS_ROOT: &str = "./assets";

/// Settings shared by everything that serves HTTP
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_port: u16,
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
}

/// Ingestion pipeline configuration
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub base: ServerConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, Spaces, ...)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub assets_root: String,
    pub thumbnail_strategy: ThumbnailStrategy,
    // Upload limits
    pub max_video_size_bytes: usize,
    pub max_thumbnail_size_bytes: usize,
    // Probe
    pub ffprobe_path: String,
    pub probe_timeout_secs: u64,
    pub aspect_tolerance: f64,
    pub scratch_dir: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base: ServerConfig {
                server_port: SERVER_PORT,
                public_base_url: format!("http://localhost:{}", SERVER_PORT),
                cors_origins: vec!["*".to_string()],
                database_url: String::new(),
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                jwt_secret: String::new(),
                environment: "development".to_string(),
            },
            storage_backend: StorageBackend::S3,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
            assets_root: ASSETS_ROOT.to_string(),
            thumbnail_strategy: ThumbnailStrategy::default(),
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
            max_thumbnail_size_bytes: MAX_THUMBNAIL_SIZE_MB * 1024 * 1024,
            ffprobe_path: "ffprobe".to_string(),
            probe_timeout_secs: PROBE_TIMEOUT_SECS,
            aspect_tolerance: ASPECT_TOLERANCE,
            scratch_dir: None,
        }
    }
}

/// Parse a raw setting, using `default` when it is unset or blank.
fn parse_var<T>(key: &str, raw: Option<String>, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {} {:?}: {}", key, value, e)),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_var(key, env::var(key).ok(), default)
}

fn megabytes(key: &str, mb: usize) -> Result<usize, anyhow::Error> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {} MB", key, mb))
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = env_parse("PORT", SERVER_PORT)?;
        let public_base_url = env_opt("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", server_port));

        let base = ServerConfig {
            server_port,
            public_base_url,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            db_timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            environment,
        };

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };
        let thumbnail_strategy = match env_opt("THUMBNAIL_STRATEGY") {
            Some(raw) => raw.parse::<ThumbnailStrategy>()?,
            None => ThumbnailStrategy::default(),
        };

        Ok(Self {
            base,
            storage_backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            local_storage_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
            assets_root: env_opt("ASSETS_ROOT").unwrap_or_else(|| ASSETS_ROOT.to_string()),
            thumbnail_strategy,
            max_video_size_bytes: megabytes(
                "MAX_VIDEO_SIZE_MB",
                env_parse("MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB)?,
            )?,
            max_thumbnail_size_bytes: megabytes(
                "MAX_THUMBNAIL_SIZE_MB",
                env_parse("MAX_THUMBNAIL_SIZE_MB", MAX_THUMBNAIL_SIZE_MB)?,
            )?,
            ffprobe_path: env_opt("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            probe_timeout_secs: env_parse("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS)?,
            aspect_tolerance: env_parse("ASPECT_TOLERANCE", ASPECT_TOLERANCE)?,
            scratch_dir: env_opt("SCRATCH_DIR"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.base.database_url.starts_with("postgresql://")
            && !self.base.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.probe_timeout_secs == 0 {
            return Err(anyhow::anyhow!("PROBE_TIMEOUT_SECS must be greater than 0"));
        }

        if !self.aspect_tolerance.is_finite() || self.aspect_tolerance <= 0.0 {
            return Err(anyhow::anyhow!(
                "ASPECT_TOLERANCE must be a positive number"
            ));
        }

        if self.max_video_size_bytes == 0 || self.max_thumbnail_size_bytes == 0 {
            return Err(anyhow::anyhow!("Upload size limits must be greater than 0"));
        }

        Ok(())
    }
}

/// Process-wide configuration handle.
#[derive(Clone, Debug)]
pub struct Config(pub Box<IngestConfig>);

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = IngestConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn public_base_url(&self) -> &str {
        self.0.base.public_base_url.trim_end_matches('/')
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.0.base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.0.base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.0.base.jwt_secret
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment().to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.0.storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.0.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.0.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.0.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.0.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.0.local_storage_base_url.as_deref()
    }

    pub fn assets_root(&self) -> &str {
        &self.0.assets_root
    }

    pub fn thumbnail_strategy(&self) -> ThumbnailStrategy {
        self.0.thumbnail_strategy
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.0.max_video_size_bytes
    }

    pub fn max_thumbnail_size_bytes(&self) -> usize {
        self.0.max_thumbnail_size_bytes
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.0.ffprobe_path
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.0.probe_timeout_secs)
    }

    pub fn aspect_tolerance(&self) -> f64 {
        self.0.aspect_tolerance
    }

    pub fn scratch_dir(&self) -> Option<&str> {
        self.0.scratch_dir.as_deref()
    }
}

impl From<IngestConfig> for Config {
    fn from(config: IngestConfig) -> Self {
        Config(Box::new(config))
    }
}
