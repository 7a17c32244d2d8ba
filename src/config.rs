use clap::{Parser, ValueEnum};
use std::{env, fmt, time::Duration};
use thiserror::Error;

/// Where object payloads live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    S3,
    Local,
}

/// What kind of URL clients receive for a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UrlMode {
    /// Time-limited signed URL, issued per request.
    Presigned,
    /// Permanent URL; the bucket (or this service) must serve it publicly.
    Public,
}

/// How `GET /files/...` interprets its path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveBy {
    Key,
    Filename,
}

/// Which side `GET /newsletters` reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogSource {
    Store,
    Records,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub backend: StorageBackend,
    pub url_mode: UrlMode,
    pub resolve_by: ResolveBy,
    pub catalog_source: CatalogSource,
    pub storage_dir: String,
    pub public_base_url: String,
    /// Present whenever `backend` is `S3`.
    pub s3: Option<S3Config>,
    /// `APP_ENV=development`: error responses carry the underlying cause.
    pub development: bool,
    pub max_files: usize,
    pub max_body_bytes: usize,
    pub presign_expiry: Duration,
    pub persist_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "PDF upload and newsletter listing service")]
pub struct Args {
    /// Host to bind to (overrides PDF_VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// SQLite URL for metadata records (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object storage backend (overrides STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// URL kind handed to clients (overrides URL_MODE)
    #[arg(long, value_enum)]
    pub url_mode: Option<UrlMode>,

    /// Resolve /files/... by storage key or by filename (overrides RESOLVE_BY)
    #[arg(long, value_enum)]
    pub resolve_by: Option<ResolveBy>,

    /// List newsletters from the object store or the records (overrides CATALOG_SOURCE)
    #[arg(long, value_enum)]
    pub catalog_source: Option<CatalogSource>,

    /// Directory for the local backend (overrides STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Base URL this service is reachable at (overrides PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Maximum files per upload request
    #[arg(long, default_value_t = 50)]
    pub max_files: usize,

    /// Maximum upload request body size in bytes
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Lifetime of presigned URLs in seconds
    #[arg(long, default_value_t = 3600)]
    pub presign_expiry_secs: u64,

    /// Bound on each metadata insert in seconds
    #[arg(long, default_value_t = 15)]
    pub persist_timeout_secs: u64,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn parse_enum<T: ValueEnum>(name: &'static str, value: String) -> Result<T, ConfigError> {
    T::from_str(&value, true).map_err(|reason| ConfigError::Invalid {
        name,
        value,
        reason,
    })
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool), ConfigError> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed CLI args over values read through `lookup`.
    pub fn from_sources(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, bool), ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match (args.port, var("PORT")) {
            (Some(port), _) => port,
            (None, Some(value)) => value.parse::<u16>().map_err(|err| ConfigError::Invalid {
                name: "PORT",
                value: value.clone(),
                reason: err.to_string(),
            })?,
            (None, None) => 4000,
        };

        let backend = match args.backend {
            Some(backend) => backend,
            None => var("STORAGE_BACKEND")
                .map(|v| parse_enum("STORAGE_BACKEND", v))
                .transpose()?
                .unwrap_or(StorageBackend::S3),
        };
        let url_mode = match args.url_mode {
            Some(mode) => mode,
            None => var("URL_MODE")
                .map(|v| parse_enum("URL_MODE", v))
                .transpose()?
                .unwrap_or(UrlMode::Presigned),
        };
        let resolve_by = match args.resolve_by {
            Some(mode) => mode,
            None => var("RESOLVE_BY")
                .map(|v| parse_enum("RESOLVE_BY", v))
                .transpose()?
                .unwrap_or(ResolveBy::Key),
        };
        let catalog_source = match args.catalog_source {
            Some(source) => source,
            None => var("CATALOG_SOURCE")
                .map(|v| parse_enum("CATALOG_SOURCE", v))
                .transpose()?
                .unwrap_or(CatalogSource::Store),
        };

        let s3 = match backend {
            StorageBackend::S3 => {
                let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));
                Some(S3Config {
                    access_key_id: required("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
                    region: required("AWS_REGION")?,
                    bucket: required("S3_BUCKET_NAME")?,
                    endpoint: var("S3_ENDPOINT"),
                })
            }
            StorageBackend::Local => None,
        };

        let cfg = Self {
            host: args
                .host
                .or_else(|| var("PDF_VAULT_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/pdf_vault.db".into()),
            backend,
            url_mode,
            resolve_by,
            catalog_source,
            storage_dir: args
                .storage_dir
                .or_else(|| var("STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            public_base_url: args
                .public_base_url
                .or_else(|| var("PUBLIC_BASE_URL"))
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            s3,
            development: var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
            max_files: args.max_files,
            max_body_bytes: args.max_body_bytes,
            presign_expiry: Duration::from_secs(args.presign_expiry_secs),
            persist_timeout: Duration::from_secs(args.persist_timeout_secs),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
