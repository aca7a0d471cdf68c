use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub access: AccessConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let backend = match env::var("APP_STORAGE") {
            Ok(raw) => StorageBackend::parse(&raw).ok_or(ConfigError::InvalidStorage(raw))?,
            Err(_) => StorageBackend::Memory,
        };
        let data_dir = env::var("APP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let amenity_access = match env::var("APP_AMENITY_POLICY") {
            Ok(raw) => {
                AmenityAccess::parse(&raw).ok_or(ConfigError::InvalidAmenityPolicy(raw))?
            }
            Err(_) => AmenityAccess::AdminOnly,
        };
        let default_admin = flag("APP_DEFAULT_ADMIN", false)?;
        let open_registration = flag("APP_OPEN_REGISTRATION", false)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { backend, data_dir },
            access: AccessConfig {
                amenity_access,
                default_admin,
                open_registration,
            },
        })
    }
}

fn flag(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(var) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { var }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Which repository implementation backs the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    JsonFiles,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Some(Self::Memory),
            "json" | "file" | "files" => Some(Self::JsonFiles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Who may create or update amenities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmenityAccess {
    AdminOnly,
    AnyAuthenticated,
}

impl AmenityAccess {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "admin-only" => Some(Self::AdminOnly),
            "open" | "authenticated" => Some(Self::AnyAuthenticated),
            _ => None,
        }
    }
}

/// Authorization dials that differ between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConfig {
    pub amenity_access: AmenityAccess,
    /// Admin flag given to new users when the creator does not choose one.
    pub default_admin: bool,
    /// Allow anyone to register, not only the first user.
    pub open_registration: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            amenity_access: AmenityAccess::AdminOnly,
            default_admin: false,
            open_registration: false,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStorage(String),
    InvalidAmenityPolicy(String),
    InvalidFlag { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStorage(value) => {
                write!(f, "APP_STORAGE must be 'memory' or 'json', found '{value}'")
            }
            ConfigError::InvalidAmenityPolicy(value) => write!(
                f,
                "APP_AMENITY_POLICY must be 'admin' or 'open', found '{value}'"
            ),
            ConfigError::InvalidFlag { var } => write!(f, "{var} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidStorage(_)
            | ConfigError::InvalidAmenityPolicy(_)
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
