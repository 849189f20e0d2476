use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set in production")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub sign_in_url: String,
    pub image_upload_dir: PathBuf,
    pub image_public_base_url: String,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            database_url: None,
            database_max_connections: 5,
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: "eventhub".to_string(),
            sign_in_url: "/api/auth/signin".to_string(),
            image_upload_dir: PathBuf::from("./uploads"),
            image_public_base_url: "http://localhost:3001/uploads".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            cors_allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var("RUST_ENV") {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret = match (var("AUTH_JWT_SECRET"), environment) {
            (Some(secret), _) => secret,
            (None, Environment::Production) => return Err(ConfigError::Missing("AUTH_JWT_SECRET")),
            (None, Environment::Development) => defaults.jwt_secret,
        };

        Ok(Self {
            environment,
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            server_addr: parse_or("SERVER_ADDR", var("SERVER_ADDR"), defaults.server_addr)?,
            jwt_secret,
            jwt_issuer: var("AUTH_JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            sign_in_url: var("AUTH_SIGNIN_URL").unwrap_or(defaults.sign_in_url),
            image_upload_dir: var("IMAGE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.image_upload_dir),
            image_public_base_url: var("IMAGE_PUBLIC_BASE_URL")
                .unwrap_or(defaults.image_public_base_url),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                var("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            )?,
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                var("REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout.as_secs(),
            )?),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or(defaults.cors_allowed_origins),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
