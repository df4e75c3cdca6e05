/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `JWT_SECRET`: Secret key for session tokens (required, 32+ chars)
/// - `SESSION_TTL_HOURS`: session lifetime (default: 24)
/// - `UPLOAD_DIR`: where attachments are stored (default: ./uploads)
/// - `MAX_UPLOAD_BYTES`: request body cap for uploads (default: 10 MiB)
/// - `DEFAULT_ROLE`: role name given to new signups (optional)
/// - `CORS_ORIGINS`: comma-separated origins, or `*` (default: *)
/// - `PRODUCTION`: enables HSTS and `Secure` cookies (default: false)
/// - `RUST_LOG`: Log level (default: tasktrack_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use tasktrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Longest accepted session lifetime: one year
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Session token configuration
    pub jwt: JwtConfig,

    /// Attachment storage
    pub uploads: UploadConfig,

    /// Role assigned to new signups, by name
    pub default_role: Option<String>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, `Secure` cookies)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for HS256 signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    /// Session lifetime in hours
    pub session_ttl_hours: i64,
}

/// Attachment storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,

    /// Largest accepted request body on upload routes
    pub max_bytes: usize,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = parse_or(&lookup, "API_PORT", 8080u16)?;
        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|| vec!["*".to_string()]);
        let production = parse_or(&lookup, "PRODUCTION", false)?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let session_ttl_hours = parse_or(&lookup, "SESSION_TTL_HOURS", 24i64)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            anyhow::bail!(
                "SESSION_TTL_HOURS must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            );
        }

        let upload_dir = lookup("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string());
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let default_role = lookup("DEFAULT_ROLE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                session_ttl_hours,
            },
            uploads: UploadConfig {
                dir: PathBuf::from(upload_dir),
                max_bytes: max_upload_bytes,
            },
            default_role,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Session lifetime as a chrono duration
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt.session_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.session_ttl_hours, 24);
        assert_eq!(config.uploads.dir, PathBuf::from("./uploads"));
        assert_eq!(config.uploads.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert!(config.default_role.is_none());
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PRODUCTION", "true"),
            ("DEFAULT_ROLE", "Member"),
            ("SESSION_TTL_HOURS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.api.production);
        assert_eq!(config.default_role.as_deref(), Some("Member"));
        assert_eq!(config.jwt.session_ttl_hours, 2);
    }

    #[test]
    fn test_missing_required_vars() {
        assert!(Config::from_lookup(lookup_from(&[("JWT_SECRET", SECRET)])).is_err());
        assert!(Config::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgresql://localhost/test"
        )]))
        .is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", "too-short"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("API_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }

    #[test]
    fn test_session_ttl_bounds() {
        for raw in ["0", "-5", "8761", "10000000000"] {
            let err = Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgresql://localhost/test"),
                ("JWT_SECRET", SECRET),
                ("SESSION_TTL_HOURS", raw),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_HOURS"), "{}", raw);
        }

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("SESSION_TTL_HOURS", "8760"),
        ]))
        .unwrap();
        assert_eq!(config.session_ttl(), chrono::Duration::hours(MAX_SESSION_TTL_HOURS));
    }

    #[test]
    fn test_blank_origins_fall_back_to_any() {
        assert_eq!(parse_origins(" , "), vec!["*"]);
    }
}
