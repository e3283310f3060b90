use std::path::Path;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the client IP from `X-Forwarded-For`/`X-Real-IP` (only behind a reverse proxy).
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Number of most-recent comments embedded in a post representation.
    pub recent_comments: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub staff_usernames: Vec<String>,
}

impl AdminConfig {
    pub fn is_staff(&self, username: &str) -> bool {
        self.staff_usernames.iter().any(|u| u == username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
    pub registrations_per_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    pub rate_limit: RateLimitConfig,
    pub limits: LimitsConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match from_toml("") {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("FATAL: Failed to load default config: {}", e);
                panic!("Failed to load default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: plaza.toml (in CWD)
        .add_source(::config::File::with_name("plaza").required(false));

    if let Ok(custom_path) = std::env::var("PLAZA_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("PLAZA")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("admin.staff_usernames"),
    );

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Layers a TOML document over the embedded defaults and validates the result.
pub fn from_toml(overlay: &str) -> anyhow::Result<AppConfig> {
    let app_cfg: AppConfig = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(overlay, ::config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Pagination
    if cfg.pagination.page_size == 0 {
        return Err(anyhow::anyhow!("pagination.page_size must be > 0"));
    }
    if cfg.pagination.max_page_size == 0 {
        return Err(anyhow::anyhow!("pagination.max_page_size must be > 0"));
    }
    if cfg.pagination.page_size > cfg.pagination.max_page_size {
        return Err(anyhow::anyhow!("pagination.page_size must be <= max_page_size"));
    }

    if cfg.feed.recent_comments == 0 || cfg.feed.recent_comments > 50 {
        return Err(anyhow::anyhow!("feed.recent_comments must be in 1..=50"));
    }

    // Rate limiting
    if cfg.rate_limit.max_requests == 0 || cfg.rate_limit.registrations_per_window == 0 {
        return Err(anyhow::anyhow!("rate_limit request counts must be > 0"));
    }
    if cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.window_seconds must be > 0"));
    }

    if cfg.limits.max_body_bytes < 1024 {
        return Err(anyhow::anyhow!("limits.max_body_bytes must be at least 1024"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(!config.server.trust_proxy_headers);
        assert_eq!(config.database.url, "sqlite://data/plaza.db");
        assert_eq!(config.pagination.page_size, 10);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.feed.recent_comments, 3);
        assert!(config.admin.staff_usernames.is_empty());
        assert!(config.security.is_some());
    }

    #[test]
    fn test_overlay_overrides_defaults() {
        let config = from_toml(
            r#"
            [server]
            port = 3000

            [pagination]
            page_size = 25

            [admin]
            staff_usernames = ["root", "moderator"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.pagination.page_size, 25);
        assert!(config.admin.is_staff("moderator"));
        assert!(!config.admin.is_staff("alice"));
    }

    #[test]
    fn test_invalid_server_port() {
        let err = from_toml("[server]\nport = 0").unwrap_err();
        assert!(err.to_string().contains("invalid server.port"));
    }

    #[test]
    fn test_page_size_above_max_rejected() {
        let err = from_toml("[pagination]\npage_size = 200\nmax_page_size = 100").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_zero_recent_comments_rejected() {
        assert!(from_toml("[feed]\nrecent_comments = 0").is_err());
    }

    #[test]
    fn test_tiny_body_limit_rejected() {
        assert!(from_toml("[limits]\nmax_body_bytes = 10").is_err());
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("plaza.db");
        let url = format!("sqlite://{}", db_path.display());

        ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());

        // Non-file URLs are ignored
        assert!(ensure_sqlite_parent_dir("sqlite::memory:").is_ok());
    }
}
