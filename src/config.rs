use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub admin_email: String,
    /// Hex-encoded SHA-256 digest of the admin password.
    pub admin_password_sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Exact origins. The first entry doubles as the fallback origin sent to
    /// callers that are not permitted.
    pub allowed_origins: Vec<String>,
    /// Hosting domain whose preview deployments are trusted by substring.
    pub trusted_domain: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowConfig {
    pub window_seconds: u64,
    pub max_requests: u32,
}

impl WindowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        // 5 attempts per 15 minutes
        Self { window_seconds: 15 * 60, max_requests: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub sweep_interval_seconds: u64,
    #[serde(default)]
    pub login: WindowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
}

/// Longest accepted token lifetime (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => panic!("Failed to load embedded default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: clownlist.toml (in CWD)
        .add_source(::config::File::with_name("clownlist").required(false));

    if let Ok(custom_path) = std::env::var("CLOWNLIST_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("CLOWNLIST")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors.allowed_origins"),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }

    if cfg.auth.jwt_secret.trim().is_empty() {
        return Err(anyhow::anyhow!("auth.jwt_secret must not be empty"));
    }
    if cfg.auth.jwt_secret == "change-me-in-production" {
        tracing::warn!("Using the built-in JWT secret - set CLOWNLIST__AUTH__JWT_SECRET");
    }
    if cfg.auth.token_ttl_hours <= 0 || cfg.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
        return Err(anyhow::anyhow!(
            "auth.token_ttl_hours must be between 1 and {}",
            MAX_TOKEN_TTL_HOURS
        ));
    }
    if hex::decode(&cfg.auth.admin_password_sha256).map(|d| d.len()).unwrap_or(0) != 32 {
        return Err(anyhow::anyhow!("auth.admin_password_sha256 must be a 64-digit hex SHA-256 digest"));
    }

    if cfg.cors.allowed_origins.is_empty() {
        return Err(anyhow::anyhow!("cors.allowed_origins must contain at least one origin"));
    }

    let login = &cfg.rate_limit.login;
    if login.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.login.window_seconds must be > 0"));
    }
    if login.max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit.login.max_requests must be > 0"));
    }

    Ok(())
}
