use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Redis (ephemeral counters, yield rings). Empty = in-memory fallbacks only.
    pub redis_url: String,

    // App
    pub app_env: String,
    pub cors_origins: Vec<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Headless rendering service
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    // SLOs (seconds)
    pub slo_fast_path_s: u64,
    pub slo_render_path_s: u64,
    pub slo_deep_path_s: u64,

    // Quarantine TTL (seconds)
    pub quarantine_ttl_s: u64,

    // Alert cooldown (seconds)
    pub alert_cooldown_s: u64,
}

impl Config {
    /// Load config for the ingest worker process.
    /// Panics with a clear message if required vars are missing.
    pub fn ingest_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: env::var("REDIS_URL").unwrap_or_default(),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            cors_origins: Vec::new(),
            web_host: String::new(),
            web_port: 0,
            browserless_url: env::var("BROWSERLESS_URL").unwrap_or_default(),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            slo_fast_path_s: env_u64("SLO_FAST_PATH_S", 60),
            slo_render_path_s: env_u64("SLO_RENDER_PATH_S", 120),
            slo_deep_path_s: env_u64("SLO_DEEP_PATH_S", 300),
            quarantine_ttl_s: env_u64("QUARANTINE_TTL_S", 900),
            alert_cooldown_s: env_u64("ALERT_COOLDOWN_S", 300),
        }
    }

    /// Load config for the web/API server.
    pub fn web_from_env() -> Self {
        let cors_origins: Vec<String> = env::var("APP_CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: env::var("REDIS_URL").unwrap_or_default(),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            cors_origins,
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            browserless_url: String::new(),
            browserless_token: None,
            slo_fast_path_s: env_u64("SLO_FAST_PATH_S", 60),
            slo_render_path_s: env_u64("SLO_RENDER_PATH_S", 120),
            slo_deep_path_s: env_u64("SLO_DEEP_PATH_S", 300),
            quarantine_ttl_s: env_u64("QUARANTINE_TTL_S", 900),
            alert_cooldown_s: env_u64("ALERT_COOLDOWN_S", 300),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
