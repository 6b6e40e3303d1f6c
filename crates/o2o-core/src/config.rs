//! Operator knobs, loaded once at startup: defaults baked in, overridable
//! via environment variables, invalid values logged and defaulted rather
//! than panicking.

use std::env;
use std::time::Duration;

use crate::domain::access::AccessMode;

/// One of the three independent sliding-window rate limiters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    fn from_env(prefix: &str, default_max: u32, default_window_ms: u64) -> Self {
        Self {
            enabled: env_bool(&format!("RATE_LIMIT_{prefix}_ENABLED"), true),
            max_requests: env_parse(&format!("RATE_LIMIT_{prefix}_MAX"), default_max),
            window_ms: env_parse(&format!("RATE_LIMIT_{prefix}_WINDOW"), default_window_ms),
        }
    }
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub api_token: Option<String>,
    pub admin_password: Option<String>,
    pub ollama_base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub health_check_interval: Option<Duration>,
    pub rate_limit_global: RateLimitConfig,
    pub rate_limit_ip: RateLimitConfig,
    pub rate_limit_token: RateLimitConfig,
    pub ip_access_mode: AccessMode,
    pub ip_whitelist: Vec<String>,
    pub ip_blacklist: Vec<String>,
    pub log_level: String,
    pub trust_proxy: bool,
}

impl GatewayConfig {
    /// Load configuration from the process environment, applying the
    /// documented defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 8080),
            api_token: env::var("API_TOKEN").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "https://ollama.com/api".to_string()),
            connect_timeout: Duration::from_millis(env_parse("CONNECT_TIMEOUT", 30_000)),
            request_timeout: Duration::from_millis(env_parse("REQUEST_TIMEOUT", 300_000)),
            max_retries: env_parse("MAX_RETRIES", 2),
            health_check_interval: {
                let secs: u64 = env_parse("HEALTH_CHECK_INTERVAL", 60);
                if secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(secs))
                }
            },
            rate_limit_global: RateLimitConfig::from_env("GLOBAL", 1000, 60_000),
            rate_limit_ip: RateLimitConfig::from_env("IP", 100, 60_000),
            rate_limit_token: RateLimitConfig::from_env("TOKEN", 200, 60_000),
            ip_access_mode: match env::var("IP_ACCESS_MODE").as_deref() {
                Ok("whitelist") => AccessMode::Whitelist,
                Ok("blacklist") => AccessMode::Blacklist,
                _ => AccessMode::Disabled,
            },
            ip_whitelist: env_csv("IP_WHITELIST"),
            ip_blacklist: env_csv("IP_BLACKLIST"),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            trust_proxy: env_bool("TRUST_PROXY", false),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "invalid env value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key, raw, "invalid boolean env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_csv(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
