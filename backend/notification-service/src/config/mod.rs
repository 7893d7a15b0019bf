use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub push: PushConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Web-push gateway base URL; push is disabled when unset
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    /// Application server public key handed to browsers when they subscribe
    pub vapid_public_key: String,
    pub ttl_secs: u32,
    pub send_timeout_ms: u64,
}

impl PushConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Empty host runs the email channel in no-op mode
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: parse_var("APP_PORT", 8000)?,
            },
            push: PushConfig {
                gateway_url: optional_var("PUSH_GATEWAY_URL"),
                api_key: optional_var("PUSH_API_KEY"),
                vapid_public_key: std::env::var("PUSH_VAPID_PUBLIC_KEY").unwrap_or_default(),
                ttl_secs: parse_var("PUSH_TTL_SECS", 86_400)?,
                send_timeout_ms: parse_var("PUSH_SEND_TIMEOUT_MS", 10_000)?,
            },
            smtp: SmtpConfig {
                host: std::env::var("SMTP_HOST").unwrap_or_default(),
                port: parse_var("SMTP_PORT", 587)?,
                username: optional_var("SMTP_USERNAME"),
                password: optional_var("SMTP_PASSWORD"),
                from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Classes <noreply@localhost>".to_string()),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_and_error() {
        assert_eq!(parse_var::<u16>("NOTIFY_TEST_UNSET_PORT", 8000).unwrap(), 8000);

        std::env::set_var("NOTIFY_TEST_BAD_PORT", "eighty");
        let err = parse_var::<u16>("NOTIFY_TEST_BAD_PORT", 8000).unwrap_err();
        assert!(err.to_string().contains("NOTIFY_TEST_BAD_PORT"));
    }

    #[test]
    fn test_optional_var_ignores_blank() {
        std::env::set_var("NOTIFY_TEST_BLANK", "  ");
        assert!(optional_var("NOTIFY_TEST_BLANK").is_none());
    }
}
