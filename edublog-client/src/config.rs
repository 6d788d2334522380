use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::retry::RetryPolicy;

/// Адрес бэкенда по умолчанию.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
/// Заголовок с токеном доступа по умолчанию.
pub const DEFAULT_TOKEN_HEADER: &str = "x-access-token";
/// Файл с токеном по умолчанию.
pub const DEFAULT_TOKEN_FILE: &str = ".edublog_token";

#[derive(Debug, Clone)]
/// Настройки клиента.
pub struct ClientConfig {
    /// Базовый URL бэкенда.
    pub base_url: String,
    /// Таймаут запроса целиком.
    pub request_timeout: Duration,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Имя заголовка, в котором передаётся токен.
    pub token_header: String,
    /// Размер страницы для списков.
    pub page_size: u32,
    /// Повторы для читающих запросов.
    pub retry: RetryPolicy,
    /// Путь к файлу с токеном.
    pub token_file: String,
    /// Уровень логирования по умолчанию.
    pub log_level: String,
}

impl ClientConfig {
    /// Настройки по умолчанию для заданного адреса.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            page_size: 10,
            retry: RetryPolicy::default(),
            token_file: DEFAULT_TOKEN_FILE.to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Читает настройки из переменных окружения.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Читает настройки через произвольный источник значений.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::new(DEFAULT_API_URL);

        let base_url = normalize_base_url(
            lookup("EDUBLOG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;
        let request_timeout = Duration::from_secs(parse_positive(
            "EDUBLOG_TIMEOUT_SECS",
            lookup("EDUBLOG_TIMEOUT_SECS"),
            defaults.request_timeout.as_secs(),
        )?);
        let connect_timeout = Duration::from_secs(parse_positive(
            "EDUBLOG_CONNECT_TIMEOUT_SECS",
            lookup("EDUBLOG_CONNECT_TIMEOUT_SECS"),
            defaults.connect_timeout.as_secs(),
        )?);
        let token_header = lookup("EDUBLOG_TOKEN_HEADER")
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.token_header);
        let page_size = u32::try_from(parse_positive(
            "EDUBLOG_PAGE_SIZE",
            lookup("EDUBLOG_PAGE_SIZE"),
            u64::from(defaults.page_size),
        )?)
        .context("EDUBLOG_PAGE_SIZE is too large")?;

        let max_attempts = u32::try_from(parse_positive(
            "EDUBLOG_RETRY_MAX_ATTEMPTS",
            lookup("EDUBLOG_RETRY_MAX_ATTEMPTS"),
            u64::from(defaults.retry.max_attempts),
        )?)
        .context("EDUBLOG_RETRY_MAX_ATTEMPTS is too large")?;
        let initial_delay = Duration::from_millis(parse_positive(
            "EDUBLOG_RETRY_INITIAL_DELAY_MS",
            lookup("EDUBLOG_RETRY_INITIAL_DELAY_MS"),
            defaults.retry.initial_delay.as_millis() as u64,
        )?);
        let backoff_multiplier = match lookup("EDUBLOG_RETRY_BACKOFF") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .context("Failed to parse EDUBLOG_RETRY_BACKOFF, expecting number")?,
            None => defaults.retry.backoff_multiplier,
        };
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(anyhow!("EDUBLOG_RETRY_BACKOFF must be >= 1"));
        }

        let token_file = lookup("EDUBLOG_TOKEN_FILE")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.token_file);
        let log_level = lookup("LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or(defaults.log_level);

        Ok(Self {
            base_url,
            request_timeout,
            connect_timeout,
            token_header,
            page_size,
            retry: RetryPolicy {
                max_attempts,
                initial_delay,
                backoff_multiplier,
                max_delay: defaults.retry.max_delay,
            },
            token_file,
            log_level,
        })
    }
}

/// Добавляет схему `http://`, если её нет, и убирает завершающий `/`.
pub fn normalize_base_url(raw: String) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("EDUBLOG_API_URL must not be empty"));
    }
    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_positive(key: &str, raw: Option<String>, default: u64) -> Result<u64> {
    let value = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?,
        None => default,
    };

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).expect("defaults must be valid");
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.token_header, DEFAULT_TOKEN_HEADER);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("EDUBLOG_API_URL", "api.escola.br/"),
            ("EDUBLOG_TOKEN_HEADER", "X-Token"),
            ("EDUBLOG_PAGE_SIZE", "25"),
            ("EDUBLOG_RETRY_MAX_ATTEMPTS", "5"),
            ("EDUBLOG_RETRY_INITIAL_DELAY_MS", "100"),
            ("EDUBLOG_RETRY_BACKOFF", "1.5"),
            ("LOG_LEVEL", "debug"),
        ]))
        .expect("config must parse");

        assert_eq!(config.base_url, "http://api.escola.br");
        assert_eq!(config.token_header, "x-token");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.retry.backoff_multiplier, 1.5);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn zero_and_garbage_values_are_rejected() {
        assert!(ClientConfig::from_lookup(lookup(&[("EDUBLOG_PAGE_SIZE", "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("EDUBLOG_TIMEOUT_SECS", "abc")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("EDUBLOG_RETRY_BACKOFF", "0.5")])).is_err());
    }

    #[test]
    fn normalize_base_url_keeps_scheme() {
        let url = normalize_base_url("https://example.com:8080/".to_string()).expect("valid");
        assert_eq!(url, "https://example.com:8080");
        assert!(normalize_base_url("  ".to_string()).is_err());
    }
}
