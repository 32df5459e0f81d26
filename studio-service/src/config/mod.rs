//! Configuration module for studio-service.

use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub balance: BalanceConfig,
    pub exchange_rate: ExchangeRateConfig,
    pub sms: SmsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct BalanceConfig {
    /// Days without a paid payment before an open balance counts as overdue.
    pub overdue_after_days: i64,
    /// Currency client-level balances and dashboard figures are reported in.
    pub reporting_currency: String,
}

#[derive(Debug, Clone)]
pub struct ExchangeRateConfig {
    pub api_url: String,
    pub base_currency: String,
    pub quote_currency: String,
    /// Used whenever the API cannot be reached or returns garbage.
    pub fallback_rate: Decimal,
    pub cache_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub enabled: bool,
    pub api_url: String,
    pub auth_key: Secret<String>,
    pub sender_id: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_fallback_rate(raw: &str) -> Result<Decimal, AppError> {
    let rate = Decimal::from_str(raw.trim()).map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "EXCHANGE_RATE_FALLBACK is not a decimal: {}",
            e
        ))
    })?;
    if rate <= Decimal::ZERO {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "EXCHANGE_RATE_FALLBACK must be greater than zero, got {}",
            rate
        )));
    }
    Ok(rate)
}

impl StudioConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let fallback_rate =
            parse_fallback_rate(&env_or("EXCHANGE_RATE_FALLBACK", "520.00"))?;

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "studio-service"),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            balance: BalanceConfig {
                overdue_after_days: env_parse("OVERDUE_AFTER_DAYS", 30),
                reporting_currency: env_or("REPORTING_CURRENCY", "USD"),
            },
            exchange_rate: ExchangeRateConfig {
                api_url: env_or("EXCHANGE_RATE_API_URL", "https://open.er-api.com/v6/latest"),
                base_currency: env_or("EXCHANGE_RATE_BASE", "USD"),
                quote_currency: env_or("EXCHANGE_RATE_QUOTE", "CRC"),
                fallback_rate,
                cache_seconds: env_parse("EXCHANGE_RATE_CACHE_SECONDS", 3600),
            },
            sms: SmsConfig {
                enabled: env_parse("SMS_ENABLED", false),
                api_url: env_or("SMS_API_URL", "https://api.msg91.com/api/v5/flow/"),
                auth_key: Secret::new(env_or("SMS_AUTH_KEY", "")),
                sender_id: env_or("SMS_SENDER_ID", "STUDIO"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rate_must_be_positive() {
        assert_eq!(parse_fallback_rate("520.00").unwrap(), Decimal::new(520, 0));
        assert!(matches!(
            parse_fallback_rate("0"),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            parse_fallback_rate("-3"),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            parse_fallback_rate("abc"),
            Err(AppError::ConfigError(_))
        ));
    }
}
