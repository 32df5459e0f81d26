//! Exchange rate lookups for the configured currency pair.
//!
//! The live rate is cached for `cache_seconds`. When the API is unreachable
//! or answers with something unusable, the configured fallback rate is used
//! and cached briefly so the API is retried soon.

use crate::config::ExchangeRateConfig;
use crate::services::metrics::record_exchange_rate_lookup;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_RETRY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Cached,
    Fallback,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Live => "live",
            RateSource::Cached => "cached",
            RateSource::Fallback => "fallback",
        }
    }
}

/// Units of `quote` per one unit of `base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub source: RateSource,
    pub fetched_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedRate {
    rate: Decimal,
    fetched_utc: DateTime<Utc>,
    expires_at: Instant,
    is_fallback: bool,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

pub struct ExchangeRateService {
    client: reqwest::Client,
    config: ExchangeRateConfig,
    cache: RwLock<Option<CachedRate>>,
    refresh: Mutex<()>,
}

impl ExchangeRateService {
    pub fn new(config: ExchangeRateConfig) -> Self {
        let config = ExchangeRateConfig {
            base_currency: config.base_currency.to_uppercase(),
            quote_currency: config.quote_currency.to_uppercase(),
            ..config
        };
        Self {
            client: reqwest::Client::new(),
            config,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Current rate for the configured pair. Never fails; falls back to the
    /// configured rate.
    ///
    /// One caller refreshes an expired rate at a time. While it does, other
    /// callers get the expired entry instead of waiting on the API.
    #[instrument(skip(self), fields(base = %self.config.base_currency, quote = %self.config.quote_currency))]
    pub async fn current_rate(&self) -> ExchangeRate {
        if let Some(cached) = self.cached().await {
            return self.serve(&cached);
        }

        let _refresh = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(stale) = self.cache.read().await.as_ref() {
                    debug!("Rate refresh in flight, serving expired entry");
                    return self.serve(stale);
                }
                self.refresh.lock().await
            }
        };
        // Another request may have refreshed it while we waited.
        if let Some(cached) = self.cached().await {
            return self.serve(&cached);
        }

        let (entry, source) = match self.fetch().await {
            Ok(rate) => {
                debug!(rate = %rate, "Fetched exchange rate");
                (
                    CachedRate {
                        rate,
                        fetched_utc: Utc::now(),
                        expires_at: Instant::now() + Duration::from_secs(self.config.cache_seconds),
                        is_fallback: false,
                    },
                    RateSource::Live,
                )
            }
            Err(e) => {
                warn!(error = %e, fallback = %self.config.fallback_rate, "Exchange rate API unavailable, using fallback");
                (
                    CachedRate {
                        rate: self.config.fallback_rate,
                        fetched_utc: Utc::now(),
                        expires_at: Instant::now()
                            + FALLBACK_RETRY.min(Duration::from_secs(self.config.cache_seconds)),
                        is_fallback: true,
                    },
                    RateSource::Fallback,
                )
            }
        };

        record_exchange_rate_lookup(source.as_str());
        let rate = self.to_rate(&entry, source);
        *self.cache.write().await = Some(entry);
        rate
    }

    /// Convert between the configured currencies. Same-currency conversion
    /// is the identity and does not touch the API.
    pub async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal, AppError> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Ok(amount);
        }
        if !self.supports(&from) || !self.supports(&to) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot convert {} to {}; supported currencies are {} and {}",
                from,
                to,
                self.config.base_currency,
                self.config.quote_currency
            )));
        }

        let rate = self.current_rate().await;
        convert_with_rate(amount, &from, &to, &rate).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Cannot convert {} to {}", from, to))
        })
    }

    pub fn supports(&self, currency: &str) -> bool {
        let currency = currency.to_uppercase();
        currency == self.config.base_currency || currency == self.config.quote_currency
    }

    async fn cached(&self) -> Option<CachedRate> {
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|c| c.expires_at > Instant::now())
            .cloned()
    }

    fn serve(&self, cached: &CachedRate) -> ExchangeRate {
        let source = if cached.is_fallback {
            RateSource::Fallback
        } else {
            RateSource::Cached
        };
        record_exchange_rate_lookup(source.as_str());
        self.to_rate(cached, source)
    }

    fn to_rate(&self, cached: &CachedRate, source: RateSource) -> ExchangeRate {
        ExchangeRate {
            base: self.config.base_currency.clone(),
            quote: self.config.quote_currency.clone(),
            rate: cached.rate,
            source,
            fetched_utc: cached.fetched_utc,
        }
    }

    async fn fetch(&self) -> anyhow::Result<Decimal> {
        let url = format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.base_currency
        );

        let response = self
            .client
            .traced_get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("exchange rate API returned {}", response.status());
        }

        let body: RatesResponse = response.json().await?;
        if let Some(result) = body.result.as_deref().filter(|r| *r != "success") {
            anyhow::bail!("exchange rate API reported {}", result);
        }

        match body.rates.get(&self.config.quote_currency) {
            Some(rate) if *rate > Decimal::ZERO => Ok(*rate),
            Some(rate) => anyhow::bail!("exchange rate API returned non-positive rate {}", rate),
            None => anyhow::bail!(
                "exchange rate API has no rate for {}",
                self.config.quote_currency
            ),
        }
    }
}

/// Convert using a known rate, rounded to cents. `None` when the pair does
/// not match the rate.
pub fn convert_with_rate(amount: Decimal, from: &str, to: &str, rate: &ExchangeRate) -> Option<Decimal> {
    if from == to {
        return Some(amount);
    }
    if from == rate.base && to == rate.quote {
        return Some((amount * rate.rate).round_dp(2));
    }
    if from == rate.quote && to == rate.base && !rate.rate.is_zero() {
        return Some((amount / rate.rate).round_dp(2));
    }
    None
}
