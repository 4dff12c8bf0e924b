//! Orchestrates the rate provider and the cache to serve latest rates,
//! paginated historical rates and currency conversions.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::cache::CacheService;
use crate::core::config::AppConfig;
use crate::core::context::RequestContext;
use crate::core::currency::{ExcludedCurrencies, PIVOT_CURRENCY, normalize_code};
use crate::core::error::{RateError, Result};
use crate::core::rate::{ConversionRequest, ConversionResult, ExchangeRate, RateProvider};
use crate::providers::circuit_breaker::CircuitBreaker;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::store::memory::MemoryCache;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const LATEST_TTL: Duration = Duration::from_secs(15 * 60);
const HISTORICAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn latest_cache_key(base: &str) -> String {
    format!("latest_rates_{}", base.to_ascii_uppercase())
}

pub fn historical_cache_key(
    base: &str,
    from: NaiveDate,
    to: NaiveDate,
    page: u32,
    page_size: u32,
) -> String {
    format!(
        "historical_rates_{}_{}_{}_{}_{}",
        base.to_ascii_uppercase(),
        from.format("%Y%m%d"),
        to.format("%Y%m%d"),
        page,
        page_size
    )
}

fn find_rate(rates: &[ExchangeRate], target: &str) -> Option<Decimal> {
    rates
        .iter()
        .find(|r| r.target_currency.eq_ignore_ascii_case(target))
        .map(|r| r.rate)
}

fn conversion_result(
    converted_amount: Decimal,
    from: &str,
    to: &str,
    rate: Decimal,
) -> ConversionResult {
    ConversionResult {
        converted_amount,
        from_currency: from.to_string(),
        to_currency: to.to_string(),
        rate,
        date: Utc::now(),
    }
}

pub struct ConversionEngine {
    provider: Arc<dyn RateProvider>,
    cache: CacheService<Vec<ExchangeRate>>,
    excluded: ExcludedCurrencies,
    latest_ttl: Duration,
    historical_ttl: Duration,
}

impl ConversionEngine {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: CacheService<Vec<ExchangeRate>>,
        excluded: ExcludedCurrencies,
    ) -> Self {
        Self {
            provider,
            cache,
            excluded,
            latest_ttl: LATEST_TTL,
            historical_ttl: HISTORICAL_TTL,
        }
    }

    pub fn with_ttls(mut self, latest: Duration, historical: Duration) -> Self {
        self.latest_ttl = latest;
        self.historical_ttl = historical;
        self
    }

    /// Wires the Frankfurter provider, its resilience policies and an
    /// in-memory cache from configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let breaker = Arc::new(CircuitBreaker::with_config(
            config.resilience.circuit_breaker(),
        ));
        let provider =
            FrankfurterProvider::new(&config.provider.base_url, config.provider.timeout())?
                .with_retry_policy(config.resilience.retry_policy())
                .with_circuit_breaker(breaker);
        let cache = CacheService::new(Arc::new(MemoryCache::<String, Vec<ExchangeRate>>::new()))
            .with_default_ttl(config.cache.default_ttl());

        Ok(Self::new(
            Arc::new(provider),
            cache,
            ExcludedCurrencies::new(&config.excluded_currencies),
        )
        .with_ttls(config.cache.latest_ttl(), config.cache.historical_ttl()))
    }

    pub fn excluded(&self) -> &ExcludedCurrencies {
        &self.excluded
    }

    fn without_excluded(&self, rates: Vec<ExchangeRate>) -> Vec<ExchangeRate> {
        rates
            .into_iter()
            .filter(|r| !self.excluded.contains(&r.target_currency))
            .collect()
    }

    /// Latest rates for `base`, never including excluded targets.
    pub async fn get_latest_rates(&self, base: &str) -> Result<Vec<ExchangeRate>> {
        let ctx = RequestContext::new();
        let base = normalize_code(base)?;
        self.latest_rates(&ctx, &base).await
    }

    async fn latest_rates(&self, ctx: &RequestContext, base: &str) -> Result<Vec<ExchangeRate>> {
        self.excluded.ensure_allowed(base)?;

        let rates = self
            .cache
            .get_or_create(
                &latest_cache_key(base),
                || async {
                    debug!(correlation_id = %ctx, base, "Fetching latest rates");
                    let rates = self.provider.get_latest(ctx, base).await?;
                    Ok(Some(self.without_excluded(rates)))
                },
                Some(self.latest_ttl),
            )
            .await?;
        Ok(rates.unwrap_or_default())
    }

    /// One page of the flattened (date x target) list for `from..=to`.
    ///
    /// Exclusions are applied before paging, and each distinct page is
    /// cached on its own.
    pub async fn get_historical_rates(
        &self,
        base: &str,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ExchangeRate>> {
        let ctx = RequestContext::new();
        let base = normalize_code(base)?;
        if from > to {
            return Err(RateError::InvalidRequest(format!(
                "start date {from} is after end date {to}"
            )));
        }
        if page == 0 {
            return Err(RateError::InvalidRequest("page starts at 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(RateError::InvalidRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        self.excluded.ensure_allowed(&base)?;

        let key = historical_cache_key(&base, from, to, page, page_size);
        let rates = self
            .cache
            .get_or_create(
                &key,
                || async {
                    debug!(correlation_id = %ctx, %base, %from, %to, "Fetching historical rates");
                    let rates = self.provider.get_historical(&ctx, &base, from, to).await?;
                    let skip = (page as usize - 1) * page_size as usize;
                    let page_rates: Vec<ExchangeRate> = self
                        .without_excluded(rates)
                        .into_iter()
                        .skip(skip)
                        .take(page_size as usize)
                        .collect();
                    Ok(Some(page_rates))
                },
                Some(self.historical_ttl),
            )
            .await?;
        Ok(rates.unwrap_or_default())
    }

    /// Converts through a direct quote, or through a single EUR pivot
    /// when no direct quote exists.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let ctx = RequestContext::new();
        if request.amount <= Decimal::ZERO {
            return Err(RateError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        let from = normalize_code(&request.from_currency)?;
        let to = normalize_code(&request.to_currency)?;
        self.excluded.ensure_allowed(&from)?;
        self.excluded.ensure_allowed(&to)?;

        let amount = request.amount;
        let path_not_found = || RateError::ConversionPathNotFound {
            from: from.clone(),
            to: to.clone(),
        };
        let overflow =
            || RateError::InvalidRequest(format!("amount {amount} is out of range for conversion"));

        let rates = self.latest_rates(&ctx, &from).await?;

        if let Some(rate) = find_rate(&rates, &to) {
            debug!(correlation_id = %ctx, %from, %to, %rate, "Converting with direct rate");
            let converted_amount = amount.checked_mul(rate).ok_or_else(overflow)?;
            return Ok(conversion_result(converted_amount, &from, &to, rate));
        }

        if from == to {
            return Ok(conversion_result(amount, &from, &to, Decimal::ONE));
        }

        // The provider quotes everything against EUR, so a missing direct
        // rate from EUR cannot be recovered through a pivot.
        if from == PIVOT_CURRENCY {
            return Err(path_not_found());
        }

        let from_to_eur = find_rate(&rates, PIVOT_CURRENCY).ok_or_else(path_not_found)?;
        let eur_rates = match self.latest_rates(&ctx, PIVOT_CURRENCY).await {
            Ok(rates) => rates,
            Err(RateError::CurrencyExcluded(_)) => return Err(path_not_found()),
            Err(e) => return Err(e),
        };
        let eur_to_target = find_rate(&eur_rates, &to).ok_or_else(path_not_found)?;

        info!(
            correlation_id = %ctx,
            %from,
            %to,
            %from_to_eur,
            %eur_to_target,
            "Converting through EUR pivot"
        );
        let converted_amount = amount
            .checked_div(from_to_eur)
            .and_then(|eur| eur.checked_mul(eur_to_target))
            .ok_or_else(overflow)?;
        let rate = eur_to_target
            .checked_div(from_to_eur)
            .ok_or_else(path_not_found)?;
        Ok(conversion_result(converted_amount, &from, &to, rate))
    }
}
