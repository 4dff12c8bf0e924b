use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::core::context::RequestContext;
use crate::core::error::{RateError, Result};
use crate::core::rate::{ExchangeRate, RateProvider};
use crate::providers::circuit_breaker::CircuitBreaker;
use crate::providers::retry::RetryPolicy;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Deserialize, Debug)]
struct LatestResponse {
    base: String,
    date: String,
    rates: BTreeMap<String, Decimal>,
}

#[derive(Deserialize, Debug)]
struct HistoricalResponse {
    base: String,
    rates: BTreeMap<String, BTreeMap<String, Decimal>>,
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| RateError::MalformedResponse(format!("invalid date '{value}': {e}")))
}

fn to_rates(
    base: &str,
    date: NaiveDate,
    rates: BTreeMap<String, Decimal>,
) -> Result<Vec<ExchangeRate>> {
    let base = base.to_ascii_uppercase();
    rates
        .into_iter()
        .map(|(target, rate)| {
            if rate <= Decimal::ZERO {
                return Err(RateError::MalformedResponse(format!(
                    "non-positive rate {rate} for {base}/{target} on {date}"
                )));
            }
            Ok(ExchangeRate::new(
                &base,
                &target.to_ascii_uppercase(),
                rate,
                date,
            ))
        })
        .collect()
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str, uri: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        error!(uri, error = %e, "Failed to parse upstream response");
        RateError::MalformedResponse(format!("failed to parse response from {uri}: {e}"))
    })
}

/// Client for the Frankfurter exchange-rate API.
///
/// Every HTTP attempt passes through the circuit breaker, and the retry
/// policy wraps those attempts, so a single logical request can register
/// up to `1 + max_retries` failures with the breaker.
pub struct FrankfurterProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("xrate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
            breaker: Arc::new(CircuitBreaker::new()),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// One HTTP attempt. Non-2xx statuses become transient errors.
    async fn send(&self, ctx: &RequestContext, uri: &str) -> Result<String> {
        info!(correlation_id = %ctx, uri, "Sending upstream request");
        let started = Instant::now();

        let response = match self.client.get(uri).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = RateError::from(e);
                warn!(
                    correlation_id = %ctx,
                    uri,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Upstream request failed"
                );
                return Err(err);
            }
        };

        let status = response.status();
        info!(
            correlation_id = %ctx,
            uri,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream request completed"
        );

        if !status.is_success() {
            return Err(RateError::UpstreamError {
                status: Some(status.as_u16()),
                message: format!(
                    "{} from {uri}",
                    status.canonical_reason().unwrap_or("unexpected status")
                ),
            });
        }

        Ok(response.text().await?)
    }

    async fn fetch(&self, ctx: &RequestContext, uri: &str) -> Result<String> {
        let breaker = self.breaker.as_ref();
        self.retry
            .run(ctx, move || {
                breaker.call(ctx, move || self.send(ctx, uri))
            })
            .await
    }
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    #[instrument(
        name = "FrankfurterLatest",
        skip(self, ctx),
        fields(correlation_id = %ctx)
    )]
    async fn get_latest(
        &self,
        ctx: &RequestContext,
        base_currency: &str,
    ) -> Result<Vec<ExchangeRate>> {
        let uri = format!("{}/latest?from={}", self.base_url, base_currency);
        let body = self.fetch(ctx, &uri).await?;

        let data: LatestResponse = decode(&body, &uri)?;
        let date = parse_date(&data.date)?;
        let rates = to_rates(&data.base, date, data.rates)?;
        debug!(count = rates.len(), "Parsed latest rates");
        Ok(rates)
    }

    #[instrument(
        name = "FrankfurterHistorical",
        skip(self, ctx),
        fields(correlation_id = %ctx)
    )]
    async fn get_historical(
        &self,
        ctx: &RequestContext,
        base_currency: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExchangeRate>> {
        let uri = format!(
            "{}/{}..{}?from={}",
            self.base_url,
            from.format(DATE_FORMAT),
            to.format(DATE_FORMAT),
            base_currency
        );
        let body = self.fetch(ctx, &uri).await?;

        let data: HistoricalResponse = decode(&body, &uri)?;
        let mut rates = Vec::new();
        for (date, day_rates) in data.rates {
            let date = parse_date(&date)?;
            rates.extend(to_rates(&data.base, date, day_rates)?);
        }
        debug!(count = rates.len(), "Parsed historical rates");
        Ok(rates)
    }
}
