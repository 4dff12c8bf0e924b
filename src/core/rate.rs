//! Exchange rate abstractions and core types

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::context::RequestContext;
use crate::core::error::Result;

/// A single quote of `target_currency` per one unit of `base_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base_currency: &str, target_currency: &str, rate: Decimal, date: NaiveDate) -> Self {
        Self {
            base_currency: base_currency.to_string(),
            target_currency: target_currency.to_string(),
            rate,
            date,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub amount: Decimal,
    pub from_currency: String,
    pub to_currency: String,
}

impl ConversionRequest {
    pub fn new(amount: Decimal, from_currency: &str, to_currency: &str) -> Self {
        Self {
            amount,
            from_currency: from_currency.to_string(),
            to_currency: to_currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub converted_amount: Decimal,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub date: DateTime<Utc>,
}

/// Source of exchange rates. Implementations own their own resilience.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Latest rates for every target quoted against `base_currency`.
    async fn get_latest(&self, ctx: &RequestContext, base_currency: &str)
    -> Result<Vec<ExchangeRate>>;

    /// One rate per (date, target) pair in `from..=to`, ordered by date then target.
    async fn get_historical(
        &self,
        ctx: &RequestContext,
        base_currency: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExchangeRate>>;
}
