//! Currency code handling and the exclusion policy

use std::collections::HashSet;

use crate::core::error::{RateError, Result};

/// Currency the upstream provider quotes everything against.
pub const PIVOT_CURRENCY: &str = "EUR";

pub const DEFAULT_EXCLUDED_CURRENCIES: [&str; 4] = ["TRY", "PLN", "THB", "MXN"];

/// Validates a three-letter ISO code and returns it upper-cased.
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RateError::InvalidRequest(format!(
            "'{code}' is not a three-letter currency code"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Read-only set of currencies the service refuses to quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedCurrencies {
    codes: HashSet<String>,
}

impl ExcludedCurrencies {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&code.trim().to_ascii_uppercase())
    }

    /// Fails with `CurrencyExcluded` when `code` is on the list.
    pub fn ensure_allowed(&self, code: &str) -> Result<()> {
        if self.contains(code) {
            return Err(RateError::CurrencyExcluded(code.to_ascii_uppercase()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for ExcludedCurrencies {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_CURRENCIES)
    }
}
