//! Core domain types, caching and the conversion engine

pub mod cache;
pub mod config;
pub mod context;
pub mod currency;
pub mod engine;
pub mod error;
pub mod log;
pub mod rate;

// Re-export main types for cleaner imports
pub use context::RequestContext;
pub use engine::ConversionEngine;
pub use error::RateError;
pub use rate::{ConversionRequest, ConversionResult, ExchangeRate, RateProvider};
