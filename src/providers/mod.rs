pub mod circuit_breaker;
pub mod frankfurter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use frankfurter::FrankfurterProvider;
pub use retry::RetryPolicy;
