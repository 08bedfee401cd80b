//! Market data gateway abstraction.
//!
//! Defines the async boundary between the pipeline and exchange REST
//! endpoints. The scanner depends only on the `MarketDataGateway` trait;
//! concrete transports live behind it and are injected at startup.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use client::{BoxFuture, DynGateway, MarketDataGateway, StaticGateway};
pub use error::{GatewayError, Result};
pub use rate_limit::RequestLimiter;
pub use retry::{with_retry, RetryPolicy};
