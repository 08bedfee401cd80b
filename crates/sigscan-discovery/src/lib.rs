//! Instrument discovery and filtering.
//!
//! Enumerates tradable instruments through the gateway, applies the
//! ordered filter gates, and tracks first-seen timestamps so newly
//! listed pairs surface as a separate subset. A fetch error for one
//! instrument never excludes the rest of the universe.

pub mod engine;
pub mod filter;
pub mod registry;

pub use engine::{Candidate, DiscoveryConfig, DiscoveryEngine, DiscoveryOutcome};
pub use filter::{FilterConfig, FilterReject, InstrumentFilter};
pub use registry::ListingRegistry;
