//! Scan-cycle orchestration for the sigscan pipeline.
//!
//! Wires together discovery, snapshot fetching, the four analyzers,
//! manipulation gating, ML scoring and signal composition into a
//! fixed-interval scan loop with bounded fan-out.

pub mod app;
pub mod config;
pub mod error;
pub mod replay;
pub mod sink;
pub mod snapshot;

pub use app::{Application, CycleOutcome, CycleReport};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use sink::{LogSink, MemoryOutcomeStore, MemorySink, OutcomeStore, SignalSink};
