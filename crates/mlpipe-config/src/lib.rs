//! mlpipe Config
//!
//! This crate contains the serializable engine configuration types for mlpipe.
//! These types carry the policy-defined defaults that the engine applies when a
//! node leaves part of its own configuration unset.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--config=engine.json`)
//! - Inline JSON strings (tests, embedding applications)
//!
//! Every field has a default, so `{}` is a valid configuration.

mod engine;
mod retry;
mod workers;

pub use engine::{ConfigError, EngineConfig, EventsConfig};
pub use retry::RetryConfig;
pub use workers::WorkerConfig;
