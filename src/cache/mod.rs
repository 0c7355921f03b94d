//! The cache core: freshness tracking, request coalescing, background
//! refresh, and the periodic cleaner.
//!
//! See [`Cache`] for the entry point and [`CacheBuilder`] for
//! configuration.

mod call;
mod cleaner;
mod config;
mod core;
mod entry;
mod stats;

pub use config::{CacheBuilder, ConfigError};
pub use stats::Stats;

pub use self::core::Cache;
