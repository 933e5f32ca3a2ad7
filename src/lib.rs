//! # Pair Rotator
//!
//! A Rust service that rotates capital between pairs of volatile assets
//! traded against a common stable asset on Binance spot.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Binance spot API client and the exchange gateway trait
//! - `engine`: Ratio triggers, position sizing, and two-leg rotation execution
//! - `persistence`: SQLite-based pair state store
//! - `report`: Cycle snapshot sinks (JSON file, log panel)

pub mod config;
pub mod engine;
pub mod exchange;
pub mod persistence;
pub mod report;

pub use config::Config;
