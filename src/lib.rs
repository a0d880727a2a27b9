//! # Octofr - Octopus Energy France metering and billing poller
//!
//! Polls the French Octopus (Kraken) GraphQL API for electricity and gas
//! readings, meter index, ledgers and payment requests, and projects them
//! into sensor values such as monthly consumption, monthly cost, balances
//! and an off-peak indicator.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration, defaults and validation
//! - `logging`: structured logging and tracing
//! - `kraken`: GraphQL API client behind the `EnergyApi` trait
//! - `coordinator`: periodic refresh cycle and snapshot publication
//! - `snapshot`: typed result of one refresh cycle
//! - `offpeak`: off-peak label parsing
//! - `aggregate`: monthly aggregation and tariff detection
//! - `sensors`: sensor discovery, values and attributes

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod kraken;
pub mod logging;
pub mod offpeak;
pub mod sensors;
pub mod snapshot;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::RefreshCoordinator;
pub use error::{OctoError, Result};
pub use snapshot::Snapshot;
