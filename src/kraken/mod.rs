//! Kraken GraphQL integration for the French Octopus platform
//!
//! [`EnergyApi`] is the seam the refresh coordinator talks to;
//! [`KrakenClient`] is the HTTP implementation.

pub mod api;
pub mod client;
pub mod queries;
pub mod types;

pub use api::{EnergyApi, READING_QUALITY_ACTUAL, READINGS_PAGE_SIZE};
pub use client::KrakenClient;
pub use types::{AccountData, ReadingsRequest, UtilityType};
