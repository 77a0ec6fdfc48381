//! Status aggregation and command orchestration for the Supra lottery
//! service.
//!
//! Reads go through a short-lived [`cache::StatusCache`] and are turned into
//! typed views by the derivers in [`views`]. Administrative writes go through
//! [`commands::CommandOrchestrator`]. [`client::SupraClient`] wires both
//! together for hosts.

pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod fallback;
pub mod normalize;
pub mod payload;
pub mod telemetry;
pub mod transport;
pub mod views;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub type Result<T, E = error::Error> = std::result::Result<T, E>;

pub use client::SupraClient;
pub use commands::{
    ClientWhitelistRecord,
    CommandInfo,
    ConsumerWhitelistRecord,
    GasConfigUpdate,
    MutationResult,
    VrfConfigUpdate,
};
pub use config::ClientConfig;
pub use error::{
    Error,
    ValidationError,
};
pub use fallback::FallbackConfig;
pub use transport::{
    HttpTransport,
    Transport,
};
