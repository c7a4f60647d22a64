//! Client-side resource synchronization and session control for a shared
//! boat reservation service: a persisted credential with a sliding expiry,
//! six server-backed collections reconciled server-wins, validation and
//! normalization of user-entered records, and an activity-driven refresh
//! cadence.

pub mod activity;
pub mod adapters;
pub mod client;
pub mod config;
pub mod normalize;
pub mod ports;
pub mod records;
pub mod session;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::FleetClient;
pub use session::{AuthError, Credential, Session};
pub use store::StoreError;
