//! Request interception for snipcache.
//!
//! This crate holds the request model, the router, the three retrieval
//! strategies, and the controller lifecycle that ties them to versioned cache
//! partitions. The network is reached through the [`Network`] trait;
//! [`FetchClient`] is the reqwest-backed implementation.

pub mod fetch;
pub mod lifecycle;
pub mod request;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, FetchError, Network};
pub use lifecycle::{Client, Controller, ControllerHost, ControllerState, UpdateOutcome};
pub use request::Request;
pub use router::{Route, Router};
pub use strategy::{Served, Source, Strategy, StrategyExecutor};
