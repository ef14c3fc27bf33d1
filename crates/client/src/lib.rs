//! Client side of mbm-sw.
//!
//! This crate provides the network fetch pipeline, request routing, the
//! caching strategies and the worker lifecycle that ties them together.

pub mod events;
pub mod fetch;
pub mod lifecycle;
pub mod route;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{LogNotifier, Notification, Notifier, handle_push, handle_sync};
pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use lifecycle::{ActivationReport, AssetCacheManager, WorkerPhase};
pub use route::{PassThroughReason, RequestClass, Route, Router};
pub use strategy::{FetchOutcome, Revalidation, ServedFrom};
