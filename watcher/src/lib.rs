//! Auction Live Watcher - follows a live auction from the command line.
//!
//! This crate wires the SDK session to environment-based configuration and
//! structured logging. It connects as one subscriber identity, optionally
//! joins an auction, and logs every notification and state change until
//! interrupted.
//!
//! # Components
//!
//! - [`config`]: Watcher configuration
//! - [`service`]: Main watcher service

pub mod config;
pub mod service;

pub use config::{BackoffMode, ConfigError, WatcherConfig};
pub use service::{describe_view, WatchSummary, WatcherService};
