//! Contact cache and sync core.
//!
//! Pulls pages of profiles from a randomuser-style HTTP endpoint,
//! normalizes them into a durable SQLite store, and exposes read, merge
//! and insert operations through a small service layer. Operation
//! lifecycles are observable through restartable state feeds. The binary
//! in `main.rs` is a thin CLI over this library.

pub mod config;
pub mod device;
pub mod error;
pub mod feed;
pub mod model;
pub mod remote;
pub mod service;
pub mod store;

pub use error::{Error, Result};
