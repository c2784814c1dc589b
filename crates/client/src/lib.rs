//! Client code for netstash.
//!
//! This crate provides the HTTP fetch pipeline the engine uses to reach the
//! origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
