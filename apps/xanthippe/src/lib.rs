//! # xanthippe
//!
//! The binary side of Xanthippe: configuration loading, the CLI, and the
//! intake HTTP server. Exposed as a library so integration tests can build
//! the router directly.

pub mod api;
pub mod cli;
pub mod config;
