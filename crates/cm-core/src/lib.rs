//! # cm-core
//!
//! Core types and configuration for Commerce RS.
//!
//! This crate provides the building blocks shared by the other crates:
//! - Configuration types and environment loading
//! - The tenant (site) descriptor threaded into file operations
//! - Tracing subscriber setup

pub mod config;
pub mod logging;
pub mod types;

pub use config::{AppConfig, ConfigError, EmailConfig, EmailDeliveryMethod, FileServiceConfig};
pub use logging::init_tracing;
pub use types::{Id, Site};
