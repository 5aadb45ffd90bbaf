// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration management for keel clients
//!
//! This module provides utilities for managing client configuration,
//! including parsing keel config files with per-dependency profiles.
//!
//! # Environment Variables
//!
//! The following environment variables are supported:
//!
//! - `KEELCONFIG` - Path to the keel config file (default: `~/.keel/config`)
//! - `KEEL_PROFILE` - Override the active profile
//! - `KEEL_ENDPOINT` - Override the active profile's endpoint
//! - `KEEL_CORRELATION_HEADER` - Override the correlation header name
//!
//! # Example
//!
//! ```no_run
//! use keel_http_rs::config::KeelConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load with environment variable overrides
//! let config = KeelConfig::load_with_env()?;
//!
//! if let Some(profile) = config.active_profile() {
//!     println!("Using endpoint: {}", profile.endpoint);
//! }
//! # Ok(())
//! # }
//! ```

mod keelconfig;

pub use keelconfig::{
    KeelConfig, KeelProfile, ENV_KEELCONFIG, ENV_KEEL_CORRELATION_HEADER, ENV_KEEL_ENDPOINT,
    ENV_KEEL_PROFILE,
};
