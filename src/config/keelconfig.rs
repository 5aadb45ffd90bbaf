// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keel configuration file parser
//!
//! This module provides functionality to parse the keel config file
//! (typically `~/.keel/config`) which holds per-dependency profiles:
//! endpoints plus the timeout and retry settings to use against them.
//!
//! # Example
//!
//! ```no_run
//! use keel_http_rs::config::KeelConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from default location (~/.keel/config)
//! let config = KeelConfig::load_default()?;
//!
//! if let Some(profile) = config.active_profile() {
//!     println!("Endpoint: {}", profile.endpoint);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::KeelClientConfig;
use crate::correlation::DEFAULT_CORRELATION_HEADER;
use crate::error::{KeelError, Result};
use crate::runtime::{ExponentialBackoff, RetryPolicy};
use http::HeaderName;

/// Environment variable naming the config file path.
pub const ENV_KEELCONFIG: &str = "KEELCONFIG";

/// Environment variable overriding the active profile name.
pub const ENV_KEEL_PROFILE: &str = "KEEL_PROFILE";

/// Environment variable overriding the active profile's endpoint.
pub const ENV_KEEL_ENDPOINT: &str = "KEEL_ENDPOINT";

/// Environment variable overriding the active profile's correlation header.
pub const ENV_KEEL_CORRELATION_HEADER: &str = "KEEL_CORRELATION_HEADER";

/// Represents the entire keel configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeelConfig {
    /// The currently active profile name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Map of profile names to their configurations
    pub profiles: HashMap<String, KeelProfile>,
}

/// Configuration for calling a single dependency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeelProfile {
    /// Base URL of the dependency
    pub endpoint: String,

    /// Maximum attempts per call, including the first one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Hard deadline for one attempt, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_attempt_timeout_ms: Option<u64>,

    /// Base of the exponential backoff, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_base_ms: Option<u64>,

    /// Upper bound of the random backoff jitter, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ceiling_ms: Option<u64>,

    /// Header name used to propagate the correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_header: Option<String>,
}

impl KeelConfig {
    /// Load configuration from the default location (~/.keel/config)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The home directory cannot be determined
    /// - The config file cannot be read
    /// - The config file is malformed
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the keel config file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is malformed YAML
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            KeelError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    ///
    /// # Arguments
    ///
    /// * `yaml` - YAML content as string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| KeelError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Get the default config file path (~/.keel/config)
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| KeelError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".keel").join("config"))
    }

    /// Get the path to the config file, respecting the KEELCONFIG environment variable
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined when KEELCONFIG is not set
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(ENV_KEELCONFIG) {
            Ok(PathBuf::from(env_path))
        } else {
            Self::default_path()
        }
    }

    /// Load configuration from the path in KEELCONFIG (falling back to the
    /// default path), then apply KEEL_PROFILE, KEEL_ENDPOINT, and
    /// KEEL_CORRELATION_HEADER overrides.
    ///
    /// Endpoint and header overrides land on the active profile; they do
    /// nothing when no profile resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load_from_path(Self::config_path()?)?;

        if let Ok(profile) = std::env::var(ENV_KEEL_PROFILE) {
            config.profile = Some(profile);
        }
        if let Ok(endpoint) = std::env::var(ENV_KEEL_ENDPOINT) {
            if let Some(profile) = config.active_profile_mut() {
                profile.endpoint = endpoint;
            }
        }
        if let Ok(header) = std::env::var(ENV_KEEL_CORRELATION_HEADER) {
            if let Some(profile) = config.active_profile_mut() {
                profile.correlation_header = Some(header);
            }
        }

        Ok(config)
    }

    /// Get the currently active profile
    ///
    /// # Returns
    ///
    /// Returns `None` if no active profile is set or if the profile doesn't exist
    pub fn active_profile(&self) -> Option<&KeelProfile> {
        self.profile.as_ref().and_then(|name| self.profiles.get(name))
    }

    /// Get a profile by name
    ///
    /// # Arguments
    ///
    /// * `name` - The profile name to retrieve
    pub fn get_profile(&self, name: &str) -> Option<&KeelProfile> {
        self.profiles.get(name)
    }

    /// List all available profile names
    pub fn profile_names(&self) -> Vec<&String> {
        self.profiles.keys().collect()
    }

    fn active_profile_mut(&mut self) -> Option<&mut KeelProfile> {
        let name = self.profile.clone()?;
        self.profiles.get_mut(&name)
    }
}

impl KeelProfile {
    /// Build a client configuration from this profile.
    #[must_use]
    pub fn client_config(&self) -> KeelClientConfig {
        KeelClientConfig {
            per_attempt_timeout: Duration::from_millis(self.per_attempt_timeout_ms.unwrap_or(1000)),
            ..Default::default()
        }
    }

    /// Build a retry policy from this profile.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the profile sets `max_attempts` to zero
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let backoff =
            ExponentialBackoff::new(Duration::from_millis(self.backoff_base_ms.unwrap_or(100)))
                .with_jitter_ceiling(Duration::from_millis(self.jitter_ceiling_ms.unwrap_or(50)));

        RetryPolicy::builder()
            .max_attempts(self.max_attempts.unwrap_or(3))
            .backoff(backoff)
            .build()
    }

    /// Get the correlation header name this profile propagates ids under.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured name is not a legal
    /// HTTP header name
    pub fn correlation_header_name(&self) -> Result<HeaderName> {
        let name = self
            .correlation_header
            .as_deref()
            .unwrap_or(DEFAULT_CORRELATION_HEADER);
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| KeelError::Config(format!("Invalid correlation header '{name}': {e}")))
    }

    /// Build a target URL under this profile's endpoint.
    #[must_use]
    pub fn target(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
