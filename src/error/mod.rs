// SPDX-License-Identifier: MIT OR Apache-2.0

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Dependency returned HTTP status {0}")]
    Dependency(StatusCode),

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, KeelError>;
