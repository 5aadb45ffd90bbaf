// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for resilience and observability.
//!
//! This module provides retry policies, backoff strategies, and structured
//! logging for dependency calls.

mod logging;
mod retry;

pub use logging::{CallSpan, ClientMetrics, LogLevel, LoggingConfig, RequestLogger};
pub use retry::{
    BackoffStrategy, ExponentialBackoff, FixedBackoff, NoBackoff, RetryDecision, RetryPolicy,
    RetryPolicyBuilder,
};
