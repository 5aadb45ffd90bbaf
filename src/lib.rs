// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod runtime;
pub mod testkit;

pub use client::{
    AttemptOutcome, DegradationReason, DegradedResult, DependencyRequest, DependencyResponse,
    InvocationAttempt, KeelClient, KeelClientConfig,
};
pub use correlation::{CorrelationContext, DEFAULT_CORRELATION_HEADER};
pub use error::KeelError;
