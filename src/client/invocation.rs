// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single timed attempts against a dependency.
//!
//! One attempt sends the request, reads the full response body, and
//! classifies what happened under a hard deadline. When the deadline passes
//! the attempt future is dropped, which aborts the underlying connection, so
//! a late response can never leak into a later attempt.
//!
//! # Example
//!
//! ```
//! use keel_http_rs::client::AttemptOutcome;
//!
//! assert!(AttemptOutcome::RetryableFailure.is_retryable());
//! assert!(AttemptOutcome::TimedOut.is_retryable());
//! assert!(!AttemptOutcome::NonRetryableFailure.is_retryable());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::error::{KeelError, Result};

// =============================================================================
// Attempt Outcome
// =============================================================================

/// The classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The dependency answered with a 2xx status.
    Success,
    /// The dependency answered with a 5xx status or the transport failed.
    RetryableFailure,
    /// The dependency answered with a status that retrying cannot fix.
    NonRetryableFailure,
    /// No complete response arrived before the attempt deadline.
    TimedOut,
}

impl AttemptOutcome {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::RetryableFailure | AttemptOutcome::TimedOut
        )
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "success"),
            AttemptOutcome::RetryableFailure => write!(f, "retryable_failure"),
            AttemptOutcome::NonRetryableFailure => write!(f, "non_retryable_failure"),
            AttemptOutcome::TimedOut => write!(f, "timed_out"),
        }
    }
}

// =============================================================================
// Invocation Attempt
// =============================================================================

/// One attempt within a call, as seen by retry policies and loggers.
#[derive(Debug, Clone, Copy)]
pub struct InvocationAttempt {
    /// 1-based ordinal of this attempt within its call.
    pub attempt_number: u32,
    /// The deadline this attempt ran under.
    pub deadline: Instant,
    /// What happened.
    pub outcome: AttemptOutcome,
}

// =============================================================================
// Dependency Response
// =============================================================================

/// A complete response from the dependency.
#[derive(Debug, Clone)]
pub struct DependencyResponse {
    /// The HTTP status the dependency answered with.
    pub status: StatusCode,
    /// The full response body.
    pub body: Bytes,
}

impl DependencyResponse {
    /// Get the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// What one attempt produced, with the evidence attached.
#[derive(Debug)]
pub(crate) enum AttemptVerdict {
    Success(DependencyResponse),
    Retryable(KeelError),
    NonRetryable(KeelError),
    TimedOut(Duration),
}

impl AttemptVerdict {
    pub(crate) fn outcome(&self) -> AttemptOutcome {
        match self {
            AttemptVerdict::Success(_) => AttemptOutcome::Success,
            AttemptVerdict::Retryable(_) => AttemptOutcome::RetryableFailure,
            AttemptVerdict::NonRetryable(_) => AttemptOutcome::NonRetryableFailure,
            AttemptVerdict::TimedOut(_) => AttemptOutcome::TimedOut,
        }
    }

    pub(crate) fn into_result(self) -> Result<DependencyResponse> {
        match self {
            AttemptVerdict::Success(response) => Ok(response),
            AttemptVerdict::Retryable(e) | AttemptVerdict::NonRetryable(e) => Err(e),
            AttemptVerdict::TimedOut(bound) => Err(KeelError::Timeout(bound)),
        }
    }
}

/// Run one attempt to completion or to its deadline, whichever comes first.
///
/// The response body is read inside the deadline; a dependency that answers
/// quickly but trickles the body still times out.
pub(crate) async fn dispatch(
    http: &reqwest::Client,
    method: Method,
    url: Url,
    body: Option<Bytes>,
    header: (HeaderName, HeaderValue),
    deadline: Instant,
    bound: Duration,
) -> AttemptVerdict {
    let (name, value) = header;
    let mut request = http.request(method, url).header(name, value);
    if let Some(body) = body {
        request = request.body(body);
    }

    let exchange = async move {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    match timeout_at(deadline, exchange).await {
        Ok(Ok((status, body))) => classify(status, body),
        Ok(Err(e)) => AttemptVerdict::Retryable(KeelError::Transport(e)),
        Err(_) => AttemptVerdict::TimedOut(bound),
    }
}

/// Map a complete response onto a verdict.
///
/// 2xx succeeds, 5xx is worth retrying, everything else (including 4xx)
/// reflects the request itself and is not.
pub(crate) fn classify(status: StatusCode, body: Bytes) -> AttemptVerdict {
    if status.is_success() {
        AttemptVerdict::Success(DependencyResponse { status, body })
    } else if status.is_server_error() {
        AttemptVerdict::Retryable(KeelError::Dependency(status))
    } else {
        AttemptVerdict::NonRetryable(KeelError::Dependency(status))
    }
}
