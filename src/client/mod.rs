// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::correlation::CorrelationContext;
use crate::error::{KeelError, Result};
use crate::runtime::{BackoffStrategy, ClientMetrics, LoggingConfig, RequestLogger, RetryPolicy};
use bytes::Bytes;
use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

mod invocation;

pub use invocation::{AttemptOutcome, DependencyResponse, InvocationAttempt};

use invocation::AttemptVerdict;

// =============================================================================
// Dependency Request
// =============================================================================

/// A request to send to a dependency.
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    method: Method,
    target: String,
    body: Option<Bytes>,
}

impl DependencyRequest {
    /// Create a request with an explicit method.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Create a POST request.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// Attach a request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the target URL string.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

impl From<&str> for DependencyRequest {
    fn from(target: &str) -> Self {
        Self::get(target)
    }
}

impl From<String> for DependencyRequest {
    fn from(target: String) -> Self {
        Self::get(target)
    }
}

// =============================================================================
// Degraded Result
// =============================================================================

/// Why a call completed without the dependency's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradationReason {
    /// The call succeeded; nothing was degraded.
    #[default]
    None,
    /// The last attempt ran out of time.
    Timeout,
    /// The dependency answered, but with a failure.
    DependencyError,
    /// The retry budget ran out before the dependency could answer.
    RetriesExhausted,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradationReason::None => write!(f, "none"),
            DegradationReason::Timeout => write!(f, "timeout"),
            DegradationReason::DependencyError => write!(f, "dependency_error"),
            DegradationReason::RetriesExhausted => write!(f, "retries_exhausted"),
        }
    }
}

/// The always-usable result of a resilient call.
///
/// The primary value is whatever the caller supplied up front and is always
/// present. Enrichment holds the dependency's response body when the call
/// succeeded; when it is absent, `degradation_reason` says why.
#[derive(Debug, Clone)]
pub struct DegradedResult<P> {
    /// The caller's own value, independent of the dependency.
    pub primary: P,
    /// The dependency's response body when the call succeeded.
    pub enrichment: Option<Bytes>,
    /// Why enrichment is missing, or `None` when it is not.
    pub degradation_reason: DegradationReason,
}

impl<P> DegradedResult<P> {
    /// Whether the call completed without the dependency's data.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degradation_reason != DegradationReason::None
    }

    /// Get the enrichment body, if the call succeeded.
    #[must_use]
    pub fn enrichment(&self) -> Option<&Bytes> {
        self.enrichment.as_ref()
    }
}

// =============================================================================
// Client
// =============================================================================

/// Configuration for [`KeelClient`].
#[derive(Clone, Debug)]
pub struct KeelClientConfig {
    /// Hard deadline for one attempt, from send through full body read.
    pub per_attempt_timeout: Duration,
    /// TCP connect timeout. `None` leaves connecting bounded only by the
    /// attempt deadline.
    pub connect_timeout: Option<Duration>,
    /// User-Agent header for outbound requests.
    pub user_agent: Option<String>,
}

impl Default for KeelClientConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_millis(1000),
            connect_timeout: None,
            user_agent: None,
        }
    }
}

/// A client that calls dependencies without letting their failures become
/// its caller's failures.
///
/// Every call is bounded in time, retried per policy, and logged per
/// attempt. A dependency that fails, stalls, or disappears yields a
/// [`DegradedResult`] built from the caller's fallback value instead of an
/// error.
#[derive(Clone, Debug)]
pub struct KeelClient {
    config: KeelClientConfig,
    http: reqwest::Client,
    logger: Arc<RequestLogger>,
}

impl KeelClient {
    /// Create a client with default logging.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the timeout settings are invalid or
    /// the underlying HTTP client cannot be built.
    pub fn new(config: KeelClientConfig) -> Result<Self> {
        Self::with_logging(config, LoggingConfig::default())
    }

    /// Create a client with custom logging.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the timeout settings are invalid or
    /// the underlying HTTP client cannot be built.
    pub fn with_logging(config: KeelClientConfig, logging: LoggingConfig) -> Result<Self> {
        if config.per_attempt_timeout.is_zero() {
            return Err(KeelError::Config(
                "per_attempt_timeout must be non-zero".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder
            .build()
            .map_err(|e| KeelError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            logger: Arc::new(RequestLogger::with_config(logging)),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &KeelClientConfig {
        &self.config
    }

    /// Get the metrics collected across calls.
    #[must_use]
    pub fn metrics(&self) -> &ClientMetrics {
        self.logger.metrics()
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call a dependency, absorbing its failures.
    ///
    /// Attempts run under the configured per-attempt deadline and are
    /// retried per `policy`, with backoff between attempts. On success the
    /// result carries the dependency's body as enrichment; on any dependency
    /// failure it carries the caller's `primary` value alone, with the
    /// reason recorded. Each attempt is logged with the correlation id from
    /// `context`, which is also sent to the dependency as a header.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keel_http_rs::runtime::RetryPolicy;
    /// use keel_http_rs::{CorrelationContext, DependencyRequest, KeelClient, KeelClientConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = KeelClient::new(KeelClientConfig::default())?;
    /// let context = CorrelationContext::obtain_or_create(None);
    /// let policy = RetryPolicy::default();
    ///
    /// let request = DependencyRequest::get("https://api.example.com/users/42/recommendations");
    /// let result = client
    ///     .call(&request, &context, &policy, vec!["bestseller-1", "bestseller-2"])
    ///     .await?;
    ///
    /// if result.is_degraded() {
    ///     println!("serving fallback: {}", result.degradation_reason);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Only programmer errors surface here: a target that is not a valid
    /// http(s) URL. Dependency failures never do.
    pub async fn call<P, B: BackoffStrategy>(
        &self,
        request: &DependencyRequest,
        context: &CorrelationContext,
        policy: &RetryPolicy<B>,
        primary: P,
    ) -> Result<DegradedResult<P>> {
        let url = parse_target(request.target())?;
        let span = self.logger.start(request.target(), context.id());
        let started = Instant::now();
        let bound = self.config.per_attempt_timeout;
        // Zero means "no retries", not "no attempts".
        let max_attempts = policy.max_attempts.max(1);

        for attempt_number in 1..=max_attempts {
            let deadline = Instant::now() + bound;
            let verdict = invocation::dispatch(
                &self.http,
                request.method().clone(),
                url.clone(),
                request.body().cloned(),
                context.as_outbound_header(),
                deadline,
                bound,
            )
            .await;

            let attempt = InvocationAttempt {
                attempt_number,
                deadline,
                outcome: verdict.outcome(),
            };
            self.logger.attempt(&span, &attempt);

            if let AttemptVerdict::Success(response) = verdict {
                self.logger.finish_success(span, attempt_number);
                return Ok(DegradedResult {
                    primary,
                    enrichment: Some(response.body),
                    degradation_reason: DegradationReason::None,
                });
            }

            let decision = policy.decide(&attempt);
            if !decision.should_retry {
                let reason = match attempt.outcome {
                    AttemptOutcome::TimedOut => DegradationReason::Timeout,
                    _ => DegradationReason::DependencyError,
                };
                self.logger
                    .finish_degraded(span, &reason.to_string(), attempt_number);
                return Ok(DegradedResult {
                    primary,
                    enrichment: None,
                    degradation_reason: reason,
                });
            }

            if let Some(total) = policy.overall_timeout {
                // Stop early rather than start a sleep the budget cannot cover.
                if started.elapsed() + decision.delay >= total {
                    let reason = DegradationReason::RetriesExhausted;
                    self.logger
                        .finish_degraded(span, &reason.to_string(), attempt_number);
                    return Ok(DegradedResult {
                        primary,
                        enrichment: None,
                        degradation_reason: reason,
                    });
                }
            }

            sleep(decision.delay).await;
        }

        let reason = DegradationReason::RetriesExhausted;
        self.logger
            .finish_degraded(span, &reason.to_string(), max_attempts);
        Ok(DegradedResult {
            primary,
            enrichment: None,
            degradation_reason: reason,
        })
    }

    /// Run one attempt without retry or degradation handling.
    ///
    /// The attempt still runs under the per-attempt deadline and still sends
    /// the correlation header, but every failure comes back as an error.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed target, and the classified
    /// failure for anything the dependency or transport did wrong.
    pub async fn execute(
        &self,
        request: &DependencyRequest,
        context: &CorrelationContext,
    ) -> Result<DependencyResponse> {
        let url = parse_target(request.target())?;
        let bound = self.config.per_attempt_timeout;
        let deadline = Instant::now() + bound;

        let verdict = invocation::dispatch(
            &self.http,
            request.method().clone(),
            url,
            request.body().cloned(),
            context.as_outbound_header(),
            deadline,
            bound,
        )
        .await;

        verdict.into_result()
    }
}

fn parse_target(target: &str) -> Result<Url> {
    let url = Url::parse(target)
        .map_err(|e| KeelError::Validation(format!("Invalid target URL '{target}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(KeelError::Validation(format!(
            "Unsupported target scheme '{other}'"
        ))),
    }
}
