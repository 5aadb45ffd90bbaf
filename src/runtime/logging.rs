// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured logging for dependency calls.
//!
//! Every attempt a client makes is logged as one line carrying the
//! correlation id, the attempt number, and the classified outcome, so a
//! single flow can be reconstructed across services from log output alone.
//!
//! # Example
//!
//! ```
//! use keel_http_rs::runtime::{LogLevel, LoggingConfig, RequestLogger};
//!
//! let logger = RequestLogger::with_config(
//!     LoggingConfig::new().with_attempt_level(LogLevel::Debug),
//! );
//!
//! let span = logger.start("https://api.example.com/users", "abc-123");
//! logger.finish_success(span, 1);
//!
//! assert_eq!(logger.metrics().total_calls(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::client::InvocationAttempt;

/// Log level for dependency call logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - only errors.
    Error,
    /// Disabled - no logging.
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Configuration for dependency call logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for attempt and success lines.
    pub attempt_level: LogLevel,
    /// Log level for degraded completions.
    pub degraded_level: LogLevel,
    /// Whether to include the target URL in log lines.
    pub log_target: bool,
    /// Whether to strip query strings from logged targets.
    pub redact_query: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            attempt_level: LogLevel::Info,
            degraded_level: LogLevel::Warn,
            log_target: true,
            redact_query: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level for attempt and success lines.
    #[must_use]
    pub fn with_attempt_level(mut self, level: LogLevel) -> Self {
        self.attempt_level = level;
        self
    }

    /// Set the log level for degraded completions.
    #[must_use]
    pub fn with_degraded_level(mut self, level: LogLevel) -> Self {
        self.degraded_level = level;
        self
    }

    /// Enable or disable target URL logging.
    #[must_use]
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.log_target = enabled;
        self
    }

    /// Enable or disable query string redaction.
    #[must_use]
    pub fn with_query_redaction(mut self, enabled: bool) -> Self {
        self.redact_query = enabled;
        self
    }

    /// Create a verbose configuration for debugging.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            attempt_level: LogLevel::Debug,
            degraded_level: LogLevel::Warn,
            log_target: true,
            redact_query: false,
        }
    }

    /// Create a quiet configuration for production.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            attempt_level: LogLevel::Off,
            degraded_level: LogLevel::Warn,
            log_target: true,
            redact_query: true,
        }
    }
}

/// Metrics collected across dependency calls.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Total number of completed calls.
    total_calls: AtomicU64,
    /// Number of calls that returned the dependency's response.
    successful_calls: AtomicU64,
    /// Number of calls that completed degraded.
    degraded_calls: AtomicU64,
    /// Total number of attempts across all calls.
    total_attempts: AtomicU64,
}

impl ClientMetrics {
    /// Create a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt.
    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.successful_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a degraded call.
    pub fn record_degraded(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.degraded_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of completed calls.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Get the number of successful calls.
    #[must_use]
    pub fn successful_calls(&self) -> u64 {
        self.successful_calls.load(Ordering::Relaxed)
    }

    /// Get the number of degraded calls.
    #[must_use]
    pub fn degraded_calls(&self) -> u64 {
        self.degraded_calls.load(Ordering::Relaxed)
    }

    /// Get the total number of attempts across all calls.
    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts.load(Ordering::Relaxed)
    }

    /// Get the success rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_calls.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        let successful = self.successful_calls.load(Ordering::Relaxed);
        successful as f64 / total as f64
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.successful_calls.store(0, Ordering::Relaxed);
        self.degraded_calls.store(0, Ordering::Relaxed);
        self.total_attempts.store(0, Ordering::Relaxed);
    }
}

/// A logger that tracks dependency calls with timing and attempt detail.
#[derive(Debug)]
pub struct RequestLogger {
    config: LoggingConfig,
    metrics: ClientMetrics,
}

impl RequestLogger {
    /// Create a new request logger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggingConfig::default(),
            metrics: ClientMetrics::new(),
        }
    }

    /// Create a request logger with custom configuration.
    #[must_use]
    pub fn with_config(config: LoggingConfig) -> Self {
        Self {
            config,
            metrics: ClientMetrics::new(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Get the metrics.
    #[must_use]
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Start tracking a call.
    #[must_use]
    pub fn start(&self, target: &str, correlation_id: &str) -> CallSpan {
        CallSpan {
            target: target.to_string(),
            correlation_id: correlation_id.to_string(),
            start: Instant::now(),
        }
    }

    /// Log one classified attempt.
    pub fn attempt(&self, span: &CallSpan, attempt: &InvocationAttempt) {
        self.metrics.record_attempt();

        if self.config.attempt_level == LogLevel::Off {
            return;
        }

        let msg = format!(
            "Dependency attempt {}{}: {} [correlation_id={}]",
            attempt.attempt_number,
            self.target_part(span),
            attempt.outcome,
            span.correlation_id
        );

        match self.config.attempt_level {
            LogLevel::Trace => trace!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Debug => debug!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Info => info!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Warn => warn!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Error => error!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Off => {}
        }
    }

    /// Finish tracking a call (success).
    pub fn finish_success(&self, span: CallSpan, attempts: u32) {
        self.metrics.record_success();
        let elapsed = span.start.elapsed();

        if self.config.attempt_level == LogLevel::Off {
            return;
        }

        let msg = format!(
            "Dependency call{} completed in {:?} after {} attempt(s) [correlation_id={}]",
            self.target_part(&span),
            elapsed,
            attempts,
            span.correlation_id
        );

        match self.config.attempt_level {
            LogLevel::Trace => trace!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Debug => debug!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Info => info!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Warn => warn!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Error => error!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Off => {}
        }
    }

    /// Finish tracking a call (degraded).
    pub fn finish_degraded(&self, span: CallSpan, reason: &str, attempts: u32) {
        self.metrics.record_degraded();
        let elapsed = span.start.elapsed();

        if self.config.degraded_level == LogLevel::Off {
            return;
        }

        let msg = format!(
            "Dependency call{} degraded after {} attempt(s) in {:?}: {} [correlation_id={}]",
            self.target_part(&span),
            attempts,
            elapsed,
            reason,
            span.correlation_id
        );

        match self.config.degraded_level {
            LogLevel::Trace => trace!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Debug => debug!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Info => info!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Warn => warn!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Error => error!(target: "keel_http::dependency", "{}", msg),
            LogLevel::Off => {}
        }
    }

    fn target_part(&self, span: &CallSpan) -> String {
        if !self.config.log_target {
            return String::new();
        }
        let target = if self.config.redact_query {
            match span.target.split_once('?') {
                Some((path, _)) => path,
                None => span.target.as_str(),
            }
        } else {
            span.target.as_str()
        };
        format!(" for {}", target)
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// A span representing one in-flight dependency call.
#[derive(Debug)]
pub struct CallSpan {
    target: String,
    correlation_id: String,
    start: Instant,
}

impl CallSpan {
    /// Get the target URL.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Get the elapsed time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AttemptOutcome;
    use tokio::time::Instant as TokioInstant;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
        assert_eq!(LogLevel::Off.to_string(), "OFF");
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.attempt_level, LogLevel::Info);
        assert_eq!(config.degraded_level, LogLevel::Warn);
        assert!(config.log_target);
        assert!(config.redact_query);
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .with_attempt_level(LogLevel::Debug)
            .with_degraded_level(LogLevel::Error)
            .with_target(false)
            .with_query_redaction(false);

        assert_eq!(config.attempt_level, LogLevel::Debug);
        assert_eq!(config.degraded_level, LogLevel::Error);
        assert!(!config.log_target);
        assert!(!config.redact_query);
    }

    #[test]
    fn test_logging_config_verbose() {
        let config = LoggingConfig::verbose();
        assert_eq!(config.attempt_level, LogLevel::Debug);
        assert!(!config.redact_query);
    }

    #[test]
    fn test_logging_config_quiet() {
        let config = LoggingConfig::quiet();
        assert_eq!(config.attempt_level, LogLevel::Off);
        assert_eq!(config.degraded_level, LogLevel::Warn);
    }

    #[test]
    fn test_client_metrics() {
        let metrics = ClientMetrics::new();
        assert_eq!(metrics.total_calls(), 0);
        assert_eq!(metrics.successful_calls(), 0);
        assert_eq!(metrics.degraded_calls(), 0);
        assert_eq!(metrics.total_attempts(), 0);
        assert_eq!(metrics.success_rate(), 1.0); // No calls = 100% success

        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_success();
        metrics.record_success();
        metrics.record_degraded();

        assert_eq!(metrics.total_calls(), 3);
        assert_eq!(metrics.successful_calls(), 2);
        assert_eq!(metrics.degraded_calls(), 1);
        assert_eq!(metrics.total_attempts(), 3);
        assert!((metrics.success_rate() - 0.666_666_666_666_666_6).abs() < 0.001);
    }

    #[test]
    fn test_client_metrics_reset() {
        let metrics = ClientMetrics::new();
        metrics.record_attempt();
        metrics.record_success();
        metrics.record_degraded();
        metrics.reset();

        assert_eq!(metrics.total_calls(), 0);
        assert_eq!(metrics.successful_calls(), 0);
        assert_eq!(metrics.degraded_calls(), 0);
        assert_eq!(metrics.total_attempts(), 0);
    }

    #[test]
    fn test_request_logger_success() {
        let logger = RequestLogger::new();
        let span = logger.start("https://api.example.com/users", "abc-123");

        assert_eq!(span.target(), "https://api.example.com/users");
        assert_eq!(span.correlation_id(), "abc-123");
        assert!(span.elapsed() < std::time::Duration::from_secs(1));

        logger.finish_success(span, 1);
        assert_eq!(logger.metrics().total_calls(), 1);
        assert_eq!(logger.metrics().successful_calls(), 1);
    }

    #[test]
    fn test_request_logger_degraded() {
        let logger = RequestLogger::with_config(LoggingConfig::quiet());
        let span = logger.start("https://api.example.com/users", "abc-123");

        logger.finish_degraded(span, "retries_exhausted", 3);
        assert_eq!(logger.metrics().total_calls(), 1);
        assert_eq!(logger.metrics().degraded_calls(), 1);
    }

    #[test]
    fn test_request_logger_counts_attempts() {
        let logger = RequestLogger::new();
        let span = logger.start("https://api.example.com/users", "abc-123");

        let attempt = InvocationAttempt {
            attempt_number: 1,
            deadline: TokioInstant::now(),
            outcome: AttemptOutcome::RetryableFailure,
        };
        logger.attempt(&span, &attempt);
        logger.attempt(
            &span,
            &InvocationAttempt {
                attempt_number: 2,
                deadline: TokioInstant::now(),
                outcome: AttemptOutcome::Success,
            },
        );

        assert_eq!(logger.metrics().total_attempts(), 2);
        assert_eq!(logger.metrics().total_calls(), 0);
    }

    #[test]
    fn test_target_redaction() {
        let logger = RequestLogger::new();
        let span = logger.start("https://api.example.com/users?token=secret", "abc-123");
        assert_eq!(logger.target_part(&span), " for https://api.example.com/users");

        let logger = RequestLogger::with_config(LoggingConfig::new().with_query_redaction(false));
        let span = logger.start("https://api.example.com/users?token=secret", "abc-123");
        assert_eq!(
            logger.target_part(&span),
            " for https://api.example.com/users?token=secret"
        );

        let logger = RequestLogger::with_config(LoggingConfig::new().with_target(false));
        let span = logger.start("https://api.example.com/users", "abc-123");
        assert_eq!(logger.target_part(&span), "");
    }

    #[test]
    fn test_call_span() {
        let span = CallSpan {
            target: "https://api.example.com/users".to_string(),
            correlation_id: "abc-123".to_string(),
            start: Instant::now(),
        };

        assert_eq!(span.target(), "https://api.example.com/users");
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(span.elapsed() >= std::time::Duration::from_millis(1));
    }
}
