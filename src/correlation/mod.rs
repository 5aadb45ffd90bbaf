// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation identifiers for cross-service log correlation
//!
//! Every inbound request gets exactly one [`CorrelationContext`]. It either
//! wraps the identifier the upstream caller already sent or generates a
//! fresh one, and every outbound call made while servicing that request
//! attaches the same identifier as a header. Joining logs on the identifier
//! reconstructs the request's full call graph across services.
//!
//! # Example
//!
//! ```
//! use keel_http_rs::correlation::CorrelationContext;
//!
//! // Reuse whatever the upstream caller sent.
//! let inherited = CorrelationContext::obtain_or_create(Some("req-1234"));
//! assert_eq!(inherited.id(), "req-1234");
//!
//! // No inbound header: a fresh identifier is generated.
//! let fresh = CorrelationContext::obtain_or_create(None);
//! let (name, value) = fresh.as_outbound_header();
//! assert_eq!(name.as_str(), "x-request-id");
//! assert_eq!(value.to_str().unwrap(), fresh.id());
//! ```

use http::header::{HeaderName, HeaderValue};
use std::fmt;
use uuid::Uuid;

/// Default header used to carry the correlation identifier.
pub const DEFAULT_CORRELATION_HEADER: &str = "x-request-id";

/// A request-scoped correlation identifier.
///
/// Created once at the boundary where a request enters the service, passed
/// by reference to every outbound invocation that request triggers, and
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    id: String,
    header: HeaderName,
    value: HeaderValue,
}

impl CorrelationContext {
    /// Create a context with a freshly generated identifier.
    #[must_use]
    pub fn new() -> Self {
        let (id, value) = fresh_parts();
        Self {
            id,
            header: HeaderName::from_static(DEFAULT_CORRELATION_HEADER),
            value,
        }
    }

    /// Wrap an inbound identifier, or generate a fresh one.
    ///
    /// A present, non-empty inbound value is reused verbatim so that any
    /// upstream generator's format survives the hop. An absent or empty
    /// value, or one that cannot be carried in an HTTP header, yields a
    /// fresh identifier instead.
    #[must_use]
    pub fn obtain_or_create(inbound: Option<&str>) -> Self {
        match inbound {
            Some(raw) if !raw.is_empty() => match HeaderValue::from_str(raw) {
                Ok(value) => Self {
                    id: raw.to_string(),
                    header: HeaderName::from_static(DEFAULT_CORRELATION_HEADER),
                    value,
                },
                Err(_) => Self::new(),
            },
            _ => Self::new(),
        }
    }

    /// Use a different header name for propagation, e.g. `traceparent`.
    ///
    /// The identifier itself is unchanged; only the name under which it is
    /// attached to outbound calls differs. Whatever name a service picks
    /// must be used consistently across its hops.
    #[must_use]
    pub fn with_header_name(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// The identifier carried by this context.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The header name used when propagating the identifier.
    #[must_use]
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// The header pair to attach to every outbound call for this request.
    #[must_use]
    pub fn as_outbound_header(&self) -> (HeaderName, HeaderValue) {
        (self.header.clone(), self.value.clone())
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

fn fresh_parts() -> (String, HeaderValue) {
    let id = Uuid::new_v4().to_string();
    // Hyphenated lowercase hex is always a legal header value.
    let value = HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static(""));
    (id, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obtain_reuses_inbound_verbatim() {
        let ctx = CorrelationContext::obtain_or_create(Some("req-1234"));
        assert_eq!(ctx.id(), "req-1234");

        let (name, value) = ctx.as_outbound_header();
        assert_eq!(name.as_str(), DEFAULT_CORRELATION_HEADER);
        assert_eq!(value.to_str().unwrap(), "req-1234");
    }

    #[test]
    fn test_obtain_generates_when_absent() {
        let ctx = CorrelationContext::obtain_or_create(None);
        assert!(!ctx.id().is_empty());
    }

    #[test]
    fn test_obtain_generates_when_empty() {
        let ctx = CorrelationContext::obtain_or_create(Some(""));
        assert!(!ctx.id().is_empty());
    }

    #[test]
    fn test_obtain_generates_when_not_a_header_value() {
        let ctx = CorrelationContext::obtain_or_create(Some("bad\nvalue"));
        assert_ne!(ctx.id(), "bad\nvalue");
        assert!(!ctx.id().is_empty());
    }

    #[test]
    fn test_fresh_identifiers_are_unique() {
        let a = CorrelationContext::new();
        let b = CorrelationContext::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_fresh_identifier_is_uuid_text() {
        let ctx = CorrelationContext::new();
        assert_eq!(ctx.id().len(), 36);
        assert!(ctx.id().chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn test_with_header_name() {
        let ctx = CorrelationContext::obtain_or_create(Some("00-abc-def-01"))
            .with_header_name(HeaderName::from_static("traceparent"));

        let (name, value) = ctx.as_outbound_header();
        assert_eq!(name.as_str(), "traceparent");
        assert_eq!(value.to_str().unwrap(), "00-abc-def-01");
    }

    #[test]
    fn test_display_prints_id() {
        let ctx = CorrelationContext::obtain_or_create(Some("req-42"));
        assert_eq!(ctx.to_string(), "req-42");
    }

    #[test]
    fn test_default_generates() {
        let ctx = CorrelationContext::default();
        assert_eq!(ctx.header_name().as_str(), DEFAULT_CORRELATION_HEADER);
        assert!(!ctx.id().is_empty());
    }
}
