// SPDX-License-Identifier: MIT OR Apache-2.0

//! Example: Resilient Dependency Calls
//!
//! This example demonstrates the resilient invocation layer end to end:
//! - Correlation ids propagated to every dependency attempt
//! - Per-attempt timeouts that cancel the in-flight request
//! - Retry with exponential backoff and jitter
//! - Graceful degradation with an always-usable result
//!
//! Every call runs against in-process stub dependencies, so the example is
//! self-contained and needs no network.

use std::time::Duration;

use http::StatusCode;
use keel_http_rs::runtime::{
    BackoffStrategy, ExponentialBackoff, LoggingConfig, NoBackoff, RetryPolicy,
};
use keel_http_rs::testkit::{StubBehavior, StubDependency};
use keel_http_rs::{CorrelationContext, DependencyRequest, KeelClient, KeelClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (for demonstration)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = KeelClientConfig {
        per_attempt_timeout: Duration::from_millis(500),
        ..KeelClientConfig::default()
    };
    let client = KeelClient::with_logging(config, LoggingConfig::verbose())?;

    // ==========================================================================
    // 1. A Healthy Dependency
    // ==========================================================================
    println!("=== A Healthy Dependency ===");

    let stub =
        StubDependency::start(StubBehavior::ok(r#"{"recommendations":["vinyl-7"]}"#)).await?;

    // The inbound request already carried an id, so every outbound attempt
    // reuses it.
    let context = CorrelationContext::obtain_or_create(Some("req-inbound-81c4"));
    let policy = RetryPolicy::default();

    let request = DependencyRequest::get(format!("{}/recommendations", stub.url()));
    let result = client.call(&request, &context, &policy, ()).await?;

    println!("Correlation id: {}", context.id());
    println!("Degraded: {}", result.is_degraded());
    if let Some(enrichment) = result.enrichment() {
        println!("Enrichment: {}", String::from_utf8_lossy(enrichment));
    }

    // ==========================================================================
    // 2. A Flaky Dependency Recovering Under Retry
    // ==========================================================================
    println!("\n=== A Flaky Dependency Recovering Under Retry ===");

    let stub =
        StubDependency::start(StubBehavior::fail_then_ok(2, r#"{"status":"recovered"}"#)).await?;
    let context = CorrelationContext::new();

    let request = DependencyRequest::get(stub.url());
    let result = client.call(&request, &context, &policy, ()).await?;

    println!("Attempts the stub saw: {}", stub.hits());
    println!("Degraded: {}", result.is_degraded());

    // ==========================================================================
    // 3. A Client Error Fails Fast
    // ==========================================================================
    println!("\n=== A Client Error Fails Fast ===");

    let stub = StubDependency::start(StubBehavior::status(StatusCode::NOT_FOUND)).await?;
    let context = CorrelationContext::new();

    let request = DependencyRequest::get(format!("{}/users/unknown", stub.url()));
    let fallback = vec!["popular-1".to_string(), "popular-2".to_string()];
    let result = client.call(&request, &context, &policy, fallback).await?;

    println!("Attempts the stub saw: {}", stub.hits());
    println!("Degradation reason: {}", result.degradation_reason);
    println!("Serving fallback: {:?}", result.primary);

    // ==========================================================================
    // 4. A Hanging Dependency Times Out
    // ==========================================================================
    println!("\n=== A Hanging Dependency Times Out ===");

    let stub = StubDependency::start(StubBehavior::hang()).await?;
    let context = CorrelationContext::new();
    let policy = RetryPolicy::builder()
        .max_attempts(2)
        .backoff(NoBackoff::new())
        .build()?;

    let request = DependencyRequest::get(stub.url());
    let started = std::time::Instant::now();
    let result = client.call(&request, &context, &policy, "cached-profile").await?;

    println!("Elapsed: {:?}", started.elapsed());
    println!("Degradation reason: {}", result.degradation_reason);
    println!("Primary survives: {}", result.primary);

    // ==========================================================================
    // 5. Backoff Schedule
    // ==========================================================================
    println!("\n=== Backoff Schedule ===");

    let backoff = ExponentialBackoff::new(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2));

    println!("With jitter (ceiling 50ms):");
    for attempt in 1..=5 {
        println!("  After attempt {}: {:?}", attempt, backoff.delay(attempt));
    }

    let bare = backoff.with_jitter_ceiling(Duration::ZERO);
    println!("Without jitter:");
    for attempt in 1..=5 {
        println!("  After attempt {}: {:?}", attempt, bare.delay(attempt));
    }

    // ==========================================================================
    // 6. Metrics
    // ==========================================================================
    println!("\n=== Metrics ===");

    let metrics = client.metrics();
    println!("Total calls: {}", metrics.total_calls());
    println!("Successful: {}", metrics.successful_calls());
    println!("Degraded: {}", metrics.degraded_calls());
    println!("Total attempts: {}", metrics.total_attempts());
    println!("Success rate: {:.1}%", metrics.success_rate() * 100.0);

    println!("\n✅ Example complete!");
    Ok(())
}
