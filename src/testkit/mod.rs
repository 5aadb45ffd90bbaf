// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process dependency stubs with scripted behaviors, for tests and
//! demos. A stub binds an ephemeral localhost port and records every
//! request it receives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{KeelError, Result};

/// How a stub answers the requests it receives.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Answer every request with this status and body.
    Respond { status: StatusCode, body: String },
    /// Answer every request with this status and body, after a delay.
    RespondAfter {
        delay: Duration,
        status: StatusCode,
        body: String,
    },
    /// Answer the first `failures` requests with 500, then this status and body.
    FailThenRespond {
        failures: u32,
        status: StatusCode,
        body: String,
    },
    /// Accept the request and never answer.
    Hang,
}

impl StubBehavior {
    /// Answer with 200 and the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        StubBehavior::Respond {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// Answer with the given status and an empty body.
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        StubBehavior::Respond {
            status,
            body: String::new(),
        }
    }

    /// Answer with 200 and the given body, after a delay.
    pub fn delayed_ok(delay: Duration, body: impl Into<String>) -> Self {
        StubBehavior::RespondAfter {
            delay,
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// Answer the first `failures` requests with 500, then 200 and the body.
    pub fn fail_then_ok(failures: u32, body: impl Into<String>) -> Self {
        StubBehavior::FailThenRespond {
            failures,
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// Never answer.
    #[must_use]
    pub fn hang() -> Self {
        StubBehavior::Hang
    }
}

/// One request the stub received, head only.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    head: String,
}

impl RecordedRequest {
    /// The request line, e.g. `GET /users HTTP/1.1`.
    #[must_use]
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    /// Look up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case(name) {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
    }
}

/// A dependency stub listening on an ephemeral localhost port.
#[derive(Debug)]
pub struct StubDependency {
    addr: SocketAddr,
    hits: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl StubDependency {
    /// Bind a listener and start serving the given behavior.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no localhost port can be bound.
    pub async fn start(behavior: StubBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| KeelError::Config(format!("Failed to bind stub listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| KeelError::Config(format!("Failed to read stub address: {e}")))?;

        let hits = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(listener, behavior, hits.clone(), requests.clone()));

        Ok(Self {
            addr,
            hits,
            requests,
            task,
        })
    }

    /// The address the stub is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The stub's base URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// How many requests the stub has received.
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    /// The requests the stub has received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StubDependency {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    listener: TcpListener,
    behavior: StubBehavior,
    hits: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        // One task per connection, so a hung connection never blocks the
        // next attempt from being accepted.
        tokio::spawn(handle_connection(
            stream,
            behavior.clone(),
            hits.clone(),
            requests.clone(),
        ));
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    behavior: StubBehavior,
    hits: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let Some(head) = read_request(&mut stream).await else {
        return;
    };

    let hit = hits.fetch_add(1, Ordering::SeqCst);
    requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest { head });

    match behavior {
        StubBehavior::Respond { status, body } => {
            write_response(&mut stream, status, &body).await;
        }
        StubBehavior::RespondAfter {
            delay,
            status,
            body,
        } => {
            sleep(delay).await;
            write_response(&mut stream, status, &body).await;
        }
        StubBehavior::FailThenRespond {
            failures,
            status,
            body,
        } => {
            if hit < failures {
                write_response(&mut stream, StatusCode::INTERNAL_SERVER_ERROR, "").await;
            } else {
                write_response(&mut stream, status, &body).await;
            }
        }
        StubBehavior::Hang => {
            std::future::pending::<()>().await;
        }
    }
}

/// Read one request, consuming its body, and return the head.
async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();

    // Drain the body so the peer's write completes before we answer.
    let content_length = content_length(&head).unwrap_or(0);
    let mut body_read = buf.len() - (head_end + 4);
    while body_read < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body_read += n;
    }

    Some(head)
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

async fn write_response(stream: &mut TcpStream, status: StatusCode, body: &str) {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status.as_u16(),
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_answers() {
        let stub = StubDependency::start(StubBehavior::ok("hello")).await.unwrap();

        let response = reqwest::get(stub.url()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "hello");

        assert_eq!(stub.hits(), 1);
        assert!(stub.requests()[0].request_line().starts_with("GET / "));
    }

    #[tokio::test]
    async fn test_stub_fail_then_ok() {
        let stub = StubDependency::start(StubBehavior::fail_then_ok(1, "recovered"))
            .await
            .unwrap();

        let response = reqwest::get(stub.url()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = reqwest::get(stub.url()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "recovered");

        assert_eq!(stub.hits(), 2);
    }

    #[tokio::test]
    async fn test_stub_records_headers() {
        let stub = StubDependency::start(StubBehavior::ok("")).await.unwrap();

        let client = reqwest::Client::new();
        client
            .post(stub.url())
            .header("x-probe", "1")
            .body("ping")
            .send()
            .await
            .unwrap();

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].request_line().starts_with("POST / "));
        // Lookup is case-insensitive.
        assert_eq!(requests[0].header("X-Probe").as_deref(), Some("1"));
        assert_eq!(requests[0].header("x-missing"), None);
    }

    #[tokio::test]
    async fn test_stub_delayed_response() {
        let stub = StubDependency::start(StubBehavior::delayed_ok(
            Duration::from_millis(50),
            "slow",
        ))
        .await
        .unwrap();

        let started = std::time::Instant::now();
        let response = reqwest::get(stub.url()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_stub_hang_never_answers() {
        let stub = StubDependency::start(StubBehavior::hang()).await.unwrap();

        let result =
            tokio::time::timeout(Duration::from_millis(100), reqwest::get(stub.url())).await;
        assert!(result.is_err());
        assert_eq!(stub.hits(), 1);
    }
}
