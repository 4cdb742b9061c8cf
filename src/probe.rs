//! Endpoint reachability probing.
//!
//! A provider endpoint counts as reachable when a TCP connection to its
//! host and port opens within the timeout. Nothing is sent on the socket.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use url::Url;

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Never errors: any failure to connect is `false`.
    async fn is_reachable(&self, endpoint: &str) -> bool;
}

/// Probes with a real TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Host and port to dial for `endpoint`, if it names one.
///
/// Without an explicit port only `http`/`ws` (80) and `https`/`wss` (443)
/// are understood.
pub fn endpoint_target(endpoint: &str) -> Option<(String, u16)> {
    let url = Url::parse(endpoint).ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    let port = match url.port() {
        Some(port) => port,
        None => match url.scheme() {
            "https" | "wss" => 443,
            "http" | "ws" => 80,
            _ => return None,
        },
    };
    // IPv6 literals come back bracketed.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Some((host.to_string(), port))
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self, endpoint: &str) -> bool {
        let Some((host, port)) = endpoint_target(endpoint) else {
            tracing::debug!(endpoint, "Endpoint has no dialable host/port");
            return false;
        };

        let connect = TcpStream::connect((host.as_str(), port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(endpoint, error = %e, "Endpoint unreachable");
                false
            }
            Err(_) => {
                tracing::debug!(
                    endpoint,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Endpoint probe timed out"
                );
                false
            }
        }
    }
}

/// Fixed answers per endpoint; anything unlisted is unreachable.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    answers: HashMap<String, bool>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, endpoint: impl Into<String>, reachable: bool) -> Self {
        self.answers.insert(endpoint.into(), reachable);
        self
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn is_reachable(&self, endpoint: &str) -> bool {
        self.answers.get(endpoint).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_target_uses_scheme_defaults() {
        assert_eq!(
            endpoint_target("https://openrouter.ai/api/v1"),
            Some(("openrouter.ai".to_string(), 443))
        );
        assert_eq!(
            endpoint_target("http://localhost:11434"),
            Some(("localhost".to_string(), 11434))
        );
        assert_eq!(
            endpoint_target("ws://example.com"),
            Some(("example.com".to_string(), 80))
        );
        assert_eq!(
            endpoint_target("http://[::1]:8080/"),
            Some(("::1".to_string(), 8080))
        );
    }

    #[test]
    fn endpoint_target_rejects_unknown_shapes() {
        assert_eq!(endpoint_target("ftp://example.com"), None);
        assert_eq!(endpoint_target("not a url"), None);
        assert_eq!(endpoint_target("mailto:someone@example.com"), None);
        assert_eq!(
            endpoint_target("grpc://example.com:9000"),
            Some(("example.com".to_string(), 9000))
        );
    }

    #[tokio::test]
    async fn tcp_probe_detects_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new(Duration::from_secs(1));

        assert!(probe.is_reachable(&format!("http://127.0.0.1:{port}")).await);
    }

    #[tokio::test]
    async fn tcp_probe_reports_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let probe = TcpProbe::new(Duration::from_secs(1));

        assert!(!probe.is_reachable(&format!("http://127.0.0.1:{port}")).await);
        assert!(!probe.is_reachable("ftp://127.0.0.1").await);
    }

    #[tokio::test]
    async fn static_probe_defaults_to_unreachable() {
        let probe = StaticProbe::new().with("http://up", true);
        assert!(probe.is_reachable("http://up").await);
        assert!(!probe.is_reachable("http://down").await);
    }
}
