//! Routing of identity lookups: direct for the baseline, or through a
//! candidate relay.
//!
//! The production transport applies a candidate as an outbound proxy on a
//! dedicated HTTP client: `http` candidates are used as HTTP proxies (CONNECT
//! tunnel for an HTTPS resolver), `socks5` candidates as SOCKS5 proxies with
//! remote DNS. The direct route ignores every proxy, including the ambient
//! `HTTP_PROXY` family of environment variables.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::candidate::Candidate;
use crate::error::TransportError;

/// How a candidate endpoint is spoken to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Socks5,
}

impl ProxyScheme {
    /// Proxy URL for a candidate. IPv6 literals are bracketed.
    pub fn proxy_url(&self, candidate: &Candidate) -> String {
        let scheme = match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Socks5 => "socks5h",
        };
        if candidate.address.contains(':') && !candidate.address.starts_with('[') {
            format!("{scheme}://[{}]:{}", candidate.address, candidate.port)
        } else {
            format!("{scheme}://{}:{}", candidate.address, candidate.port)
        }
    }
}

/// Path an identity lookup takes to the resolution service.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Straight from this host; used for the baseline.
    Direct,
    /// Relayed through the candidate endpoint.
    Through(&'a Candidate),
}

/// Raw reply from the resolution service.
#[derive(Debug, Clone)]
pub struct ResolverResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ResolverResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to reach the resolution service over a given route.
///
/// Implementations perform exactly one request and read the whole body.
/// Deadlines are imposed by the caller.
#[async_trait]
pub trait IdentityTransport: Send + Sync {
    async fn fetch(&self, route: Route<'_>) -> Result<ResolverResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    resolver_url: String,
    scheme: ProxyScheme,
    direct: reqwest::Client,
}

impl HttpTransport {
    pub fn new(resolver_url: impl Into<String>, scheme: ProxyScheme) -> Result<Self, TransportError> {
        let direct = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            resolver_url: resolver_url.into(),
            scheme,
            direct,
        })
    }

    /// Client whose every request is relayed through `candidate`.
    fn relayed_client(&self, candidate: &Candidate) -> Result<reqwest::Client, TransportError> {
        let proxy_url = self.scheme.proxy_url(candidate);
        let proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| TransportError::InvalidRoute {
            route: proxy_url.clone(),
            reason: e.to_string(),
        })?;
        reqwest::Client::builder()
            .proxy(proxy)
            .build()
            .map_err(|e| TransportError::InvalidRoute {
                route: proxy_url,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl IdentityTransport for HttpTransport {
    async fn fetch(&self, route: Route<'_>) -> Result<ResolverResponse, TransportError> {
        let client = match route {
            Route::Direct => self.direct.clone(),
            Route::Through(candidate) => self.relayed_client(candidate)?,
        };

        let resp = client.get(&self.resolver_url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;

        Ok(ResolverResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use std::future::IntoFuture;

    use super::*;

    fn candidate(address: &str, port: u16) -> Candidate {
        Candidate {
            address: address.to_string(),
            port,
            group: "US".to_string(),
            org: "Org".to_string(),
        }
    }

    #[test]
    fn test_proxy_url_per_scheme() {
        let c = candidate("2.2.2.2", 8080);
        assert_eq!(ProxyScheme::Http.proxy_url(&c), "http://2.2.2.2:8080");
        assert_eq!(ProxyScheme::Socks5.proxy_url(&c), "socks5h://2.2.2.2:8080");

        let v6 = candidate("2001:db8::1", 3128);
        assert_eq!(ProxyScheme::Http.proxy_url(&v6), "http://[2001:db8::1]:3128");
    }

    /// Serve `body` on every path; returns the bound address.
    async fn spawn_json_server(body: serde_json::Value) -> std::net::SocketAddr {
        let app = axum::Router::new().fallback(move || {
            let body = body.clone();
            async move { axum::Json(body) }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, app).into_future());
        addr
    }

    #[tokio::test]
    async fn test_direct_route_hits_resolver() {
        let addr = spawn_json_server(serde_json::json!({"ip": "1.1.1.1", "country": "AU"})).await;
        let transport = HttpTransport::new(format!("http://{addr}/"), ProxyScheme::Http).unwrap();

        let resp = transport.fetch(Route::Direct).await.unwrap();
        assert!(resp.is_success());
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["ip"], "1.1.1.1");
    }

    #[tokio::test]
    async fn test_relayed_route_goes_through_candidate() {
        // The candidate is a forward HTTP proxy that answers on behalf of the
        // resolver; the resolver host itself does not exist.
        let proxy_addr =
            spawn_json_server(serde_json::json!({"ip": "2.2.2.2", "country": "US"})).await;
        let transport =
            HttpTransport::new("http://resolver.invalid/", ProxyScheme::Http).unwrap();
        let relay = candidate("127.0.0.1", proxy_addr.port());

        let resp = transport.fetch(Route::Through(&relay)).await.unwrap();
        assert_eq!(resp.status, 200);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["ip"], "2.2.2.2");
    }

    /// One-shot SOCKS5 relay: no-auth handshake, CONNECT to whatever target
    /// is asked for, then answers the tunnelled HTTP request itself with
    /// `body`. Sends the requested target host back over the channel.
    async fn spawn_socks5_relay(
        body: &'static str,
    ) -> (std::net::SocketAddr, tokio::sync::oneshot::Receiver<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();

            let mut greeting = [0u8; 2];
            sock.read_exact(&mut greeting).await.unwrap();
            let mut methods = vec![0u8; usize::from(greeting[1])];
            sock.read_exact(&mut methods).await.unwrap();
            sock.write_all(&[0x05, 0x00]).await.unwrap();

            let mut head = [0u8; 4];
            sock.read_exact(&mut head).await.unwrap();
            assert_eq!(head[..2], [0x05, 0x01], "expected SOCKS5 CONNECT");
            let host = match head[3] {
                0x01 => {
                    let mut ip = [0u8; 4];
                    sock.read_exact(&mut ip).await.unwrap();
                    std::net::Ipv4Addr::from(ip).to_string()
                }
                0x03 => {
                    let len = sock.read_u8().await.unwrap();
                    let mut name = vec![0u8; usize::from(len)];
                    sock.read_exact(&mut name).await.unwrap();
                    String::from_utf8(name).unwrap()
                }
                other => panic!("unexpected address type {other}"),
            };
            let _port = sock.read_u16().await.unwrap();
            sock.write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            let _ = tx.send(host);

            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                assert!(n > 0, "tunnel closed before request was complete");
                request.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });

        (addr, rx)
    }

    #[tokio::test]
    async fn test_socks5_route_resolves_target_at_relay() {
        let (relay_addr, requested_host) =
            spawn_socks5_relay(r#"{"ip":"3.3.3.3","country":"NL"}"#).await;
        let transport =
            HttpTransport::new("http://resolver.invalid/", ProxyScheme::Socks5).unwrap();
        let relay = candidate("127.0.0.1", relay_addr.port());

        let resp = transport.fetch(Route::Through(&relay)).await.unwrap();
        assert_eq!(resp.status, 200);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["ip"], "3.3.3.3");
        // socks5h: the hostname goes to the relay unresolved.
        assert_eq!(requested_host.await.unwrap(), "resolver.invalid");
    }

    #[tokio::test]
    async fn test_dead_candidate_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport =
            HttpTransport::new("http://resolver.invalid/", ProxyScheme::Http).unwrap();
        let relay = candidate("127.0.0.1", port);

        let err = transport.fetch(Route::Through(&relay)).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
    }
}
