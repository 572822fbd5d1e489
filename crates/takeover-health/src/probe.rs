//! Liveness probe logic.
//!
//! Performs an HTTP GET against the cluster's liveness endpoint. Only the
//! status code is inspected. `HttpProbe` speaks plain HTTP/1 (a
//! `kubectl proxy`); `ApiServerProbe` talks to the API server itself over
//! TLS with an optional bearer token.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use takeover_core::Status;

/// Something that can tell whether a cluster is alive.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe once. Failures are reported as `Status::Down`, never as errors.
    async fn probe(&self) -> Status;
}

#[async_trait]
impl<P: LivenessProbe + ?Sized> LivenessProbe for Box<P> {
    async fn probe(&self) -> Status {
        (**self).probe().await
    }
}

/// Probes `http://{address}{path}`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    address: String,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(address: &str, path: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            path: path.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self) -> Status {
        http_probe(&self.address, &self.path, self.timeout).await
    }
}

/// Probes `{base_url}{path}` through reqwest: https, bearer token, and
/// optionally self-signed certificates.
#[derive(Debug, Clone)]
pub struct ApiServerProbe {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl ApiServerProbe {
    pub fn new(
        base_url: &str,
        path: &str,
        token: Option<String>,
        accept_invalid_certs: bool,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(timeout)
            .user_agent(concat!("takeover-health/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: format!("{}{path}", base_url.trim_end_matches('/')),
            token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LivenessProbe for ApiServerProbe {
    async fn probe(&self) -> Status {
        let mut req = self.http.get(&self.url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        match req.send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => Status::Up,
            Ok(resp) => {
                warn!(status = %resp.status(), uri = %self.url, "cluster is running in unknown status");
                Status::Down
            }
            Err(e) if e.is_timeout() => {
                warn!(uri = %self.url, "cluster health check timed out");
                Status::Down
            }
            Err(e) => {
                warn!(error = %e, uri = %self.url, "cluster health check failed: request");
                Status::Down
            }
        }
    }
}

/// Perform an HTTP liveness probe against an endpoint.
///
/// Returns `Up` only for a 200 response. Connection errors, timeouts and
/// any other status code are `Down`.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> Status {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, %uri, "cluster health check failed: connect");
                return Status::Down;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, %uri, "cluster health check failed: handshake");
                return Status::Down;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", address)
            .header(
                "user-agent",
                concat!("takeover-health/", env!("CARGO_PKG_VERSION")),
            )
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, %uri, "cluster health check failed: bad request");
                return Status::Down;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status() == http::StatusCode::OK => Status::Up,
            Ok(resp) => {
                warn!(status = %resp.status(), %uri, "cluster is running in unknown status");
                Status::Down
            }
            Err(e) => {
                warn!(error = %e, %uri, "cluster health check failed: request");
                Status::Down
            }
        }
    })
    .await;

    match result {
        Ok(status) => status,
        Err(_) => {
            warn!(%uri, timeout_ms = timeout.as_millis() as u64, "cluster health check timed out");
            Status::Down
        }
    }
}
