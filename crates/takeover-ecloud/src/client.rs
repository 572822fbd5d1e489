//! EcloudClient — signed calls to the Kubernetes-service node API.

use std::collections::BTreeMap;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use takeover_core::config::EcloudConfig;
use takeover_core::{Infrastructure, NodeList};

use crate::error::{EcloudError, EcloudResult};
use crate::sign::Signer;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const STATE_OK: &str = "OK";

/// Client for one ecloud endpoint and one credential pair.
#[derive(Debug, Clone)]
pub struct EcloudClient {
    http: reqwest::Client,
    endpoint: String,
    signer: Signer,
}

#[derive(Debug, Serialize)]
struct AddNodeRequest<'a> {
    #[serde(rename = "addType")]
    add_type: &'static str,
    cluster_id: &'a str,
    infrastructure: &'a Infrastructure,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeResponse {
    request_id: String,
    state: String,
    body: NodeList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AddNodeResponse {
    request_id: String,
    state: String,
    error_code: String,
    error_message: String,
}

impl EcloudClient {
    /// Client for `https://{host}`. Host and both keys are required.
    pub fn new(host: &str, access_key: &str, secret_key: &str) -> EcloudResult<Self> {
        if host.is_empty() {
            return Err(EcloudError::Config("host is empty".to_string()));
        }
        if access_key.is_empty() {
            return Err(EcloudError::Config("access_key is empty".to_string()));
        }
        if secret_key.is_empty() {
            return Err(EcloudError::Config("secret_key is empty".to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: format!("https://{host}"),
            signer: Signer::new(access_key, secret_key),
        })
    }

    pub fn from_config(config: &EcloudConfig) -> EcloudResult<Self> {
        Self::new(&config.host, &config.access_key, &config.secret_key)
    }

    /// Point the client at another base URL, scheme included.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a signed request. `path` is what gets signed; the endpoint
    /// is not part of the signature.
    pub fn signed_request(
        &self,
        method: Method,
        path: &str,
        mut query: BTreeMap<String, String>,
    ) -> EcloudResult<reqwest::RequestBuilder> {
        self.signer.sign(method.as_str(), path, &mut query)?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.endpoint))
            .header(CONTENT_TYPE, "application/json")
            .query(&query))
    }

    /// List a cluster's nodes. Pages default to 1 and 100.
    pub async fn nodes(
        &self,
        cluster: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> EcloudResult<NodeList> {
        let query = BTreeMap::from([
            ("page".to_string(), page.unwrap_or(DEFAULT_PAGE).to_string()),
            (
                "pageSize".to_string(),
                page_size.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
            ),
        ]);
        let path = nodes_path(cluster);
        let req = self.signed_request(Method::GET, &path, query)?.build()?;
        debug!(url = %req.url(), "GET");

        let resp = check_status(self.http.execute(req).await?)?;
        let parsed: NodeResponse = resp
            .json()
            .await
            .map_err(|e| EcloudError::Decode(e.to_string()))?;

        if parsed.state != STATE_OK {
            warn!(request_id = %parsed.request_id, state = %parsed.state, "unexpected node list state");
        }
        info!(
            request_id = %parsed.request_id,
            state = %parsed.state,
            cluster,
            total = parsed.body.total,
            "listed cluster nodes"
        );
        Ok(parsed.body)
    }

    /// Request one new node shaped like `infrastructure`.
    pub async fn add_node(&self, cluster: &str, infrastructure: &Infrastructure) -> EcloudResult<()> {
        let payload = AddNodeRequest {
            add_type: "new",
            cluster_id: cluster,
            infrastructure,
        };
        let path = nodes_path(cluster);
        let req = self
            .signed_request(Method::POST, &path, BTreeMap::new())?
            .json(&payload)
            .build()?;
        debug!(url = %req.url(), "POST");

        let resp = check_status(self.http.execute(req).await?)?;
        let parsed: AddNodeResponse = resp
            .json()
            .await
            .map_err(|e| EcloudError::Decode(e.to_string()))?;

        if parsed.state != STATE_OK {
            return Err(EcloudError::Api {
                request_id: parsed.request_id,
                code: parsed.error_code,
                message: parsed.error_message,
            });
        }
        info!(request_id = %parsed.request_id, cluster, "node add accepted");
        Ok(())
    }
}

fn nodes_path(cluster: &str) -> String {
    format!("/api/kcs/v2/clusters/{cluster}/nodes")
}

fn check_status(resp: reqwest::Response) -> EcloudResult<reqwest::Response> {
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        return Err(EcloudError::Status(status.as_u16()));
    }
    Ok(resp)
}
