//! KernelCI API client, the sink for pipeline results and the source of
//! node events.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use tracing::{debug, info};

use crate::config::ApiSettings;
use crate::error::{AppError, AppResult};
use crate::models::{Node, NodeEvent, ReportNode};

/// HTTP connect timeout for API requests.
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// API version prefix.
const API_VERSION: &str = "latest";

/// How long one `listen` request may block before it counts as a keep-alive.
const LISTEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Pub/sub channel carrying node changes.
pub const NODE_CHANNEL: &str = "node";

/// Results database operations the runner depends on.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    /// Fetch a node by id.
    async fn get_node(&self, id: &str) -> AppResult<Node>;

    /// Create a node and return it with its assigned id.
    async fn create_node(&self, node: &Node) -> AppResult<Node>;

    /// Submit a report hierarchy below an existing node.
    async fn submit_results(&self, node_id: &str, report: &ReportNode) -> AppResult<()>;

    /// Subscribe to `channel` and return the subscription id.
    async fn subscribe(&self, channel: &str) -> AppResult<String>;

    /// Wait for the next event; `None` for keep-alives.
    async fn listen(&self, subscription: &str) -> AppResult<Option<NodeEvent>>;

    async fn unsubscribe(&self, subscription: &str) -> AppResult<()>;
}

/// `reqwest` based KernelCI API client.
#[derive(Clone)]
pub struct KernelCiClient {
    base_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl KernelCiClient {
    pub fn new(settings: &ApiSettings) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(API_CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let base_url = format!("{}/{}", settings.url.trim_end_matches('/'), API_VERSION);
        info!("KernelCI API client initialized (url={})", base_url);

        Ok(Self {
            base_url,
            token: settings.token.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response, what: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Api(format!("{} failed with {}: {}", what, status, body)))
    }
}

#[async_trait]
impl ResultsSink for KernelCiClient {
    async fn get_node(&self, id: &str) -> AppResult<Node> {
        debug!("Fetching node {}", id);
        let response = self
            .authorized(self.http_client.get(self.url(&format!("node/{}", id))))
            .send()
            .await?;
        let response = Self::check(response, &format!("GET node {}", id)).await?;
        Ok(response.json::<Node>().await?)
    }

    async fn create_node(&self, node: &Node) -> AppResult<Node> {
        debug!("Creating node {} below {:?}", node.name, node.parent);
        let response = self
            .authorized(self.http_client.post(self.url("node")))
            .json(node)
            .send()
            .await?;
        let response = Self::check(response, "POST node").await?;
        let created = response.json::<Node>().await?;
        if created.id.is_none() {
            return Err(AppError::Api("created node has no id".to_string()));
        }
        Ok(created)
    }

    async fn submit_results(&self, node_id: &str, report: &ReportNode) -> AppResult<()> {
        info!(
            "Submitting {} results to node {}: {}",
            report.name(),
            node_id,
            report.counts()
        );
        let response = self
            .authorized(self.http_client.put(self.url(&format!("nodes/{}", node_id))))
            .json(report)
            .send()
            .await?;
        Self::check(response, &format!("PUT nodes {}", node_id)).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> AppResult<String> {
        let response = self
            .authorized(
                self.http_client
                    .post(self.url(&format!("subscribe/{}", channel))),
            )
            .send()
            .await?;
        let response = Self::check(response, &format!("subscribe {}", channel)).await?;
        let body = response.json::<serde_json::Value>().await?;
        let id = match body.get("id") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => {
                return Err(AppError::Api(format!(
                    "subscribe {} returned no id: {}",
                    channel, body
                )));
            }
        };
        info!("Subscribed to {} (id={})", channel, id);
        Ok(id)
    }

    async fn listen(&self, subscription: &str) -> AppResult<Option<NodeEvent>> {
        let result = self
            .authorized(
                self.http_client
                    .get(self.url(&format!("listen/{}", subscription))),
            )
            .timeout(LISTEN_TIMEOUT)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                debug!("No event on subscription {} yet", subscription);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let response = Self::check(response, &format!("listen {}", subscription)).await?;
        let message = response.json::<serde_json::Value>().await?;
        NodeEvent::decode(&message)
    }

    async fn unsubscribe(&self, subscription: &str) -> AppResult<()> {
        let response = self
            .authorized(
                self.http_client
                    .post(self.url(&format!("unsubscribe/{}", subscription))),
            )
            .send()
            .await?;
        Self::check(response, &format!("unsubscribe {}", subscription)).await?;
        info!("Unsubscribed {}", subscription);
        Ok(())
    }
}
