//! reqwest-backed IKS API client
//!
//! Thin transport layer: URL construction, authorization header, verb
//! specific accepted status codes, and the HTTP status to
//! [`FailureKind`] mapping. Caching is the registry's responsibility and
//! retry policy is the caller's, with one exception: a collaborator
//! supplied [`ReauthHandler`] may replace a rejected token, which retries
//! that single call once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::types::{ClusterSnapshot, NodeGroupSnapshot, ResizeRequest};
use super::{DenyReauth, FailureKind, GatewayError, NodeGroupGateway, ReauthHandler};
use crate::config::CloudConfig;

/// Client for the IKS control API.
pub struct IksApiClient {
    http: reqwest::Client,
    /// Base URL of the API, without a trailing slash.
    endpoint: String,
    /// Authorization token, shared so a re-auth handler can replace it.
    token: RwLock<String>,
    reauth: Arc<dyn ReauthHandler>,
    /// Optional shutdown signal; a pending call fails fast with
    /// `Cancelled` when it fires.
    shutdown: Option<watch::Receiver<bool>>,
}

impl IksApiClient {
    /// Creates a client from the cloud configuration.
    pub fn new(config: &CloudConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport {
                url: config.api_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: config.api_url.trim_end_matches('/').to_string(),
            token: RwLock::new(config.token.clone().unwrap_or_default()),
            reauth: Arc::new(DenyReauth),
            shutdown: None,
        })
    }

    /// Installs a re-authentication handler.
    pub fn with_reauth_handler(mut self, handler: Arc<dyn ReauthHandler>) -> Self {
        self.reauth = handler;
        self
    }

    /// Installs a shutdown signal for cancelling in-flight calls.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replaces the authorization token.
    pub async fn set_token(&self, token: String) {
        *self.token.write().await = token;
    }

    /// Constructs a URL for a resource below the API endpoint.
    fn service_url(&self, parts: &[&str]) -> String {
        format!("{}/{}", self.endpoint, parts.join("/"))
    }

    /// Accepted status codes per verb. Anything else is a failure for
    /// that verb, even when not in the explicit mapping table.
    fn accepted_statuses(method: &Method) -> &'static [u16] {
        match method.as_str() {
            "GET" => &[200],
            "POST" => &[201, 202],
            "PUT" => &[201, 202],
            "PATCH" => &[200, 202, 204],
            "DELETE" => &[202, 204],
            _ => &[],
        }
    }

    /// Issues one request without consulting the re-auth handler.
    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");

        let token = self.token.read().await.clone();
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let send = request.send();
        let response = match &self.shutdown {
            Some(rx) => {
                let mut rx = rx.clone();
                // Biased so an already-fired stop wins over a racing
                // transport result.
                tokio::select! {
                    biased;
                    _ = rx.wait_for(|stop| *stop) => return Err(GatewayError::Cancelled),
                    response = send => response,
                }
            }
            None => send.await,
        };

        response.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    url: url.to_string(),
                }
            } else {
                GatewayError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Issues a request and decodes the JSON response body.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let accepted = Self::accepted_statuses(&method);
        let mut reauth_attempted = false;

        loop {
            let response = self.send_once(&method, &url, body.as_ref()).await?;
            let status = response.status().as_u16();

            if accepted.contains(&status) {
                return response.json::<T>().await.map_err(|e| GatewayError::Transport {
                    url: url.clone(),
                    message: format!("invalid response body: {e}"),
                });
            }

            let kind = FailureKind::from_status(status);
            if kind == FailureKind::Unauthorized && !reauth_attempted {
                reauth_attempted = true;
                if let Some(token) = self.reauth.replacement_token().await {
                    debug!(url = %url, "installing replacement token after 401");
                    self.set_token(token).await;
                    continue;
                }
            }

            return Err(GatewayError::Api {
                kind,
                status,
                method: method.to_string(),
                url,
            });
        }
    }

    /// Fetches a cluster by id or name.
    pub async fn fetch_cluster(&self, cluster_id: &str) -> Result<ClusterSnapshot, GatewayError> {
        let url = self.service_url(&["k8s", "clusters", cluster_id]);
        self.request_json(Method::GET, url, None).await
    }
}

#[async_trait]
impl NodeGroupGateway for IksApiClient {
    async fn fetch_group(&self, remote_id: &str) -> Result<NodeGroupSnapshot, GatewayError> {
        let url = self.service_url(&["k8s", "node_groups", remote_id]);
        self.request_json(Method::GET, url, None).await
    }

    async fn resize(
        &self,
        remote_id: &str,
        new_count: u32,
        victims: &[String],
    ) -> Result<NodeGroupSnapshot, GatewayError> {
        let url = self.service_url(&["k8s", "node_groups", remote_id, "resize"]);
        let request = ResizeRequest {
            node_count: new_count,
            nodes_to_remove: victims.to_vec(),
            nodegroup: remote_id.to_string(),
        };
        let body = serde_json::to_value(&request).map_err(|e| GatewayError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        self.request_json(Method::POST, url, Some(body)).await
    }

    async fn list_groups_for_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<NodeGroupSnapshot>, GatewayError> {
        let url = self.service_url(&["k8s", "clusters", cluster_id, "node_groups"]);
        self.request_json(Method::GET, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CloudConfig {
        CloudConfig {
            api_url: "https://iks.example.com/api/".to_string(),
            region: None,
            token: Some("token-abc".to_string()),
            secret_name: None,
            secret_namespace: None,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_service_url_joins_segments() {
        let client = IksApiClient::new(&test_config()).unwrap();
        assert_eq!(
            client.service_url(&["k8s", "node_groups", "ng-1"]),
            "https://iks.example.com/api/k8s/node_groups/ng-1"
        );
    }

    #[test]
    fn test_accepted_statuses_per_verb() {
        assert_eq!(IksApiClient::accepted_statuses(&Method::GET), &[200]);
        assert_eq!(IksApiClient::accepted_statuses(&Method::POST), &[201, 202]);
        assert_eq!(IksApiClient::accepted_statuses(&Method::PUT), &[201, 202]);
        assert_eq!(
            IksApiClient::accepted_statuses(&Method::PATCH),
            &[200, 202, 204]
        );
        assert_eq!(
            IksApiClient::accepted_statuses(&Method::DELETE),
            &[202, 204]
        );
    }

    #[test]
    fn test_success_like_status_rejected_for_wrong_verb() {
        // 201 is success-like, but a GET answering 201 is still a failure.
        assert!(!IksApiClient::accepted_statuses(&Method::GET).contains(&201));
        assert!(!IksApiClient::accepted_statuses(&Method::POST).contains(&200));
        assert!(!IksApiClient::accepted_statuses(&Method::DELETE).contains(&200));
    }

    #[tokio::test]
    async fn test_set_token_replaces_token() {
        let client = IksApiClient::new(&test_config()).unwrap();
        client.set_token("token-new".to_string()).await;
        assert_eq!(*client.token.read().await, "token-new");
    }

    #[tokio::test]
    async fn test_fired_shutdown_cancels_in_flight_call() {
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();

        // Non-routable address: the connect attempt stays pending while
        // the already-fired shutdown signal resolves immediately.
        let mut config = test_config();
        config.api_url = "http://10.255.255.1:81".to_string();

        let client = IksApiClient::new(&config).unwrap().with_shutdown(stop_rx);
        let err = client.fetch_group("ng-1").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Cancelled);
    }
}
