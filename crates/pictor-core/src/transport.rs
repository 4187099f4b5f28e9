//! HTTP transport
//!
//! The one impure collaborator: takes an encoded provider payload and drives
//! the actual HTTP exchange, including the ModelScope submit/poll dance.
//! Everything upstream of it (adapters, decoder, broker) is pure and
//! testable without a network.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::constants;
use crate::error::GenerationError;
use crate::format::{ProviderPayload, RequestFlow};

/// Raw provider answer, handed to the format adapter for decoding
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Bytes,
}

/// Seam between the broker and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange described by the payload and return the body
    /// that should be decoded (for submit/poll flows: the final task body)
    async fn dispatch(&self, payload: &ProviderPayload) -> Result<HttpReply, GenerationError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("Pictor/0.2")
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            // Image synthesis can take minutes on busy upstreams
            .timeout(constants::http::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            });
        Self { http }
    }

    async fn post(&self, payload: &ProviderPayload) -> Result<HttpReply, GenerationError> {
        let mut request = self.http.post(&payload.url);
        for (name, value) in &payload.headers {
            request = request.header(name, value);
        }
        info!("dispatching generation request to {}", payload.url);
        let response = request
            .json(&payload.body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        debug!("provider answered with status {}", status);
        Ok(HttpReply { status, body })
    }

    async fn submit_and_poll(
        &self,
        payload: &ProviderPayload,
        poll_url_base: &str,
        poll_headers: &[(String, String)],
    ) -> Result<HttpReply, GenerationError> {
        let submitted = self.post(payload).await?;
        if !(200..300).contains(&submitted.status) {
            return Ok(submitted);
        }

        let task_id = serde_json::from_slice::<serde_json::Value>(&submitted.body)
            .ok()
            .and_then(|json| json.get("task_id")?.as_str().map(ToString::to_string));
        let Some(task_id) = task_id else {
            // No task id in a 2xx submission; let the decoder surface it
            return Ok(submitted);
        };
        info!("task {} submitted, polling for result", task_id);

        let poll_url = format!("{}/{}", poll_url_base, task_id);
        for attempt in 0..constants::polling::MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(constants::polling::POLL_INTERVAL).await;
            }
            let mut request = self
                .http
                .get(&poll_url)
                .timeout(constants::http::POLL_TIMEOUT);
            for (name, value) in poll_headers {
                request = request.header(name, value);
            }
            let reply = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| GenerationError::Transport(e.to_string()))?;
                    HttpReply { status, body }
                }
                Err(e) => {
                    warn!("task status check failed: {}", e);
                    continue;
                }
            };
            if !(200..300).contains(&reply.status) {
                warn!("task status check returned {}", reply.status);
                continue;
            }
            let task_status = serde_json::from_slice::<serde_json::Value>(&reply.body)
                .ok()
                .and_then(|json| {
                    json.get("task_status")
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string)
                })
                .unwrap_or_else(|| "UNKNOWN".to_string());
            match task_status.as_str() {
                "SUCCEED" | "FAILED" => return Ok(reply),
                other => debug!("task {} still {}", task_id, other),
            }
        }
        Err(GenerationError::Transport(format!(
            "task {} did not settle before the polling deadline",
            task_id
        )))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, payload: &ProviderPayload) -> Result<HttpReply, GenerationError> {
        match &payload.flow {
            RequestFlow::Single => self.post(payload).await,
            RequestFlow::SubmitPoll {
                poll_url_base,
                poll_headers,
            } => {
                self.submit_and_poll(payload, poll_url_base, poll_headers)
                    .await
            }
        }
    }
}
