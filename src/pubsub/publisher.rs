use crate::config::{PubsubConfig, PubsubCredentials};
use crate::http::build_client;
use crate::pubsub::auth::access_token;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use urlencoding::encode;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("pubsub credentials unavailable: {0}")]
    Credentials(String),
    #[error("publish request failed: {0}")]
    Request(String),
    #[error("publish returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct Publisher {
    endpoint: String,
    topic_path: String,
    credentials: PubsubCredentials,
    http: Client,
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Message that schedules the offset after `current`. The offset travels as
/// a string.
pub fn continuation_payload(current: u64) -> Value {
    json!({ "offset": (current + 1).to_string() })
}

impl Publisher {
    pub fn new(config: &PubsubConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            topic_path: format!(
                "projects/{}/topics/{}",
                encode(&config.project),
                encode(&config.topic)
            ),
            credentials: config.credentials.clone(),
            http: build_client(),
        }
    }

    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }

    /// Publishes the continuation for `current_offset` and returns the
    /// server-assigned message id.
    pub async fn publish_next(&self, current_offset: u64) -> Result<String, PublishError> {
        let payload = continuation_payload(current_offset);
        let body = PublishRequest {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(payload.to_string()),
            }],
        };

        let token = access_token(&self.http, &self.credentials)
            .await
            .map_err(|err| PublishError::Credentials(err.to_string()))?;

        let url = format!("{}/v1/{}:publish", self.endpoint, self.topic_path);
        let mut request = self.http.post(url).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| PublishError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PublishError::Status(response.status().as_u16()));
        }

        let published: PublishResponse = response
            .json()
            .await
            .map_err(|err| PublishError::Request(err.to_string()))?;
        let message_id = published.message_ids.into_iter().next().unwrap_or_default();
        info!(
            target = "sync.pubsub",
            topic = %self.topic_path,
            next_offset = current_offset + 1,
            message_id = %message_id,
            "continuation_published"
        );
        Ok(message_id)
    }
}
