use crate::config::PubsubCredentials;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PubsubAuthError {
    #[error("metadata token request failed: {0}")]
    Request(String),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Bearer token for the publish call, or `None` when the endpoint takes
/// anonymous requests.
pub async fn access_token(
    http: &Client,
    credentials: &PubsubCredentials,
) -> Result<Option<String>, PubsubAuthError> {
    match credentials {
        PubsubCredentials::Anonymous => Ok(None),
        PubsubCredentials::Static(token) => Ok(Some(token.clone())),
        PubsubCredentials::MetadataServer { token_url } => {
            request_token(http, token_url).await.map(Some)
        }
    }
}

async fn request_token(http: &Client, token_url: &str) -> Result<String, PubsubAuthError> {
    let response = http
        .get(token_url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|err| PubsubAuthError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(PubsubAuthError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: TokenResponse = response
        .json()
        .await
        .map_err(|err| PubsubAuthError::Request(err.to_string()))?;
    Ok(payload.access_token)
}
