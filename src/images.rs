use crate::config::ImageConfig;
use crate::http::{build_client, build_client_with_timeout};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },
    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Downloads product imagery and returns it base64-encoded, the form the ERP
/// expects in `image_1920`.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    primary: Client,
    secondary: Client,
    size_suffix: Option<String>,
}

impl ImageFetcher {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            primary: build_client(),
            secondary: build_client_with_timeout(config.download_timeout),
            size_suffix: config.size_suffix.clone(),
        }
    }

    pub fn sized_url(&self, url: &str) -> String {
        match &self.size_suffix {
            Some(suffix) => format!("{}/{suffix}", url.trim_end_matches('/')),
            None => url.to_string(),
        }
    }

    /// Main product image. Any failure is returned to the caller.
    pub async fn fetch_required(&self, url: &str) -> Result<String, ImageError> {
        download(&self.primary, &self.sized_url(url)).await
    }

    /// Variant and gallery images: failures are logged and read as "no image".
    pub async fn fetch_optional(&self, url: &str) -> Option<String> {
        match download(&self.secondary, &self.sized_url(url)).await {
            Ok(encoded) => Some(encoded),
            Err(err) => {
                warn!(target = "sync.images", error = %err, "image_download_skipped");
                None
            }
        }
    }
}

async fn download(http: &Client, url: &str) -> Result<String, ImageError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|err| ImageError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(ImageError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes().await.map_err(|err| ImageError::Download {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    Ok(BASE64.encode(&bytes))
}
