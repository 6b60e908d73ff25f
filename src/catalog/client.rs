use crate::catalog::models::{CatalogProduct, ProductPage};
use crate::config::CatalogConfig;
use crate::http::build_client;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

pub const API_KEY_HEADER: &str = "Catalogiq-Api-Key";

#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("catalog returned HTTP {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            http: build_client(),
        }
    }

    /// Fetches the single product listed at `offset`; `None` means the
    /// offset is past the end of the catalog.
    pub async fn fetch_product(&self, offset: u64) -> Result<Option<CatalogProduct>, CatalogError> {
        let url = format!("{}/api/v1/products", self.base_url);
        let offset = offset.to_string();
        let response = self
            .http
            .get(url)
            .query(&[("offset", offset.as_str()), ("limit", "1")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let page: ProductPage = response
            .json()
            .await
            .map_err(|err| CatalogError::Deserialize(err.to_string()))?;
        debug!(
            target = "sync.catalog",
            offset = %offset,
            results = page.results.len(),
            "catalog_page_fetched"
        );
        Ok(page.results.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CatalogClient {
        CatalogClient::new(&CatalogConfig {
            base_url: server.uri(),
            api_key: "ciq-test".into(),
        })
    }

    #[tokio::test]
    async fn fetch_product_sends_offset_limit_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .and(query_param("offset", "7"))
            .and(query_param("limit", "1"))
            .and(header(API_KEY_HEADER, "ciq-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"name": "Lamp", "main_image": "https://cdn/x", "variants": []}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let product = client_for(&server)
            .fetch_product(7)
            .await
            .expect("fetch")
            .expect("one product");
        assert_eq!(product.name, "Lamp");
    }

    #[tokio::test]
    async fn empty_results_mean_end_of_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let product = client_for(&server).fetch_product(99).await.expect("fetch");
        assert!(product.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_product(0)
            .await
            .expect_err("should fail");
        assert!(matches!(err, CatalogError::Status(401)));
    }
}
