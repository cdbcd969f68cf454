//! HTTP client for the exercise catalog.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{CatalogError, ExerciseCatalog};
use crate::config::UpstreamConfig;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Catalog client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCatalog {
    /// Create a new client with the configured timeout.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, list: &str) -> String {
        format!("{}/exercises/{}", self.base_url, list)
    }

    #[instrument(skip(self))]
    async fn fetch_list(&self, list: &str) -> Result<Vec<String>, CatalogError> {
        let mut request = self.client.get(self.url(list));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let items: Vec<String> = response.json().await?;
        debug!(count = items.len(), "Fetched catalog list");
        Ok(items)
    }
}

#[async_trait]
impl ExerciseCatalog for HttpCatalog {
    async fn body_parts(&self) -> Result<Vec<String>, CatalogError> {
        self.fetch_list("bodyPartList").await
    }

    async fn targets(&self) -> Result<Vec<String>, CatalogError> {
        self.fetch_list("targetList").await
    }

    async fn equipment(&self) -> Result<Vec<String>, CatalogError> {
        self.fetch_list("equipmentList").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let config = UpstreamConfig {
            base_url: "https://catalog.example/".to_string(),
            ..Default::default()
        };
        let catalog = HttpCatalog::new(&config).unwrap();

        assert_eq!(
            catalog.url("bodyPartList"),
            "https://catalog.example/exercises/bodyPartList"
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_request_error() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 500,
            ..Default::default()
        };
        let catalog = HttpCatalog::new(&config).unwrap();

        let result = catalog.body_parts().await;
        assert!(matches!(result, Err(CatalogError::Request(_))));
    }
}
