use std::time::Duration;

use crate::search::{ReviewDocument, SearchError};

pub struct HttpSearchIndex {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSearchIndex {
    pub fn new(base_url: String) -> Self {
        let timeout_ms = std::env::var("SEARCH_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(3000);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn upsert(&self, document: &ReviewDocument) -> Result<(), SearchError> {
        let url = format!("{}/reviews/{}", self.base_url, document.review_id);
        let response = self.client.put(&url).json(document).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::HttpStatus { status, body });
        }

        Ok(())
    }

    pub async fn delete(&self, review_id: i64) -> Result<(), SearchError> {
        let url = format!("{}/reviews/{}", self.base_url, review_id);
        let response = self.client.delete(&url).send().await?;

        let status = response.status();
        // A document that is already gone is a successful delete.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::HttpStatus { status, body });
        }

        Ok(())
    }
}
