mod http;

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use http::HttpSearchIndex;

/// Denormalized review snapshot mirrored into the full-text index. Only the
/// write contract lives here; querying and relevance belong to the index
/// service itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDocument {
    pub review_id: i64,
    pub contents: String,
    pub rating: i32,
    pub like_count: i32,
    pub is_display: bool,
    pub state: String,
    pub created_at: String,
    pub tag: String,

    pub user_id: i64,
    pub nickname: String,
    pub user_is_blinded: i32,

    pub product_id: i64,
    pub product_name: String,
    pub brand_name: Option<String>,
    pub product_is_display: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goods_info: Option<GoodsDocumentInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsDocumentInfo {
    pub goods_count: i32,
    pub min_price: i32,
    pub max_price: i32,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("search index returned {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Write-side client for the full-text index. Out-of-band failures are
/// logged by callers, never surfaced to the review writer.
pub enum SearchIndex {
    Http(HttpSearchIndex),
    Memory(MemorySearchIndex),
    Disabled,
}

impl SearchIndex {
    pub fn from_env() -> Self {
        match std::env::var("SEARCH_URL").ok().filter(|v| !v.trim().is_empty()) {
            Some(url) => SearchIndex::Http(HttpSearchIndex::new(url)),
            None => {
                debug!("SEARCH_URL not set, search index sync disabled");
                SearchIndex::Disabled
            }
        }
    }

    pub fn memory() -> Self {
        SearchIndex::Memory(MemorySearchIndex::new())
    }

    pub async fn upsert(&self, document: &ReviewDocument) -> Result<(), SearchError> {
        match self {
            SearchIndex::Http(index) => index.upsert(document).await,
            SearchIndex::Memory(index) => {
                index.upsert(document);
                Ok(())
            }
            SearchIndex::Disabled => Ok(()),
        }
    }

    pub async fn delete(&self, review_id: i64) -> Result<(), SearchError> {
        match self {
            SearchIndex::Http(index) => index.delete(review_id).await,
            SearchIndex::Memory(index) => {
                index.delete(review_id);
                Ok(())
            }
            SearchIndex::Disabled => Ok(()),
        }
    }
}

/// Test double recording the documents it was given.
#[derive(Default)]
pub struct MemorySearchIndex {
    documents: Mutex<HashMap<i64, ReviewDocument>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, document: &ReviewDocument) {
        self.documents
            .lock()
            .insert(document.review_id, document.clone());
    }

    pub fn delete(&self, review_id: i64) {
        self.documents.lock().remove(&review_id);
    }

    pub fn get(&self, review_id: i64) -> Option<ReviewDocument> {
        self.documents.lock().get(&review_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}
