//! Catalog metadata lookup
//!
//! Turns a numeric catalog id into the title the providers are searched
//! with. Only the title is read.

use serde_json::Value;
use thiserror::Error;

use crate::client::HttpClient;
use crate::error::TransportError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog entry {0} not found")]
    NotFound(u64),

    #[error("catalog unavailable: {0}")]
    Unavailable(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: HttpClient,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Title of catalog entry `id`
    ///
    /// Reads `data.title`, falling back to a top-level `title`.
    pub async fn title_for(&self, id: u64) -> Result<String, CatalogError> {
        let url = format!("{}/anime/{}", self.base_url, id);
        let body: Value = match self.http.get_json(&url).await {
            Ok(body) => body,
            Err(TransportError::Status { status: 404, .. }) => {
                return Err(CatalogError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };

        let title = body
            .get("data")
            .and_then(|d| d.get("title"))
            .or_else(|| body.get("title"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match title {
            Some(title) => {
                tracing::debug!(id, title, "catalog title");
                Ok(title.to_string())
            }
            None => Err(CatalogError::NotFound(id)),
        }
    }
}
