use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::error::{MatchingError, Result};
use crate::models::{FeatureVector, Profile, ProfileFilter};
use crate::services::source::{FeatureSource, ProfileSource};

/// Errors that can occur when talking to the profile service
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Absence is signalled by an empty result, never by a status code
impl From<SourceError> for MatchingError {
    fn from(err: SourceError) -> Self {
        MatchingError::DataUnavailable(err.to_string())
    }
}

/// Collection names on the profile service
#[derive(Debug, Clone)]
pub struct ProfileServiceCollections {
    pub feature_vectors: String,
    pub profiles: String,
}

impl Default for ProfileServiceCollections {
    fn default() -> Self {
        Self {
            feature_vectors: "feature_vectors".to_string(),
            profiles: "mentorship_profiles".to_string(),
        }
    }
}

/// Documents requested per page unless overridden
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Document-store client for feature vectors and profiles
///
/// Responses use the `{ "documents": [...], "total": n }` envelope; each
/// document carries its payload either inline or under `data`. Listings are
/// paged with `limit`/`offset` queries until `total` documents have arrived.
pub struct ProfileServiceClient {
    base_url: String,
    api_key: String,
    database_id: String,
    client: Client,
    collections: ProfileServiceCollections,
    page_size: usize,
}

/// One page of a collection listing
struct DocumentPage<T> {
    documents: Vec<T>,
    total: Option<usize>,
}

impl ProfileServiceClient {
    pub fn new(
        base_url: String,
        api_key: String,
        database_id: String,
        collections: ProfileServiceCollections,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            database_id,
            client,
            collections,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        )
    }

    /// Fetch and decode every document matching `queries`, across all pages
    ///
    /// Fails when the service reports more documents than it hands out, so a
    /// caller never caches a truncated listing.
    async fn query_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<Vec<T>, SourceError> {
        let mut documents: Vec<T> = Vec::new();

        loop {
            let mut page_queries = queries.to_vec();
            page_queries.push(format!("limit({})", self.page_size));
            page_queries.push(format!("offset({})", documents.len()));

            let page: DocumentPage<T> = self.query_page(collection, &page_queries).await?;
            let fetched = page.documents.len();
            documents.extend(page.documents);

            let done = match page.total {
                Some(total) if documents.len() >= total => true,
                Some(total) if fetched == 0 => {
                    return Err(SourceError::InvalidResponse(format!(
                        "{} listed {} of {} documents",
                        collection,
                        documents.len(),
                        total
                    )));
                }
                Some(_) => false,
                None => fetched < self.page_size,
            };
            if done {
                break;
            }
        }

        tracing::debug!("Fetched {} {} documents", documents.len(), collection);
        Ok(documents)
    }

    async fn query_page<T: DeserializeOwned>(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<DocumentPage<T>, SourceError> {
        let queries_json = serde_json::to_string(queries)
            .map_err(|e| SourceError::InvalidResponse(format!("Failed to encode query: {}", e)))?;
        let url = format!(
            "{}?query={}",
            self.documents_url(collection),
            urlencoding::encode(&queries_json)
        );

        tracing::debug!("Querying {} documents: {}", collection, url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::ApiError(format!("Collection {} not found", collection)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Query on {} failed: {} - {}", collection, status, body);
            return Err(SourceError::ApiError(format!("Failed to query {}: {}", collection, status)));
        }

        let json: Value = response.json().await?;

        let total = json
            .get("total")
            .and_then(|t| t.as_u64())
            .map(|t| t as usize);
        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| SourceError::InvalidResponse("Missing documents array".into()))?
            .iter()
            .map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                serde_json::from_value(data.clone()).map_err(|e| {
                    SourceError::InvalidResponse(format!("Failed to parse {} document: {}", collection, e))
                })
            })
            .collect::<Result<Vec<T>, SourceError>>()?;

        Ok(DocumentPage { documents, total })
    }

    pub async fn fetch_vectors(&self, user_ids: &[String]) -> Result<Vec<FeatureVector>, SourceError> {
        let queries = user_id_queries(user_ids);
        self.query_documents(&self.collections.feature_vectors, &queries).await
    }

    pub async fn fetch_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, SourceError> {
        let mut queries = user_id_queries(&filter.user_ids);
        if let Some(user_type) = filter.user_type {
            queries.push(format!("equal(\"userType\", [\"{}\"])", user_type));
        }
        self.query_documents(&self.collections.profiles, &queries).await
    }
}

fn user_id_queries(user_ids: &[String]) -> Vec<String> {
    if user_ids.is_empty() {
        return Vec::new();
    }
    let ids = user_ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    vec![format!("equal(\"userId\", [{}])", ids)]
}

#[async_trait]
impl FeatureSource for ProfileServiceClient {
    async fn load_feature_vector(&self, user_id: &str) -> Result<Option<FeatureVector>> {
        let vectors = self.fetch_vectors(&[user_id.to_string()]).await?;
        Ok(vectors.into_iter().find(|v| v.user_id == user_id))
    }

    async fn load_feature_vectors_batch(&self, user_ids: &[String]) -> Result<Vec<FeatureVector>> {
        Ok(self.fetch_vectors(user_ids).await?)
    }
}

#[async_trait]
impl ProfileSource for ProfileServiceClient {
    async fn load_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let filter = ProfileFilter {
            user_type: None,
            user_ids: vec![user_id.to_string()],
        };
        let profiles = self.fetch_profiles(&filter).await?;
        Ok(profiles.into_iter().find(|p| p.user_id == user_id))
    }

    async fn load_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>> {
        Ok(self.fetch_profiles(filter).await?)
    }
}
