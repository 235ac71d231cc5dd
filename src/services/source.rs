use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{FeatureVector, Profile, ProfileFilter};

/// Upstream provider of encoded feature vectors
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Single vector, `None` when the user has no vector upstream
    async fn load_feature_vector(&self, user_id: &str) -> Result<Option<FeatureVector>>;

    /// Vectors for the given ids; an empty slice means every vector
    async fn load_feature_vectors_batch(&self, user_ids: &[String]) -> Result<Vec<FeatureVector>>;
}

/// Upstream provider of profile attributes used for fairness
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    async fn load_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>>;
}

/// Errors that can occur when reading a fixture file
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON fixture: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML fixture: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Vectors and profiles bundled for offline runs and tests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub vectors: Vec<FeatureVector>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Fixture {
    /// Load a fixture from a `.json` or `.toml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;

        let fixture = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        Ok(fixture)
    }
}

/// In-process source backed by plain maps
///
/// Keeps insertion order for bulk loads so results are deterministic.
#[derive(Debug, Default)]
pub struct InMemorySource {
    vectors: RwLock<IndexedMap<FeatureVector>>,
    profiles: RwLock<IndexedMap<Profile>>,
}

#[derive(Debug)]
struct IndexedMap<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> Default for IndexedMap<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<T: Clone> IndexedMap<T> {
    fn upsert(&mut self, key: String, value: T) {
        if self.items.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }

    fn remove(&mut self, key: &str) -> Option<T> {
        let removed = self.items.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|k| self.items.get(k))
    }
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut vectors = IndexedMap::default();
        for vector in fixture.vectors {
            vectors.upsert(vector.user_id.clone(), vector);
        }
        let mut profiles = IndexedMap::default();
        for profile in fixture.profiles {
            profiles.upsert(profile.user_id.clone(), profile);
        }

        Self {
            vectors: RwLock::new(vectors),
            profiles: RwLock::new(profiles),
        }
    }

    /// Insert or replace a user's vector
    pub async fn upsert_vector(&self, vector: FeatureVector) {
        self.vectors.write().await.upsert(vector.user_id.clone(), vector);
    }

    pub async fn remove_vector(&self, user_id: &str) -> Option<FeatureVector> {
        self.vectors.write().await.remove(user_id)
    }

    pub async fn upsert_profile(&self, profile: Profile) {
        self.profiles.write().await.upsert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl FeatureSource for InMemorySource {
    async fn load_feature_vector(&self, user_id: &str) -> Result<Option<FeatureVector>> {
        Ok(self.vectors.read().await.items.get(user_id).cloned())
    }

    async fn load_feature_vectors_batch(&self, user_ids: &[String]) -> Result<Vec<FeatureVector>> {
        let vectors = self.vectors.read().await;
        if user_ids.is_empty() {
            return Ok(vectors.values().cloned().collect());
        }
        Ok(user_ids
            .iter()
            .filter_map(|id| vectors.items.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl ProfileSource for InMemorySource {
    async fn load_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.items.get(user_id).cloned())
    }

    async fn load_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .filter(|p| filter.accepts(p))
            .cloned()
            .collect())
    }
}
