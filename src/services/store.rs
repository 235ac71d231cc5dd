use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{MatchingError, Result};
use crate::models::FeatureVector;
use crate::services::source::FeatureSource;

/// Default age after which the cache is bulk-refreshed
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_CACHE_TTL }
    }
}

/// One immutable snapshot of the cache
///
/// Readers hold an `Arc` to a generation; writers build a new generation and
/// swap it in, so nobody ever sees a half-populated map.
#[derive(Debug, Default)]
struct CacheGeneration {
    generation: u64,
    refreshed_at: Option<Instant>,
    refreshed_wall: Option<DateTime<Utc>>,
    order: Vec<String>,
    /// Invalidated ids; they keep their slot in `order` until reloaded
    evicted: HashSet<String>,
    vectors: HashMap<String, Arc<FeatureVector>>,
}

impl CacheGeneration {
    fn is_stale(&self, ttl: Duration) -> bool {
        match self.refreshed_at {
            None => true,
            Some(at) => self.vectors.is_empty() || at.elapsed() > ttl,
        }
    }

    /// Copy with the given entries inserted or replaced
    fn with_vectors<I>(&self, generation: u64, incoming: I) -> Self
    where
        I: IntoIterator<Item = Arc<FeatureVector>>,
    {
        let mut order = self.order.clone();
        let mut evicted = self.evicted.clone();
        let mut vectors = self.vectors.clone();
        for vector in incoming {
            let user_id = vector.user_id.clone();
            let reinstated = evicted.remove(&user_id);
            if vectors.insert(user_id.clone(), vector).is_none() && !reinstated {
                order.push(user_id);
            }
        }
        Self {
            generation,
            refreshed_at: self.refreshed_at,
            refreshed_wall: self.refreshed_wall,
            order,
            evicted,
            vectors,
        }
    }

    /// Copy with reloaded entries merged and evicted ids that vanished upstream dropped
    fn restored<I>(&self, generation: u64, incoming: I, requested: &[String]) -> Self
    where
        I: IntoIterator<Item = Arc<FeatureVector>>,
    {
        let mut next = self.with_vectors(generation, incoming);
        let gone: Vec<String> = requested
            .iter()
            .filter(|id| next.evicted.remove(*id))
            .cloned()
            .collect();
        if !gone.is_empty() {
            next.order.retain(|id| !gone.contains(id));
        }
        next
    }

    /// Copy with one entry evicted
    fn without(&self, generation: u64, user_id: &str) -> Self {
        let mut vectors = self.vectors.clone();
        vectors.remove(user_id);
        let mut evicted = self.evicted.clone();
        evicted.insert(user_id.to_string());
        Self {
            generation,
            refreshed_at: self.refreshed_at,
            refreshed_wall: self.refreshed_wall,
            order: self.order.clone(),
            evicted,
            vectors,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub entries: usize,
    pub generation: u64,
    pub age_secs: Option<f64>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Time-bounded cache of feature vectors in front of a [`FeatureSource`]
///
/// Cache age counts from the last successful bulk refresh. A refresh is all or
/// nothing: on failure the previous generation stays in place and the error is
/// returned. Two callers that both see a stale cache may both refresh; the last
/// swap wins.
pub struct FeatureVectorStore {
    source: Arc<dyn FeatureSource>,
    config: StoreConfig,
    current: RwLock<Arc<CacheGeneration>>,
}

impl FeatureVectorStore {
    pub fn new(source: Arc<dyn FeatureSource>, config: StoreConfig) -> Self {
        Self {
            source,
            config,
            current: RwLock::new(Arc::new(CacheGeneration::default())),
        }
    }

    async fn snapshot(&self) -> Arc<CacheGeneration> {
        self.current.read().await.clone()
    }

    /// Current generation, refreshed first when stale or empty
    async fn fresh_snapshot(&self) -> Result<Arc<CacheGeneration>> {
        let snapshot = self.snapshot().await;
        if !snapshot.is_stale(self.config.ttl) {
            return Ok(snapshot);
        }
        self.reload().await
    }

    /// Reload every vector from the source and swap the cache
    pub async fn refresh(&self) -> Result<()> {
        self.reload().await.map(|_| ())
    }

    async fn reload(&self) -> Result<Arc<CacheGeneration>> {
        let started = Instant::now();
        let loaded = self.source.load_feature_vectors_batch(&[]).await.map_err(|e| {
            tracing::warn!("Feature vector refresh failed, keeping previous cache: {}", e);
            e
        })?;

        let mut order = Vec::with_capacity(loaded.len());
        let mut vectors = HashMap::with_capacity(loaded.len());
        for vector in loaded {
            let user_id = vector.user_id.clone();
            if vectors.insert(user_id.clone(), Arc::new(vector)).is_none() {
                order.push(user_id);
            }
        }

        let mut current = self.current.write().await;
        let next = Arc::new(CacheGeneration {
            generation: current.generation + 1,
            refreshed_at: Some(Instant::now()),
            refreshed_wall: Some(Utc::now()),
            order,
            evicted: HashSet::new(),
            vectors,
        });
        *current = next.clone();
        drop(current);

        tracing::debug!(
            "Refreshed feature vector cache: {} vectors, generation {} ({:?})",
            next.vectors.len(),
            next.generation,
            started.elapsed()
        );

        Ok(next)
    }

    /// Swap in a generation derived from the current one
    async fn update<F>(&self, derive: F) -> Arc<CacheGeneration>
    where
        F: FnOnce(&CacheGeneration, u64) -> Option<CacheGeneration>,
    {
        let mut current = self.current.write().await;
        if let Some(next) = derive(&current, current.generation + 1) {
            *current = Arc::new(next);
        }
        current.clone()
    }

    /// Vector for one user
    pub async fn get(&self, user_id: &str) -> Result<Arc<FeatureVector>> {
        let snapshot = self.fresh_snapshot().await?;
        if let Some(vector) = snapshot.vectors.get(user_id) {
            tracing::trace!("Vector cache hit: {}", user_id);
            return Ok(vector.clone());
        }

        tracing::trace!("Vector cache miss: {}", user_id);
        let vector = self
            .source
            .load_feature_vector(user_id)
            .await?
            .map(Arc::new)
            .ok_or_else(|| MatchingError::NotFound(format!("feature vector for user {}", user_id)))?;

        let inserted = vector.clone();
        self.update(move |current, generation| {
            Some(current.with_vectors(generation, [inserted]))
        })
        .await;

        Ok(vector)
    }

    /// Vectors for the given users, or every cached vector when `user_ids` is empty
    ///
    /// Ids that are unknown upstream are skipped; results follow request order.
    pub async fn get_batch(&self, user_ids: &[String]) -> Result<Vec<Arc<FeatureVector>>> {
        let mut snapshot = self.fresh_snapshot().await?;

        if user_ids.is_empty() {
            if !snapshot.evicted.is_empty() {
                let evicted: Vec<String> = snapshot.evicted.iter().cloned().collect();
                let loaded = self.source.load_feature_vectors_batch(&evicted).await?;
                tracing::debug!("Reloaded {} of {} invalidated vectors", loaded.len(), evicted.len());
                snapshot = self
                    .update(move |current, generation| {
                        Some(current.restored(generation, loaded.into_iter().map(Arc::new), &evicted))
                    })
                    .await;
            }
            return Ok(snapshot
                .order
                .iter()
                .filter_map(|id| snapshot.vectors.get(id).cloned())
                .collect());
        }

        let mut seen = HashSet::new();
        let missing: Vec<String> = user_ids
            .iter()
            .filter(|id| !snapshot.vectors.contains_key(*id) && seen.insert(id.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let loaded = self.source.load_feature_vectors_batch(&missing).await?;
            tracing::debug!("Loaded {} of {} uncached vectors", loaded.len(), missing.len());
            if !loaded.is_empty() {
                snapshot = self
                    .update(move |current, generation| {
                        Some(current.with_vectors(generation, loaded.into_iter().map(Arc::new)))
                    })
                    .await;
            }
        }

        Ok(user_ids
            .iter()
            .filter_map(|id| snapshot.vectors.get(id).cloned())
            .collect())
    }

    /// Drop one user's vector so the next access reloads it
    pub async fn invalidate(&self, user_id: &str) {
        self.update(|current, generation| {
            current
                .vectors
                .contains_key(user_id)
                .then(|| current.without(generation, user_id))
        })
        .await;
        tracing::debug!("Invalidated feature vector: {}", user_id);
    }

    pub async fn stats(&self) -> StoreStats {
        let snapshot = self.snapshot().await;
        StoreStats {
            entries: snapshot.vectors.len(),
            generation: snapshot.generation,
            age_secs: snapshot.refreshed_at.map(|at| at.elapsed().as_secs_f64()),
            last_refreshed: snapshot.refreshed_wall,
        }
    }
}
