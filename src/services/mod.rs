// Service exports
pub mod profile_service;
pub mod source;
pub mod store;

pub use profile_service::{ProfileServiceClient, ProfileServiceCollections, SourceError};
pub use source::{FeatureSource, Fixture, FixtureError, InMemorySource, ProfileSource};
pub use store::{FeatureVectorStore, StoreConfig, StoreStats};
