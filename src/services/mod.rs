//! Service modules for the polling pipeline

pub mod accumulator;
pub mod catalog_client;
pub mod credentials;
pub mod normalizer;
pub mod planner;
pub mod poll_engine;
pub mod release_cache;

pub use accumulator::{AddOutcome, ReleaseAccumulator};
pub use catalog_client::{CatalogAlbum, CatalogClient, CatalogError};
pub use credentials::{
    CredentialError, CredentialReadiness, CredentialSource, HttpCredentialManager,
};
pub use planner::{FetchPlan, FetchStrategy, PlannedFetch};
pub use poll_engine::PollEngine;
pub use release_cache::{CacheSnapshot, ReleaseCache};
