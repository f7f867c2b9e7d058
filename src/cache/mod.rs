mod persistent;
mod policy;
mod repository;
mod resolution;
mod store;
mod time;

use thiserror::Error;

pub use persistent::PersistentModuleCache;
pub use policy::{
    CacheEntryKind, CachePolicy, Freshness, DEFAULT_CHANGING_MODULE_TTL,
    DEFAULT_DYNAMIC_VERSION_TTL, DEFAULT_MISSING_MODULE_TTL, DEFAULT_MODULE_TTL,
};
pub use repository::CachingModuleComponentRepository;
pub use resolution::{
    ResolutionCache, ResolutionCacheStatistics, DEFAULT_ENTRY_TTL, DEFAULT_MAX_ENTRIES,
};
pub use store::{
    CachedMetadata, CachedModuleVersionList, InMemoryModuleCache, ModuleMetadataCache,
    DEFAULT_MODULE_CACHE_ENTRIES,
};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache location {location} is not a directory")]
    BadLocation { location: String },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Could not serialize cache entry: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Could not persist cache entry: {0}")]
    Persist(#[from] tempfile::PersistError),
}
