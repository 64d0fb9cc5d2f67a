//! Result caching for vector search.

mod cache;

pub use cache::{CacheMetrics, VectorCacheKey, VectorResultCache};
