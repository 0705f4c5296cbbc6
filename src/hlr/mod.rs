// The HLR side of the gateway: record model, cache, and resolver.

pub mod cache;
pub mod client;
pub mod record;

pub use cache::{CacheError, RecordCache, RedisCache};
pub use client::{HlrClient, HlrError};
pub use record::{Classification, HlrRecord};
