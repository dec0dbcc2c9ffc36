//! Time-bounded memoization for expensive upstream reads
//!
//! Each cached operation gets its own [`TtlCache`] with an independent TTL and
//! capacity. The caches are grouped in a [`CacheRegistry`] built once at
//! startup from the configured policies.

mod registry;
mod ttl;

pub use registry::{CacheRegistry, CachedOperation};
pub use ttl::{CachePolicy, TtlCache};
