/*!
# Scout Bounded Cache

Generic key→value cache with TTL expiry, accurate recursive size
accounting, and LRU eviction under a byte ceiling.

Entry sizes are computed once at insert by a cycle-safe [`DeepSize`]
estimator that charges shared heap objects only once. The running total
of live bytes never exceeds the configured ceiling after any operation:
eviction runs immediately after every insert, in recency order.

All mutating operations serialize under a single lock scoped to the cache
instance. Every operation is in-memory and O(1) amortized, so the lock is
never held across I/O.
*/

mod cache;
mod size;

pub use cache::{BoundedCache, CacheStats};
pub use size::{deep_size_of, DeepSize, SizeSeen};
