// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for cache lookups.
#[derive(Debug, Default)]
pub struct CacheStats {
	hits: AtomicU64,
	misses: AtomicU64,
	evictions: AtomicU64,
}
impl CacheStats {
	/// Returns the number of lookups that returned a live entry.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that returned nothing (including evictions).
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	/// Returns the number of entries removed because they were observed expired or invalid.
	pub fn evictions(&self) -> u64 {
		self.evictions.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_eviction(&self) {
		self.evictions.fetch_add(1, Ordering::Relaxed);
	}
}
