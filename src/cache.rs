//! Category-partitioned TTL cache shared by the client-credential flows and the guard.
//!
//! Each [`Category`] lives behind its own [`RwLock`]. Reads take the shared lock; when a read
//! observes an expired (or otherwise invalid) entry it re-acquires the partition exclusively,
//! re-checks the entry, and only then evicts it, so a value stored concurrently by another task
//! is never removed by a stale observation.
//!
//! Explicit removals ([`TtlCache::forget`], [`TtlCache::forget_where`], [`TtlCache::clear`])
//! bump the category's generation. A writer that read the generation before a slow fetch can
//! store its result with [`TtlCache::set_if_current`], which drops the write if anything was
//! removed in between.

mod entry;
mod metrics;

pub use entry::CacheEntry;
pub use metrics::CacheStats;

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	obs::{self, CacheOutcome},
};

type Partition<V> = RwLock<HashMap<String, CacheEntry<V>>>;

/// Disjoint key spaces inside a [`TtlCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	/// Client tokens keyed by canonical scope string.
	Client,
	/// Introspection results keyed by raw bearer token.
	Server,
}
impl Category {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Category::Client => "client",
			Category::Server => "server",
		}
	}
}
impl Display for Category {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// In-process key/value cache with per-entry expiry and read-time eviction.
///
/// None of the operations fail. While the cache is disabled every read misses and every write
/// is dropped, but stored entries are kept and become visible again once re-enabled. The enabled
/// flag belongs to the cache, so every handle sharing one instance shares the flag.
pub struct TtlCache<V> {
	client: Partition<V>,
	server: Partition<V>,
	generations: [AtomicU64; 2],
	enabled: AtomicBool,
	stats: CacheStats,
}
impl<V> TtlCache<V>
where
	V: Clone,
{
	/// Creates an empty, enabled cache.
	pub fn new() -> Self {
		Self {
			client: Default::default(),
			server: Default::default(),
			generations: Default::default(),
			enabled: AtomicBool::new(true),
			stats: Default::default(),
		}
	}

	/// Returns the live value stored under `key`, evicting it if it has expired.
	pub fn get(&self, category: Category, key: &str) -> Option<V> {
		self.lookup(category, key, OffsetDateTime::now_utc(), |_| true)
	}

	/// Same as [`get`](Self::get), evaluated at `now` instead of the current clock.
	pub fn get_at(&self, category: Category, key: &str, now: OffsetDateTime) -> Option<V> {
		self.lookup(category, key, now, |_| true)
	}

	/// Returns the live value under `key` or `fallback` when absent.
	pub fn get_or(&self, category: Category, key: &str, fallback: V) -> V {
		self.get(category, key).unwrap_or(fallback)
	}

	/// Like [`get`](Self::get), but an entry whose value fails `is_valid` is treated as expired
	/// and evicted.
	pub fn get_valid<F>(&self, category: Category, key: &str, is_valid: F) -> Option<V>
	where
		F: Fn(&V) -> bool,
	{
		self.lookup(category, key, OffsetDateTime::now_utc(), is_valid)
	}

	/// Stores `value` under `key` until `ttl` from now, replacing any previous entry.
	pub fn set(&self, category: Category, key: impl Into<String>, value: V, ttl: Duration) {
		self.set_at(category, key, value, ttl, OffsetDateTime::now_utc());
	}

	/// Same as [`set`](Self::set), with expiry computed from `now`.
	pub fn set_at(
		&self,
		category: Category,
		key: impl Into<String>,
		value: V,
		ttl: Duration,
		now: OffsetDateTime,
	) {
		if !self.is_enabled() {
			return;
		}

		self.partition(category).write().insert(key.into(), CacheEntry::new(value, now, ttl));
	}

	/// Stores `value` like [`set`](Self::set), unless `category` saw an explicit removal since
	/// `generation` was read. Returns whether the value was stored.
	pub fn set_if_current(
		&self,
		category: Category,
		key: impl Into<String>,
		value: V,
		ttl: Duration,
		generation: u64,
	) -> bool {
		if !self.is_enabled() {
			return false;
		}

		let now = OffsetDateTime::now_utc();
		let mut entries = self.partition(category).write();

		if self.generation(category) != generation {
			return false;
		}

		entries.insert(key.into(), CacheEntry::new(value, now, ttl));

		true
	}

	/// Counter bumped by every explicit removal in `category`.
	pub fn generation(&self, category: Category) -> u64 {
		self.generations[category as usize].load(Ordering::Acquire)
	}

	/// Removes the entry under `key`, returning whether one existed.
	pub fn forget(&self, category: Category, key: &str) -> bool {
		let mut entries = self.partition(category).write();

		self.bump_generation(category);

		entries.remove(key).is_some()
	}

	/// Removes every entry matching `predicate`, returning how many were removed.
	pub fn forget_where<F>(&self, category: Category, mut predicate: F) -> usize
	where
		F: FnMut(&str, &V) -> bool,
	{
		let mut partition = self.partition(category).write();
		let before = partition.len();

		self.bump_generation(category);

		partition.retain(|key, entry| !predicate(key, &entry.value));

		before - partition.len()
	}

	/// Snapshot of a category, including expired entries not yet evicted.
	pub fn get_category(&self, category: Category) -> HashMap<String, CacheEntry<V>> {
		self.partition(category).read().clone()
	}

	/// Empties `category`, leaving the other category untouched.
	pub fn clear(&self, category: Category) {
		let mut entries = self.partition(category).write();

		self.bump_generation(category);
		entries.clear();
	}

	/// Returns a key whose value matches `predicate`.
	///
	/// Every stored entry is scanned regardless of expiry; with several matches, which key is
	/// returned is unspecified.
	pub fn find_key_by_value<F>(&self, category: Category, predicate: F) -> Option<String>
	where
		F: Fn(&V) -> bool,
	{
		if !self.is_enabled() {
			return None;
		}

		self.partition(category)
			.read()
			.iter()
			.find(|(_, entry)| predicate(&entry.value))
			.map(|(key, _)| key.clone())
	}

	/// Number of stored entries in `category`, including expired ones not yet evicted.
	pub fn len(&self, category: Category) -> usize {
		self.partition(category).read().len()
	}

	/// Returns `true` if `category` stores no entries.
	pub fn is_empty(&self, category: Category) -> bool {
		self.partition(category).read().is_empty()
	}

	/// Returns `true` unless caching has been disabled.
	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Acquire)
	}

	/// Turns reads and writes on or off without touching stored entries.
	pub fn set_enabled(&self, enabled: bool) {
		self.enabled.store(enabled, Ordering::Release);
	}

	/// Lookup counters.
	pub fn stats(&self) -> &CacheStats {
		&self.stats
	}

	// Callers hold the partition's write lock, which orders the bump against `set_if_current`.
	fn bump_generation(&self, category: Category) {
		self.generations[category as usize].fetch_add(1, Ordering::AcqRel);
	}

	fn partition(&self, category: Category) -> &Partition<V> {
		match category {
			Category::Client => &self.client,
			Category::Server => &self.server,
		}
	}

	fn lookup<F>(
		&self,
		category: Category,
		key: &str,
		now: OffsetDateTime,
		is_valid: F,
	) -> Option<V>
	where
		F: Fn(&V) -> bool,
	{
		if !self.is_enabled() {
			return None;
		}

		let live = |entry: &CacheEntry<V>| !entry.is_expired_at(now) && is_valid(&entry.value);
		let partition = self.partition(category);

		{
			let entries = partition.read();

			match entries.get(key) {
				Some(entry) if live(entry) => return Some(self.hit(category, entry)),
				Some(_) => {},
				None => return self.miss(category),
			}
		}

		let mut entries = partition.write();

		// Re-check under the exclusive lock; the entry may have been replaced meanwhile.
		match entries.get(key) {
			Some(entry) if live(entry) => Some(self.hit(category, entry)),
			Some(_) => {
				entries.remove(key);
				self.stats.record_eviction();
				obs::record_cache_outcome(category, CacheOutcome::Evicted);

				self.miss(category)
			},
			None => self.miss(category),
		}
	}

	fn hit(&self, category: Category, entry: &CacheEntry<V>) -> V {
		self.stats.record_hit();
		obs::record_cache_outcome(category, CacheOutcome::Hit);

		entry.value.clone()
	}

	fn miss(&self, category: Category) -> Option<V> {
		self.stats.record_miss();
		obs::record_cache_outcome(category, CacheOutcome::Miss);

		None
	}
}
impl<V> Default for TtlCache<V>
where
	V: Clone,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<V> Debug for TtlCache<V> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TtlCache")
			.field("client_entries", &self.client.read().len())
			.field("server_entries", &self.server.read().len())
			.field("enabled", &self.enabled.load(Ordering::Relaxed))
			.field("stats", &self.stats)
			.finish()
	}
}
