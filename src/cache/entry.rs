// self
use crate::_prelude::*;

/// Cached value plus the instant it stops being served.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<V> {
	/// Stored value.
	pub value: V,
	/// Instant at (and after) which the entry counts as absent.
	pub expiration: OffsetDateTime,
}
impl<V> CacheEntry<V> {
	/// Creates an entry that expires `ttl` after `now`.
	pub fn new(value: V, now: OffsetDateTime, ttl: Duration) -> Self {
		Self { value, expiration: now.saturating_add(ttl) }
	}

	/// Returns `true` if the entry is expired at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expiration <= now
	}

	/// Time left before expiry at `now`, clamped to zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expiration - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
