//! Optional observability helpers for flows, the guard, and the cache.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_accounts.flow` with the `flow`,
//!   `stage` (call site), and `token` (fingerprint, when known) fields, plus retry-loop events.
//! - Enable `metrics` to increment the `oauth2_accounts_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the `oauth2_accounts_cache_total`
//!   counter labeled by `category` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client Credentials token acquisition.
	ClientCredentials,
	/// Refresh token exchange.
	Refresh,
	/// Token revocation.
	Revoke,
	/// Guard introspection via `/oauth/tokeninfo`.
	Introspect,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::Refresh => "refresh",
			FlowKind::Revoke => "revoke",
			FlowKind::Introspect => "introspect",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Cache lookup outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
	/// A live entry was returned.
	Hit,
	/// No live entry was found.
	Miss,
	/// An expired or invalid entry was removed on read.
	Evicted,
}
impl CacheOutcome {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheOutcome::Hit => "hit",
			CacheOutcome::Miss => "miss",
			CacheOutcome::Evicted => "evicted",
		}
	}
}
impl Display for CacheOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
