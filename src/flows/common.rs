//! Shared helpers for flow implementations (instrumentation, TTL bounds, singleflight guards).

// self
use crate::{
	_prelude::*,
	flows::Accounts,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Runs `fut` inside `span`, recording attempt/success/failure for `kind`.
pub(crate) async fn observe<T, F>(kind: FlowKind, span: FlowSpan, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}

/// Caps the configured cache lifetime by the lifetime the server advertised, if any.
pub fn bounded_ttl(configured: Duration, advertised: Option<Duration>) -> Duration {
	match advertised {
		Some(advertised) => configured.min(advertised),
		None => configured,
	}
}

/// Returns (and creates on demand) the singleflight guard for a canonical scope key.
pub(crate) fn flow_guard<C, M>(accounts: &Accounts<C, M>, key: &str) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = accounts.acquire_guards.lock();

	guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}
