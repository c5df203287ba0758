// self
use crate::{
	cache::Category,
	obs::{CacheOutcome, FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_accounts_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a cache lookup outcome via the global metrics recorder (when enabled).
pub fn record_cache_outcome(category: Category, outcome: CacheOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_accounts_cache_total",
			"category" => category.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (category, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_flow_outcome(FlowKind::Introspect, FlowOutcome::Failure);
		record_cache_outcome(Category::Server, CacheOutcome::Evicted);
	}
}
