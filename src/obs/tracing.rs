// self
use crate::{_prelude::*, auth::RecordId, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type TracedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type TracedFlow<F> = F;

/// A span builder used by custodian flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_custodian.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> TracedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a conditional lock write loses to another holder.
pub fn log_lock_contention(record: &RecordId, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			record = %record,
			attempt,
			"Lock is held elsewhere; cooling down before the next attempt."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (record, attempt);
	}
}

/// Emits a debug event when a release finds the lease already expired, reclaimed, or gone.
///
/// A no-op release is expected after a lease outlives its TTL, so this never escalates
/// beyond debug level.
pub fn log_stale_release(record: &RecordId, detail: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(record = %record, detail, "Lock release was a no-op.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (record, detail);
	}
}

/// Emits an error event when the store rejects a release outright.
///
/// The lease still expires on its own at the TTL boundary, so callers treat this as
/// non-fatal and keep the flow's primary result.
pub fn log_release_failure(record: &RecordId, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(
			record = %record,
			error = %error,
			"Lock release failed; the lease will expire on its own."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (record, error);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn flow_helpers_compile_without_tracing() {
		let record: RecordId = "github:alice".parse().expect("Record id should parse.");

		log_lock_contention(&record, 1);
		log_stale_release(&record, "holder_mismatch");

		let span = FlowSpan::new(FlowKind::Acquire, "test");

		drop(span);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
