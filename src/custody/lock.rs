//! Advisory lease acquisition and release against the credential store.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, LockToken, RecordId},
	custody::Custodian,
	http::ExchangeHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{LockAcquireOutcome, LockReleaseOutcome},
};

/// Successfully acquired advisory lease over one credential record.
///
/// The lease is advisory: it gates cooperating custodians, not reads. Holding one proves
/// that a conditional write installed this process's holder token before the TTL instant
/// recorded in the store.
#[derive(Clone, Debug)]
pub struct CredentialLease {
	/// Identifier of the leased record.
	pub id: RecordId,
	/// Holder token proving ownership of the lease.
	pub token: LockToken,
	/// Record state captured by the acquisition write.
	pub record: CredentialRecord,
}

impl<C, M> Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Acquires the advisory lease for `record`, retrying contended attempts on a fixed
	/// cooldown until the configured budget runs out.
	///
	/// A missing record aborts immediately; waiting cannot make it appear. An exhausted
	/// budget maps to [`Error::LockUnavailable`] so callers can surface the contention
	/// instead of blocking indefinitely.
	pub(crate) async fn acquire_lock(&self, record: &RecordId) -> Result<CredentialLease> {
		const KIND: FlowKind = FlowKind::Acquire;

		let span = FlowSpan::new(KIND, "acquire_lock");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let policy = self.settings.acquire_retry;
		let result = span
			.instrument(async move {
				let lease = policy
					.run(|attempt| {
						let token = LockToken::generate();

						async move {
							let now = OffsetDateTime::now_utc();

							match self
								.store
								.try_acquire_lock(record, &token, now + self.settings.lock_ttl, now)
								.await?
							{
								LockAcquireOutcome::Acquired(state) => Ok(Some(CredentialLease {
									id: record.clone(),
									token,
									record: state,
								})),
								LockAcquireOutcome::Contended => {
									self.metrics.record_contention();
									obs::log_lock_contention(record, attempt);

									Ok(None)
								},
								LockAcquireOutcome::Missing =>
									Err(Error::RecordMissing { record: record.clone() }),
							}
						}
					})
					.await?;

				lease.ok_or_else(|| Error::LockUnavailable {
					record: record.clone(),
					attempts: policy.max_attempts,
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Releases `lease` if this process still holds it.
	///
	/// Release never overrides a flow's primary result. Finding the lease expired, reclaimed,
	/// or gone is an expected no-op logged at debug level; a store failure is logged at error
	/// level and otherwise swallowed, after which the lease ages out at its TTL.
	pub(crate) async fn release_lock(&self, lease: &CredentialLease) {
		const KIND: FlowKind = FlowKind::Release;

		let span = FlowSpan::new(KIND, "release_lock");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span.instrument(self.store.release_lock(&lease.id, &lease.token)).await;

		match outcome {
			Ok(LockReleaseOutcome::Released(_)) =>
				obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Ok(LockReleaseOutcome::HolderMismatch) => {
				obs::log_stale_release(&lease.id, "holder_mismatch");
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Ok(LockReleaseOutcome::Missing) => {
				obs::log_stale_release(&lease.id, "record_missing");
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				obs::log_release_failure(&lease.id, &Error::from(err));
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}
	}
}
