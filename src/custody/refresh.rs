//! Refresh orchestration: single-flight token exchanges under the advisory lease.
//!
//! Every transactional entry point runs the same sequence. Acquire the record's lease,
//! re-read the record state the acquisition returned, refresh through the provider only
//! when the refresh window (or an explicit force) says so, persist the exchanged tokens,
//! and release the lease before handing anything back to the caller. Because the freshness
//! check happens on post-acquisition state, N contending processes produce one provider
//! call: the winner refreshes, the rest observe the new expiry and reuse it.

// crates.io
use tokio::time::timeout;
// self
use crate::{
	_prelude::*,
	auth::RecordId,
	custody::{CredentialLease, Custodian, FreshCredential},
	error::{ConfigError, TransientError},
	http::ExchangeHttpClient,
	oauth::{RefreshFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenUpdate,
};

impl<C, M> Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a credential snapshot whose access token sits outside the refresh window,
	/// exchanging the refresh token with the provider when the stored one is due.
	pub async fn ensure_fresh_credential(&self, record: &RecordId) -> Result<FreshCredential> {
		self.run_refresh_flow(record, false, "ensure_fresh_credential").await
	}

	/// Forces a provider exchange even when the stored access token is still fresh.
	pub async fn refresh_now(&self, record: &RecordId) -> Result<FreshCredential> {
		self.run_refresh_flow(record, true, "refresh_now").await
	}

	/// Ensures a fresh credential and then runs `op` with a snapshot of it.
	///
	/// The advisory lease is acquired and released entirely inside the ensure step; `op`
	/// runs after the release, so slow callers never stretch the record's critical section.
	/// The error type only needs a `From<Error>` conversion, which lets application error
	/// enums absorb custodian failures through `?`.
	pub async fn with_fresh_credential<T, E, F, Fut>(
		&self,
		record: &RecordId,
		op: F,
	) -> Result<T, E>
	where
		E: From<Error>,
		F: FnOnce(FreshCredential) -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let credential = self.ensure_fresh_credential(record).await?;

		op(credential).await
	}

	async fn run_refresh_flow(
		&self,
		record: &RecordId,
		force: bool,
		stage: &'static str,
	) -> Result<FreshCredential> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async move {
				let lease = self.acquire_lock(record).await?;
				let outcome = self.refresh_under_lease(&lease, force).await;

				self.release_lock(&lease).await;

				outcome
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn refresh_under_lease(
		&self,
		lease: &CredentialLease,
		force: bool,
	) -> Result<FreshCredential> {
		let record = &lease.record;
		let now = OffsetDateTime::now_utc();

		if !force && !record.needs_refresh_at(now, self.settings.refresh_window) {
			self.metrics.record_reuse();

			return Ok(FreshCredential::from_record(record));
		}

		let app = self
			.registry
			.app(record.provider)
			.ok_or(ConfigError::ProviderNotRegistered { provider: record.provider })?;
		let facade = <RefreshFacade<C, M>>::from_app(
			app,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let limit = self.settings.provider_timeout;
		let exchange = facade.refresh_token(
			self.strategy.as_ref(),
			record.provider,
			&lease.id,
			&record.refresh_token,
		);
		let issued = match timeout(limit.try_into().unwrap_or_default(), exchange).await {
			Ok(exchanged) => exchanged?,
			Err(_) => return Err(TransientError::ExchangeTimedOut { limit }.into()),
		};
		let mut update = TokenUpdate::new(issued.access_token, issued.expires_at);

		if let Some(rotated) = issued.rotated_refresh {
			update = update.with_rotated_refresh(rotated);
		}

		let updated = self
			.store
			.update_tokens(&lease.id, update)
			.await?
			.ok_or_else(|| Error::RecordMissing { record: lease.id.clone() })?;

		self.metrics.record_refresh();

		Ok(FreshCredential::from_record(&updated))
	}
}
