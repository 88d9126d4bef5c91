//! High-level credential lifecycle orchestration.

pub mod lock;

mod metrics;
mod refresh;

pub use lock::*;
pub use metrics::CustodyMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, CredentialRole, Provider, RecordId, TokenSecret},
	error::ConfigError,
	http::ExchangeHttpClient,
	oauth::TransportErrorMapper,
	provider::{ProviderRegistry, ProviderStrategy},
	retry::RetryPolicy,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Custodian specialized for the crate's default reqwest transport stack.
pub type ReqwestCustodian = Custodian<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates credential custody across cooperating processes.
///
/// The custodian owns the credential store, the provider registry, and the transport
/// references so the lock and refresh flows can focus on lifecycle logic. Every
/// transactional entry point follows the same shape: acquire the record's advisory lease,
/// refresh the tokens when the refresh window says so, persist, and release the lease on
/// every exit path. Instances are cheap to clone and safe to share between tasks.
pub struct Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Credential store that persists records and advisory leases.
	pub store: Arc<dyn CredentialStore>,
	/// OAuth app registrations the custodian resolves records against.
	pub registry: ProviderRegistry,
	/// Strategy responsible for provider-specific classification and request tweaks.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Timing knobs for leases, retries, and provider deadlines.
	pub settings: CustodySettings,
	/// Shared counters for custody flow outcomes.
	pub metrics: Arc<CustodyMetrics>,
}
impl<C, M> Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a custodian that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		registry: ProviderRegistry,
		strategy: Arc<dyn ProviderStrategy>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			registry,
			strategy,
			settings: CustodySettings::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the timing settings, validating them first.
	pub fn with_settings(mut self, settings: CustodySettings) -> Result<Self> {
		settings.validate()?;

		self.settings = settings;

		Ok(self)
	}
}
#[cfg(feature = "reqwest")]
impl Custodian<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new custodian over the provided store and app registry.
	///
	/// The custodian provisions its own reqwest-backed transport so callers do not need to
	/// pass HTTP handles explicitly. Use [`Custodian::with_settings`] to replace the default
	/// timing knobs.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		registry: ProviderRegistry,
		strategy: Arc<dyn ProviderStrategy>,
	) -> Self {
		Self::with_http_client(
			store,
			registry,
			strategy,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			registry: self.registry.clone(),
			strategy: self.strategy.clone(),
			settings: self.settings,
			metrics: self.metrics.clone(),
		}
	}
}
impl<C, M> Debug for Custodian<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Custodian")
			.field("registry", &self.registry)
			.field("settings", &self.settings)
			.finish()
	}
}

/// Timing knobs governing leases, retries, and provider deadlines.
///
/// The defaults suit interactive workloads: a 30 second lease, ten acquisition attempts
/// spaced 500 milliseconds apart, a 5 minute refresh window, and a 10 second provider
/// deadline. Validation requires the provider deadline to stay below the lease TTL so a
/// slow exchange cannot outlive its own lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustodySettings {
	/// Advisory lease lifetime written on every successful acquisition.
	pub lock_ttl: Duration,
	/// Retry budget applied to contended lock acquisitions.
	pub acquire_retry: RetryPolicy,
	/// How long before expiry an access token counts as due for refresh.
	pub refresh_window: Duration,
	/// Deadline for a single token endpoint exchange.
	pub provider_timeout: Duration,
}
impl CustodySettings {
	/// Checks the invariants across the timing knobs.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.lock_ttl.is_positive() {
			return Err(ConfigError::NonPositiveLockTtl);
		}
		if !self.provider_timeout.is_positive() {
			return Err(ConfigError::NonPositiveProviderTimeout);
		}
		if self.refresh_window.is_negative() {
			return Err(ConfigError::NegativeRefreshWindow);
		}
		if self.acquire_retry.cooldown.is_negative() {
			return Err(ConfigError::NegativeCooldown);
		}
		if self.provider_timeout >= self.lock_ttl {
			return Err(ConfigError::TimeoutExceedsLockTtl);
		}

		Ok(())
	}
}
impl Default for CustodySettings {
	fn default() -> Self {
		Self {
			lock_ttl: Duration::seconds(30),
			acquire_retry: RetryPolicy::new(10, Duration::milliseconds(500)),
			refresh_window: Duration::minutes(5),
			provider_timeout: Duration::seconds(10),
		}
	}
}

/// Point-in-time snapshot of a usable credential, detached from the store.
///
/// Snapshots carry no lease: by the time a caller sees one, the advisory lock has already
/// been returned. Treat the access token as valid until [`expires_at`](Self::expires_at)
/// minus whatever safety margin the workload needs.
#[derive(Clone, Debug)]
pub struct FreshCredential {
	/// Identifier of the record the snapshot came from.
	pub id: RecordId,
	/// Provider that issued the access token.
	pub provider: Provider,
	/// Role of the identity relative to the connected resources.
	pub role: CredentialRole,
	/// Display login captured at authorization time.
	pub username: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Expiry instant of the access token.
	pub expires_at: OffsetDateTime,
}
impl FreshCredential {
	pub(crate) fn from_record(record: &CredentialRecord) -> Self {
		Self {
			id: record.id.clone(),
			provider: record.provider,
			role: record.role,
			username: record.username.clone(),
			access_token: record.access_token.clone(),
			expires_at: record.access_token_expires_at,
		}
	}

	/// Formats the access token as an HTTP `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_settings_validate() {
		assert!(CustodySettings::default().validate().is_ok());
	}

	#[test]
	fn settings_reject_a_zero_lease() {
		let settings = CustodySettings { lock_ttl: Duration::ZERO, ..Default::default() };

		assert!(matches!(settings.validate(), Err(ConfigError::NonPositiveLockTtl)));
	}

	#[test]
	fn settings_reject_a_deadline_at_or_past_the_lease() {
		let settings = CustodySettings {
			lock_ttl: Duration::seconds(10),
			provider_timeout: Duration::seconds(10),
			..Default::default()
		};

		assert!(matches!(settings.validate(), Err(ConfigError::TimeoutExceedsLockTtl)));
	}

	#[test]
	fn settings_reject_negative_windows_and_cooldowns() {
		let negative_window =
			CustodySettings { refresh_window: Duration::seconds(-1), ..Default::default() };

		assert!(matches!(negative_window.validate(), Err(ConfigError::NegativeRefreshWindow)));

		let negative_cooldown = CustodySettings {
			acquire_retry: RetryPolicy::new(3, Duration::seconds(-1)),
			..Default::default()
		};

		assert!(matches!(negative_cooldown.validate(), Err(ConfigError::NegativeCooldown)));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn with_settings_rejects_invalid_knobs() {
		let custodian = Custodian::new(
			Arc::new(crate::store::MemoryStore::default()),
			ProviderRegistry::new(),
			Arc::new(crate::provider::DefaultProviderStrategy),
		);
		let invalid = CustodySettings { lock_ttl: Duration::ZERO, ..Default::default() };

		assert!(matches!(
			custodian.with_settings(invalid),
			Err(Error::Config(ConfigError::NonPositiveLockTtl))
		));
	}
}
