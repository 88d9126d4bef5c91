//! Custodian-level error types shared across flows, providers, and stores.

// self
use crate::{
	_prelude::*,
	auth::{Provider, RecordId},
};

/// Custodian-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical custodian error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Lock acquisition exhausted its retry budget while another holder kept the lease.
	#[error("Credential `{record}` is locked by another process; gave up after {attempts} attempts.")]
	LockUnavailable {
		/// Contended credential record.
		record: RecordId,
		/// Conditional writes attempted before giving up.
		attempts: u32,
	},
	/// Provider rejected the stored refresh token; the grant is dead.
	#[error("{provider} rejected the refresh token for credential `{record}`: {reason}.")]
	RefreshTokenInvalid {
		/// Provider that refused the grant.
		provider: Provider,
		/// Credential record holding the refused token.
		record: RecordId,
		/// Provider- or custodian-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("{provider} rejected the client credentials: {reason}.")]
	InvalidClient {
		/// Provider that refused the client.
		provider: Provider,
		/// Provider- or custodian-supplied reason string.
		reason: String,
	},
	/// Referenced credential record does not exist in the store.
	#[error("Credential record `{record}` does not exist.")]
	RecordMissing {
		/// Unknown record identifier.
		record: RecordId,
	},
}
impl Error {
	/// Returns `true` when the stored grant is unusable and the identity owner must be sent
	/// through provider authorization again. Retrying the refresh cannot succeed.
	pub fn requires_reauthorization(&self) -> bool {
		matches!(self, Self::RefreshTokenInvalid { .. })
	}

	/// Returns `true` for failures that a later invocation may not hit: lock contention,
	/// provider outages, and transport errors.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_) | Self::LockUnavailable { .. })
	}
}

/// Configuration and validation failures raised by the custodian.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Registered OAuth app carries a token endpoint the OAuth client cannot parse.
	#[error("App token endpoint could not be parsed.")]
	InvalidAppEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// No OAuth app has been registered for the record's provider.
	#[error("No OAuth app is registered for {provider}.")]
	ProviderNotRegistered {
		/// Provider missing from the registry.
		provider: Provider,
	},

	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,

	/// Lock TTL settings value is zero or negative.
	#[error("Lock TTL must be positive.")]
	NonPositiveLockTtl,
	/// Provider timeout settings value is zero or negative.
	#[error("Provider timeout must be positive.")]
	NonPositiveProviderTimeout,
	/// Refresh window settings value is negative.
	#[error("Refresh window must not be negative.")]
	NegativeRefreshWindow,
	/// Retry cooldown settings value is negative.
	#[error("Retry cooldown must not be negative.")]
	NegativeCooldown,
	/// Provider timeout does not leave lease headroom.
	#[error("Provider timeout must stay below the lock TTL.")]
	TimeoutExceedsLockTtl,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or custodian-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint stayed silent past the configured deadline.
	#[error("Token endpoint did not respond within {limit}.")]
	ExchangeTimedOut {
		/// Configured provider timeout.
		limit: Duration,
	},
}
/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
