//! Storage contracts and built-in store implementations for custodian credential records.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, LockToken, RecordId, TokenSecret},
};

/// Boxed future type returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by custodian credential stores.
///
/// The lock operations are single conditional writes: a backend must apply the
/// read-check-write sequence atomically (transaction, compare-and-swap, or a
/// process-wide write lock) so concurrent callers cannot interleave between the
/// check and the write.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record under its identifier.
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record with the provided identifier, if present.
	fn fetch<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<CredentialRecord>>;

	/// Atomically installs an advisory lease for `holder` iff the record exists and its current
	/// lock is absent or expired at `now`. Taking over an expired lease is the same write; there
	/// is no separate delete step a competitor could race.
	fn try_acquire_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> StoreFuture<'a, LockAcquireOutcome>;

	/// Atomically clears the lock iff it is still held by `holder`. Lease expiry does not matter
	/// for release; only the holder token does.
	fn release_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
	) -> StoreFuture<'a, LockReleaseOutcome>;

	/// Overwrites the token fields of an existing record. Identity fields and the lock are left
	/// untouched, and an update without a rotation preserves the stored refresh token.
	fn update_tokens<'a>(
		&'a self,
		id: &'a RecordId,
		update: TokenUpdate,
	) -> StoreFuture<'a, Option<CredentialRecord>>;
}

/// Result of a conditional lock acquisition.
#[derive(Clone, Debug)]
pub enum LockAcquireOutcome {
	/// The lease was installed; carries the post-acquisition record.
	Acquired(CredentialRecord),
	/// Another holder owns a live lease.
	Contended,
	/// No record matched the identifier.
	Missing,
}

/// Result of a conditional lock release.
#[derive(Clone, Debug)]
pub enum LockReleaseOutcome {
	/// The lease was cleared; carries the unlocked record.
	Released(CredentialRecord),
	/// The lock is absent or held by a different token.
	HolderMismatch,
	/// No record matched the identifier.
	Missing,
}

/// Replacement token material produced by a provider exchange.
///
/// Partial writes are unrepresentable: an access token always travels with its expiry, and
/// `refresh_token` is `None` exactly when the provider did not rotate.
#[derive(Clone, Debug)]
pub struct TokenUpdate {
	/// Replacement access token.
	pub access_token: TokenSecret,
	/// Expiry instant of the replacement access token.
	pub expires_at: OffsetDateTime,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenUpdate {
	/// Builds an update that keeps the stored refresh token.
	pub fn new(access_token: TokenSecret, expires_at: OffsetDateTime) -> Self {
		Self { access_token, expires_at, refresh_token: None }
	}

	/// Attaches a rotated refresh token to the update.
	pub fn with_rotated_refresh(mut self, refresh_token: TokenSecret) -> Self {
		self.refresh_token = Some(refresh_token);

		self
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_custodian_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let custodian_error: Error = store_error.clone().into();

		assert!(matches!(custodian_error, Error::Storage(_)));
		assert!(custodian_error.to_string().contains("database unreachable"));

		let source = StdError::source(&custodian_error)
			.expect("Custodian error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn token_update_defaults_to_preserving_the_refresh_token() {
		let update = TokenUpdate::new(TokenSecret::new("access-1"), datetime!(2026-01-01 0:00 UTC));

		assert!(update.refresh_token.is_none());

		let rotated = update.with_rotated_refresh(TokenSecret::new("refresh-2"));

		assert_eq!(
			rotated.refresh_token.map(|secret| secret.expose().to_owned()),
			Some("refresh-2".to_owned())
		);
	}
}
