//! Credential record structs, freshness helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{
		id::RecordId,
		lock::{AdvisoryLock, LockToken},
		secret::TokenSecret,
	},
};

/// OAuth providers the custodian manages credentials for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
	/// github.com OAuth apps.
	GitHub,
	/// gitlab.com or self-managed GitLab instances.
	GitLab,
	/// Azure DevOps via Microsoft Entra.
	Azure,
}
impl Provider {
	/// Stable lowercase label used in logs and metrics.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::GitHub => "github",
			Self::GitLab => "gitlab",
			Self::Azure => "azure",
		}
	}
}
impl Display for Provider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Relationship between the credential's identity and the connected resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialRole {
	/// The identity owns the connected resources.
	Owner,
	/// The identity participates as an invited guest.
	Guest,
}

/// Errors produced by [`CredentialRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialRecordBuilderError {
	/// Issued when no username was provided.
	#[error("Username is required.")]
	MissingUsername,
	/// Issued when no provider-side user identifier was provided.
	#[error("Provider user identifier is required.")]
	MissingProviderUserId,
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Durable OAuth credential for one identity at one provider, shared across processes.
///
/// The refresh token is mandatory: records exist to be refreshed, and all supported providers
/// issue offline grants. The advisory lock rides on the record itself so a single conditional
/// write can check and claim it.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Identifier the record is stored under.
	pub id: RecordId,
	/// Provider that issued the tokens.
	pub provider: Provider,
	/// Role of the identity relative to the connected resources.
	pub role: CredentialRole,
	/// Display login captured at authorization time.
	pub username: String,
	/// Provider-side account identifier captured at authorization time.
	pub provider_user_id: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Expiry instant of the access token.
	pub access_token_expires_at: OffsetDateTime,
	/// Refresh token secret used to mint replacement access tokens.
	pub refresh_token: TokenSecret,
	/// Advisory refresh lease, when a holder is currently working on the record.
	pub lock: Option<AdvisoryLock>,
}
impl CredentialRecord {
	/// Returns a builder for provisioning new records. Built records start unlocked.
	pub fn builder(id: RecordId, provider: Provider, role: CredentialRole) -> CredentialRecordBuilder {
		CredentialRecordBuilder::new(id, provider, role)
	}

	/// Returns `true` once the access token is inside the refresh window: at or past `lead`
	/// before expiry. The boundary instant counts as needing a refresh.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, lead: Duration) -> bool {
		instant >= self.access_token_expires_at - lead
	}

	/// Returns `true` once the access token itself has lapsed.
	pub fn is_access_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.access_token_expires_at
	}

	/// Returns the holder of a live lease, if any. A lapsed lease yields `None`.
	pub fn lock_holder_at(&self, instant: OffsetDateTime) -> Option<&LockToken> {
		self.lock.as_ref().filter(|lock| !lock.is_expired_at(instant)).map(|lock| &lock.holder)
	}

	/// Returns `true` while a live lease is held on the record.
	pub fn is_locked_at(&self, instant: OffsetDateTime) -> bool {
		self.lock_holder_at(instant).is_some()
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("id", &self.id)
			.field("provider", &self.provider)
			.field("role", &self.role)
			.field("username", &self.username)
			.field("provider_user_id", &self.provider_user_id)
			.field("access_token", &"<redacted>")
			.field("access_token_expires_at", &self.access_token_expires_at)
			.field("refresh_token", &"<redacted>")
			.field("lock", &self.lock)
			.finish()
	}
}

/// Builder for [`CredentialRecord`].
#[derive(Clone, Debug)]
pub struct CredentialRecordBuilder {
	id: RecordId,
	provider: Provider,
	role: CredentialRole,
	username: Option<String>,
	provider_user_id: Option<String>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialRecordBuilder {
	fn new(id: RecordId, provider: Provider, role: CredentialRole) -> Self {
		Self {
			id,
			provider,
			role,
			username: None,
			provider_user_id: None,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the display login of the identity.
	pub fn username(mut self, value: impl Into<String>) -> Self {
		self.username = Some(value.into());

		self
	}

	/// Sets the provider-side account identifier.
	pub fn provider_user_id(mut self, value: impl Into<String>) -> Self {
		self.provider_user_id = Some(value.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant used as the base for relative expiry.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute access token expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`CredentialRecord`].
	pub fn build(self) -> Result<CredentialRecord, CredentialRecordBuilderError> {
		let username = self.username.ok_or(CredentialRecordBuilderError::MissingUsername)?;
		let provider_user_id =
			self.provider_user_id.ok_or(CredentialRecordBuilderError::MissingProviderUserId)?;
		let access_token =
			self.access_token.ok_or(CredentialRecordBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialRecordBuilderError::MissingRefreshToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let access_token_expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(CredentialRecordBuilderError::MissingExpiry),
		};

		Ok(CredentialRecord {
			id: self.id,
			provider: self.provider,
			role: self.role,
			username,
			provider_user_id,
			access_token,
			access_token_expires_at,
			refresh_token,
			lock: None,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn record_id() -> RecordId {
		RecordId::new("github:alice").expect("Record id fixture should be valid.")
	}

	fn build_record(expires_at: OffsetDateTime) -> CredentialRecord {
		CredentialRecord::builder(record_id(), Provider::GitHub, CredentialRole::Owner)
			.username("alice")
			.provider_user_id("1001")
			.access_token("access-1")
			.refresh_token("refresh-1")
			.expires_at(expires_at)
			.build()
			.expect("Record fixture builder should succeed.")
	}

	#[test]
	fn builder_enforces_required_fields() {
		let missing_refresh =
			CredentialRecord::builder(record_id(), Provider::GitLab, CredentialRole::Guest)
				.username("bob")
				.provider_user_id("2002")
				.access_token("access")
				.expires_in(Duration::hours(1))
				.build();

		assert!(matches!(missing_refresh, Err(CredentialRecordBuilderError::MissingRefreshToken)));

		let missing_expiry =
			CredentialRecord::builder(record_id(), Provider::GitLab, CredentialRole::Guest)
				.username("bob")
				.provider_user_id("2002")
				.access_token("access")
				.refresh_token("refresh")
				.build();

		assert!(matches!(missing_expiry, Err(CredentialRecordBuilderError::MissingExpiry)));

		let missing_identity =
			CredentialRecord::builder(record_id(), Provider::GitLab, CredentialRole::Guest)
				.access_token("access")
				.refresh_token("refresh")
				.expires_in(Duration::hours(1))
				.build();

		assert!(matches!(missing_identity, Err(CredentialRecordBuilderError::MissingUsername)));
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = CredentialRecord::builder(record_id(), Provider::Azure, CredentialRole::Owner)
			.username("alice")
			.provider_user_id("1001")
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(datetime!(2026-01-01 0:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Relative expiry builder should succeed.");

		assert_eq!(record.access_token_expires_at, datetime!(2026-01-01 0:30 UTC));
		assert!(record.lock.is_none());
	}

	#[test]
	fn refresh_window_boundary_is_inclusive() {
		let expires_at = datetime!(2026-03-01 12:00 UTC);
		let record = build_record(expires_at);
		let lead = Duration::minutes(5);

		assert!(!record.needs_refresh_at(expires_at - lead - Duration::seconds(1), lead));
		assert!(record.needs_refresh_at(expires_at - lead, lead));
		assert!(record.needs_refresh_at(expires_at + Duration::seconds(1), lead));
		assert!(record.is_access_expired_at(expires_at));
		assert!(!record.is_access_expired_at(expires_at - Duration::seconds(1)));
	}

	#[test]
	fn lapsed_leases_read_as_unlocked() {
		let now = datetime!(2026-03-01 12:00 UTC);
		let mut record = build_record(now + Duration::hours(1));

		assert!(!record.is_locked_at(now));

		let holder = LockToken::generate();

		record.lock = Some(AdvisoryLock::new(holder.clone(), now + Duration::seconds(30)));

		assert_eq!(record.lock_holder_at(now), Some(&holder));
		assert!(record.is_locked_at(now));
		assert!(!record.is_locked_at(now + Duration::seconds(30)));
		assert_eq!(record.lock_holder_at(now + Duration::minutes(1)), None);
	}
}
