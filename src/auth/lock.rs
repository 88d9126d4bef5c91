//! Advisory lease data carried on credential records.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const LOCK_TOKEN_LEN: usize = 32;

/// Random fencing token identifying a single lock acquisition.
///
/// Tokens are generated per acquisition attempt, never reused, and compared verbatim on
/// release. They are not secrets; formatting them is fine.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(String);
impl LockToken {
	/// Generates a fresh token with 32 alphanumeric characters of entropy.
	pub fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(LOCK_TOKEN_LEN).map(char::from).collect())
	}

	/// Returns the token value.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for LockToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "LockToken({})", self.0)
	}
}
impl Display for LockToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Time-boxed advisory lease stored on a credential record.
///
/// Readers treat a lapsed lease exactly like an absent lock, so a crashed holder never wedges
/// the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryLock {
	/// Token owned by the current holder.
	pub holder: LockToken,
	/// Instant the lease stops counting.
	pub expires_at: OffsetDateTime,
}
impl AdvisoryLock {
	/// Builds a lease for `holder` lasting until `expires_at`.
	pub fn new(holder: LockToken, expires_at: OffsetDateTime) -> Self {
		Self { holder, expires_at }
	}

	/// Returns `true` once the lease has lapsed; the boundary instant counts as expired.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
