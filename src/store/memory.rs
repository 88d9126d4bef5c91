//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AdvisoryLock, CredentialRecord, LockToken, RecordId},
	store::{
		CredentialStore, LockAcquireOutcome, LockReleaseOutcome, StoreError, StoreFuture,
		TokenUpdate,
	},
};

type StoreMap = Arc<RwLock<HashMap<RecordId, CredentialRecord>>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
///
/// Every conditional operation holds the write lock for its whole check-then-write sequence,
/// which is what makes the lease semantics race-free inside one process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	fn save_now(map: StoreMap, record: CredentialRecord) -> Result<(), StoreError> {
		map.write().insert(record.id.clone(), record);

		Ok(())
	}

	fn fetch_now(map: StoreMap, id: RecordId) -> Option<CredentialRecord> {
		map.read().get(&id).cloned()
	}

	fn acquire_now(
		map: StoreMap,
		id: RecordId,
		holder: LockToken,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> LockAcquireOutcome {
		let mut guard = map.write();

		match guard.get_mut(&id) {
			Some(record) if record.is_locked_at(now) => LockAcquireOutcome::Contended,
			Some(record) => {
				record.lock = Some(AdvisoryLock::new(holder, expires_at));

				LockAcquireOutcome::Acquired(record.clone())
			},
			None => LockAcquireOutcome::Missing,
		}
	}

	fn release_now(map: StoreMap, id: RecordId, holder: LockToken) -> LockReleaseOutcome {
		let mut guard = map.write();

		match guard.get_mut(&id) {
			Some(record) if record.lock.as_ref().is_some_and(|lock| lock.holder == holder) => {
				record.lock = None;

				LockReleaseOutcome::Released(record.clone())
			},
			Some(_) => LockReleaseOutcome::HolderMismatch,
			None => LockReleaseOutcome::Missing,
		}
	}

	fn update_now(map: StoreMap, id: RecordId, update: TokenUpdate) -> Option<CredentialRecord> {
		let mut guard = map.write();

		match guard.get_mut(&id) {
			Some(record) => {
				record.access_token = update.access_token;
				record.access_token_expires_at = update.expires_at;

				if let Some(rotated) = update.refresh_token {
					record.refresh_token = rotated;
				}

				Some(record.clone())
			},
			None => None,
		}
	}
}
impl CredentialStore for MemoryStore {
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<CredentialRecord>> {
		let map = self.0.clone();
		let id = id.to_owned();

		Box::pin(async move { Ok(Self::fetch_now(map, id)) })
	}

	fn try_acquire_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> StoreFuture<'a, LockAcquireOutcome> {
		let map = self.0.clone();
		let id = id.to_owned();
		let holder = holder.to_owned();

		Box::pin(async move { Ok(Self::acquire_now(map, id, holder, expires_at, now)) })
	}

	fn release_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
	) -> StoreFuture<'a, LockReleaseOutcome> {
		let map = self.0.clone();
		let id = id.to_owned();
		let holder = holder.to_owned();

		Box::pin(async move { Ok(Self::release_now(map, id, holder)) })
	}

	fn update_tokens<'a>(
		&'a self,
		id: &'a RecordId,
		update: TokenUpdate,
	) -> StoreFuture<'a, Option<CredentialRecord>> {
		let map = self.0.clone();
		let id = id.to_owned();

		Box::pin(async move { Ok(Self::update_now(map, id, update)) })
	}
}
