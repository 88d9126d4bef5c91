//! Simple file-backed [`CredentialStore`] for CLIs and single-host deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AdvisoryLock, CredentialRecord, LockToken, RecordId},
	store::{
		CredentialStore, LockAcquireOutcome, LockReleaseOutcome, StoreError, StoreFuture,
		TokenUpdate,
	},
};

/// Persists credential records to a JSON file after each mutation.
///
/// Atomicity holds per process: conditional writes serialize on the in-memory write lock and
/// the snapshot is replaced via temp file + rename. Cross-process deployments need a backend
/// with real conditional writes.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<RecordId, CredentialRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<RecordId, CredentialRecord>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		let records: Vec<CredentialRecord> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(records.into_iter().map(|record| (record.id.clone(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(
		&self,
		contents: &HashMap<RecordId, CredentialRecord>,
	) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(record.id.clone(), record);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(id).cloned()) })
	}

	fn try_acquire_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> StoreFuture<'a, LockAcquireOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = match guard.get_mut(id) {
				Some(record) if record.is_locked_at(now) => LockAcquireOutcome::Contended,
				Some(record) => {
					record.lock = Some(AdvisoryLock::new(holder.clone(), expires_at));

					LockAcquireOutcome::Acquired(record.clone())
				},
				None => LockAcquireOutcome::Missing,
			};

			if matches!(outcome, LockAcquireOutcome::Acquired(_)) {
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn release_lock<'a>(
		&'a self,
		id: &'a RecordId,
		holder: &'a LockToken,
	) -> StoreFuture<'a, LockReleaseOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = match guard.get_mut(id) {
				Some(record) if record.lock.as_ref().is_some_and(|lock| &lock.holder == holder) => {
					record.lock = None;

					LockReleaseOutcome::Released(record.clone())
				},
				Some(_) => LockReleaseOutcome::HolderMismatch,
				None => LockReleaseOutcome::Missing,
			};

			if matches!(outcome, LockReleaseOutcome::Released(_)) {
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn update_tokens<'a>(
		&'a self,
		id: &'a RecordId,
		update: TokenUpdate,
	) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let result = match guard.get_mut(id) {
				Some(record) => {
					record.access_token = update.access_token;
					record.access_token_expires_at = update.expires_at;

					if let Some(rotated) = update.refresh_token {
						record.refresh_token = rotated;
					}

					let cloned = record.clone();

					self.persist_locked(&guard)?;

					Some(cloned)
				},
				None => None,
			};

			Ok(result)
		})
	}
}
