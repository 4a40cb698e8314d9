//! File-backed [`RefreshLock`] usable across unrelated processes on one machine.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	time::SystemTime,
};
// self
use crate::{
	_prelude::*,
	auth::CredentialKey,
	lock::{LockError, LockFuture, LockRecord, RefreshLock},
	store,
};

/// Advisory lock implemented as `<dir>/<key>.lock` created with `O_CREAT | O_EXCL`.
///
/// The file's existence is the mutex; its JSON body (`{pid, timestamp, owner}`) lets any
/// contender reclaim a lock whose holder crashed. A lock older than `stale_after` is removed
/// even if the holder is merely slow, so a refresh that outlives the threshold may overlap with
/// a second one. Release only unlinks the file while it still carries this handle's owner
/// nonce, which keeps a reclaimed holder from deleting its successor's lock. Reclaiming renames
/// the stale file to a per-handle tombstone before re-checking it, so two contenders racing on
/// the same stale lock cannot both win; the window left is the instant between retiring a
/// fresh lock by mistake and linking it back.
#[derive(Clone, Debug)]
pub struct FileLock {
	dir: PathBuf,
	stale_after: Duration,
	owner: String,
}
impl FileLock {
	/// Creates a lock handle rooted at `dir`. The directory is created on first use.
	pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Self {
		Self { dir: dir.into(), stale_after, owner: super::random_owner() }
	}

	/// Nonce written into every lock this handle acquires.
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Path of the lock file for `key`.
	pub fn path_for(&self, key: &CredentialKey) -> PathBuf {
		self.dir.join(format!("{key}.lock"))
	}

	/// Reads the current lock record for `key`, if one exists and parses.
	pub fn inspect(&self, key: &CredentialKey) -> Option<LockRecord> {
		Self::read_record(&self.path_for(key)).ok()
	}

	fn acquire_now(&self, key: &CredentialKey) -> bool {
		if let Err(e) = store::ensure_private_dir(&self.dir) {
			tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to prepare lock directory.");

			return false;
		}

		let path = self.path_for(key);

		self.create_or_reclaim(&path, true)
	}

	fn create_or_reclaim(&self, path: &Path, allow_reclaim: bool) -> bool {
		match self.create_exclusive(path) {
			Ok(()) => true,
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				if allow_reclaim && self.reclaim_if_stale(path) {
					return self.create_or_reclaim(path, false);
				}

				false
			},
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Failed to create lock file.");

				false
			},
		}
	}

	fn create_exclusive(&self, path: &Path) -> std::io::Result<()> {
		let mut options = OpenOptions::new();

		options.write(true).create_new(true);

		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;

			options.mode(0o600);
		}

		let mut file = options.open(path)?;
		let payload = serde_json::to_vec(&LockRecord::now(self.owner.as_str()))
			.map_err(std::io::Error::other)?;

		if let Err(e) = file.write_all(&payload) {
			drop(file);

			let _ = fs::remove_file(path);

			return Err(e);
		}

		Ok(())
	}

	fn reclaim_if_stale(&self, path: &Path) -> bool {
		match self.judge_stale(path) {
			Ok(true) => self.retire(path),
			Ok(false) => false,
			Err(e) if e.kind() == ErrorKind::NotFound => true,
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Failed to inspect lock.");

				false
			},
		}
	}

	/// Moves a lock judged stale out of the way under a name only this handle uses.
	///
	/// A contender that judged the same record stale may have already replaced it with a fresh
	/// lock. The tombstone is therefore re-checked after the rename, and a fresh lock taken by
	/// mistake is linked back into place.
	fn retire(&self, path: &Path) -> bool {
		let tombstone = self.tombstone_for(path);

		match fs::rename(path, &tombstone) {
			Ok(()) => {},
			Err(e) if e.kind() == ErrorKind::NotFound => return false,
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Failed to retire stale lock.");

				return false;
			},
		}

		let still_stale = self.judge_stale(&tombstone).unwrap_or(false);

		if !still_stale {
			if let Err(e) = fs::hard_link(&tombstone, path) {
				tracing::warn!(
					path = %path.display(),
					error = %e,
					"Failed to restore a lock retired by a racing contender."
				);
			}
		}
		if let Err(e) = fs::remove_file(&tombstone) {
			tracing::warn!(
				path = %tombstone.display(),
				error = %e,
				"Failed to remove lock tombstone."
			);
		}
		if still_stale {
			tracing::info!(path = %path.display(), "Reclaimed stale refresh lock.");
		}

		still_stale
	}

	fn judge_stale(&self, path: &Path) -> std::io::Result<bool> {
		match Self::read_record(path) {
			Ok(record) => Ok(record.is_stale_at(OffsetDateTime::now_utc(), self.stale_after)),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
			Err(e) if e.kind() == ErrorKind::InvalidData => {
				Ok(self.modified_age(path).is_some_and(|age| age > self.stale_after))
			},
			Err(e) => Err(e),
		}
	}

	fn tombstone_for(&self, path: &Path) -> PathBuf {
		let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

		name.push(format!(".{}.stale", self.owner));

		path.with_file_name(name)
	}

	fn modified_age(&self, path: &Path) -> Option<Duration> {
		let modified = fs::metadata(path).ok()?.modified().ok()?;
		let age = SystemTime::now().duration_since(modified).unwrap_or_default();

		Duration::try_from(age).ok()
	}

	fn read_record(path: &Path) -> std::io::Result<LockRecord> {
		let bytes = fs::read(path)?;

		serde_json::from_slice(&bytes).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
	}

	fn release_now(&self, key: &CredentialKey, check_owner: bool) -> Result<(), LockError> {
		let path = self.path_for(key);

		if check_owner {
			if let Ok(LockRecord { owner: Some(owner), pid, .. }) = Self::read_record(&path) {
				if owner != self.owner {
					tracing::warn!(
						path = %path.display(),
						holder_pid = pid,
						"Refresh lock was reclaimed by another holder; leaving it in place."
					);

					return Ok(());
				}
			}
		}

		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(LockError::Backend {
				message: format!("Failed to remove {}: {e}", path.display()),
			}),
		}
	}
}
impl RefreshLock for FileLock {
	fn try_acquire<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, bool> {
		Box::pin(async move { Ok(self.acquire_now(key)) })
	}

	fn release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()> {
		Box::pin(async move { self.release_now(key, true) })
	}

	fn force_release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()> {
		Box::pin(async move { self.release_now(key, false) })
	}
}
