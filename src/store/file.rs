//! One-file-per-credential [`TokenCache`] shared by every process using the same directory.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::PathBuf,
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	lock,
	store::{self, CacheError, CacheFuture, TokenCache},
};

/// Stores each record as `<dir>/<key>.json` with owner-only permissions.
///
/// Writes go to a sibling temp file which is fsynced and renamed over the target, so readers in
/// other processes observe either the previous record or the new one.
#[derive(Clone, Debug)]
pub struct FileTokenCache {
	dir: PathBuf,
	nonce: String,
}
impl FileTokenCache {
	/// Creates a cache rooted at `dir`. The directory is created on first write.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into(), nonce: lock::random_owner() }
	}

	/// Path of the cache entry for `key`.
	pub fn path_for(&self, key: &CredentialKey) -> PathBuf {
		self.dir.join(format!("{key}.json"))
	}

	fn tmp_path_for(&self, key: &CredentialKey) -> PathBuf {
		self.dir.join(format!("{key}.{}.{}.tmp", std::process::id(), self.nonce))
	}

	fn load(&self, key: &CredentialKey) -> Option<TokenRecord> {
		let path = self.path_for(key);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return None,
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Failed to read cached token.");

				return None;
			},
		};
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let record: TokenRecord = match serde_path_to_error::deserialize(&mut deserializer) {
			Ok(record) => record,
			Err(e) => {
				tracing::warn!(
					path = %path.display(),
					field = %e.path(),
					error = %e.inner(),
					"Ignoring malformed cached token."
				);

				return None;
			},
		};

		if &record.key() != key {
			tracing::warn!(path = %path.display(), "Ignoring cached token stored under a foreign key.");

			return None;
		}

		Some(record)
	}

	fn persist(&self, record: &TokenRecord) -> Result<(), CacheError> {
		store::ensure_private_dir(&self.dir).map_err(|e| CacheError::Backend {
			message: format!("Failed to create cache directory {}: {e}", self.dir.display()),
		})?;

		let key = record.key();
		let path = self.path_for(&key);
		let tmp_path = self.tmp_path_for(&key);
		let serialized = serde_json::to_vec_pretty(record).map_err(|e| {
			CacheError::Serialization { message: format!("Failed to serialize token record: {e}") }
		})?;

		{
			let mut options = OpenOptions::new();

			options.write(true).create(true).truncate(true);

			#[cfg(unix)]
			{
				use std::os::unix::fs::OpenOptionsExt;

				options.mode(0o600);
			}

			let mut file = options.open(&tmp_path).map_err(|e| CacheError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CacheError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CacheError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &path).map_err(|e| {
			let _ = fs::remove_file(&tmp_path);

			CacheError::Backend { message: format!("Failed to replace {}: {e}", path.display()) }
		})
	}

	fn delete(&self, key: &CredentialKey) -> Result<(), CacheError> {
		let path = self.path_for(key);

		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(CacheError::Backend {
				message: format!("Failed to remove {}: {e}", path.display()),
			}),
		}
	}
}
impl TokenCache for FileTokenCache {
	fn get<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { self.load(key) })
	}

	fn put(&self, record: TokenRecord) -> CacheFuture<'_, Result<(), CacheError>> {
		Box::pin(async move { self.persist(&record) })
	}

	fn remove<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Result<(), CacheError>> {
		Box::pin(async move { self.delete(key) })
	}
}
