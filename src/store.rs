//! Token cache contracts and built-in cache implementations.

pub mod file;
pub mod memory;

pub use file::FileTokenCache;
pub use memory::MemoryTokenCache;

// std
use std::{fs, io, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Durable map from credential key to the most recently known-good token record.
///
/// Reads are best-effort: a missing, unreadable, or malformed entry is a miss. Writes replace
/// the whole record and report failures so the caller can decide whether to swallow them.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the cached record for `key`, if one is readable.
	fn get<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Option<TokenRecord>>;

	/// Persists or replaces the record under its derived key.
	fn put(&self, record: TokenRecord) -> CacheFuture<'_, Result<(), CacheError>>;

	/// Removes the record for `key`; removing a missing entry succeeds.
	fn remove<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Result<(), CacheError>>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
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

/// Creates `dir` (and parents) restricted to the current user on Unix.
pub(crate) fn ensure_private_dir(dir: &Path) -> io::Result<()> {
	if dir.is_dir() {
		return Ok(());
	}

	#[cfg(unix)]
	{
		use std::os::unix::fs::DirBuilderExt;

		fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
	}
	#[cfg(not(unix))]
	{
		fs::create_dir_all(dir)
	}
}
