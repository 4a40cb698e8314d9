//! Refresh coordination flows powered by the [`Coordinator`] facade.

pub mod common;
pub mod refresh;
pub mod retry;

pub use common::*;
pub use refresh::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::CredentialKey,
	config::CoordinatorConfig,
	lock::{FileLock, RefreshLock},
	store::{FileTokenCache, TokenCache},
};

/// Coordinates credential refreshes between tasks and processes sharing a state directory.
///
/// Construct one coordinator per process and hand it (or a clone) to every call site; clones
/// share the lock backend, cache backend, in-process guards, and metrics. The lock and cache
/// are trait objects so the same algorithm runs against the filesystem, an in-memory table, or
/// any other [`RefreshLock`] / [`TokenCache`] implementation.
#[derive(Clone)]
pub struct Coordinator {
	/// Lock backend providing cross-process exclusion per credential.
	pub lock: Arc<dyn RefreshLock>,
	/// Shared cache holding the most recently refreshed record per credential.
	pub cache: Arc<dyn TokenCache>,
	/// Paths and timings used by every flow.
	pub config: CoordinatorConfig,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Arc<Mutex<HashMap<CredentialKey, Arc<AsyncMutex<()>>>>>,
}
impl Coordinator {
	/// Creates a coordinator over caller-provided lock and cache backends.
	pub fn new(
		lock: Arc<dyn RefreshLock>,
		cache: Arc<dyn TokenCache>,
		config: CoordinatorConfig,
	) -> Self {
		Self {
			lock,
			cache,
			config,
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Creates a coordinator backed by [`FileLock`] and [`FileTokenCache`] in the configured
	/// directories.
	pub fn from_config(config: CoordinatorConfig) -> Result<Self> {
		config.validate()?;

		let lock: Arc<dyn RefreshLock> =
			Arc::new(FileLock::new(config.lock_dir.clone(), config.stale_after));
		let cache: Arc<dyn TokenCache> = Arc::new(FileTokenCache::new(config.cache_dir.clone()));

		Ok(Self::new(lock, cache, config))
	}

	/// Removes the lock for `key` regardless of its holder.
	///
	/// Meant for operators recovering from a wedged holder without waiting for the stale
	/// threshold.
	pub async fn force_unlock(&self, key: &CredentialKey) -> Result<()> {
		tracing::warn!(key = %key, "Forcibly removing refresh lock.");

		self.lock.force_release(key).await?;

		Ok(())
	}

	/// Drops the cached record for `key` so the next caller must refresh or re-authorize.
	pub async fn forget_token(&self, key: &CredentialKey) -> Result<()> {
		self.cache.remove(key).await?;

		Ok(())
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("config", &self.config)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}
