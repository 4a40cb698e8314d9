//! Cross-process OAuth 2.0 refresh coordination: file-backed refresh locks, a shared token
//! cache, and retry-on-401 wrappers for processes that share one long-lived credential.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod flows;
pub mod lock;
pub mod obs;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// std
	use std::{env, path::PathBuf, process};
	// self
	use crate::{
		auth::{ProfileId, ProviderId, TokenRecord},
		config::CoordinatorConfig,
		flows::Coordinator,
		lock::{MemoryLock, RefreshLock},
		store::{MemoryTokenCache, TokenCache},
	};

	/// Returns a unique, not-yet-created directory under the system temp dir.
	pub fn test_state_dir(label: &str) -> PathBuf {
		let unique = format!(
			"oauth2_refresh_coordinator_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	/// Config with short contention intervals so tests do not sleep for whole seconds.
	pub fn fast_test_config(label: &str) -> CoordinatorConfig {
		CoordinatorConfig::new(test_state_dir(label))
			.with_contention_interval(Duration::milliseconds(20))
			.with_max_wait(Duration::seconds(5))
	}

	/// Builds a coordinator backed by in-memory lock and cache backends.
	///
	/// The returned backends can be shared with further coordinators to simulate several
	/// processes contending for the same credential.
	pub fn build_memory_coordinator(
		config: CoordinatorConfig,
	) -> (Coordinator, Arc<MemoryLock>, Arc<MemoryTokenCache>) {
		let lock_backend = Arc::new(MemoryLock::new(config.stale_after));
		let cache_backend = Arc::new(MemoryTokenCache::default());
		let lock: Arc<dyn RefreshLock> = lock_backend.clone();
		let cache: Arc<dyn TokenCache> = cache_backend.clone();

		(Coordinator::new(lock, cache, config), lock_backend, cache_backend)
	}

	/// Builds a token record for `provider` (default profile) expiring at `expires`.
	pub fn token_fixture(
		provider: &str,
		access: &str,
		expires: Option<OffsetDateTime>,
	) -> TokenRecord {
		let provider = ProviderId::new(provider).expect("Provider fixture should be valid.");
		let mut builder = TokenRecord::builder(provider).access_token(access).refresh_token("rt-0");

		if let Some(instant) = expires {
			builder = builder.expires_at(instant);
		}

		builder.build().expect("Token record fixture should build successfully.")
	}

	/// Same as [`token_fixture`] but bound to an explicit profile.
	pub fn profiled_token_fixture(
		provider: &str,
		profile: &str,
		access: &str,
		expires: Option<OffsetDateTime>,
	) -> TokenRecord {
		let mut record = token_fixture(provider, access, expires);

		record.profile = Some(ProfileId::new(profile).expect("Profile fixture should be valid."));

		record
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(test)] use color_eyre as _;
