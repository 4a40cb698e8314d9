//! Coordinator configuration: state directories and timing knobs.

// std
use std::{env, path::PathBuf};
// self
use crate::{_prelude::*, error::ConfigError};

/// Paths and timings shared by every coordinator instance in a process.
///
/// All processes that should coordinate on a credential must point at the same lock and cache
/// directories. Durations default to the values the refresh algorithm was tuned for; tests
/// usually shrink `contention_interval`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
	/// Directory holding `<key>.lock` files.
	pub lock_dir: PathBuf,
	/// Directory holding `<key>.json` cached token records.
	pub cache_dir: PathBuf,
	/// Age after which a lock record is considered abandoned.
	pub stale_after: Duration,
	/// Sleep between attempts while another holder owns the lock.
	pub contention_interval: Duration,
	/// Total time a caller may spend waiting on a contended lock.
	pub max_wait: Duration,
	/// Default early-refresh window applied when a call does not override it.
	pub expiry_buffer: Duration,
}
impl CoordinatorConfig {
	/// Environment variable read by [`CoordinatorConfig::from_env`].
	pub const STATE_DIR_ENV: &'static str = "OAUTH2_REFRESH_STATE_DIR";
	/// Default stale-lock threshold.
	pub const DEFAULT_STALE_AFTER: Duration = Duration::seconds(60);
	/// Default sleep between contention attempts.
	pub const DEFAULT_CONTENTION_INTERVAL: Duration = Duration::seconds(1);
	/// Default contention budget.
	pub const DEFAULT_MAX_WAIT: Duration = Duration::seconds(30);
	/// Default early-refresh window.
	pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::minutes(5);

	/// Creates a config rooted at `state_dir` (`locks/` and `tokens/` beneath it).
	pub fn new(state_dir: impl Into<PathBuf>) -> Self {
		let state_dir = state_dir.into();

		Self {
			lock_dir: state_dir.join("locks"),
			cache_dir: state_dir.join("tokens"),
			stale_after: Self::DEFAULT_STALE_AFTER,
			contention_interval: Self::DEFAULT_CONTENTION_INTERVAL,
			max_wait: Self::DEFAULT_MAX_WAIT,
			expiry_buffer: Self::DEFAULT_EXPIRY_BUFFER,
		}
	}

	/// Builds a config from [`Self::STATE_DIR_ENV`].
	pub fn from_env() -> Result<Self, ConfigError> {
		match env::var_os(Self::STATE_DIR_ENV) {
			Some(dir) if !dir.is_empty() => Ok(Self::new(dir)),
			_ => Err(ConfigError::MissingStateDir { var: Self::STATE_DIR_ENV }),
		}
	}

	/// Overrides the lock directory.
	pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.lock_dir = dir.into();

		self
	}

	/// Overrides the token cache directory.
	pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cache_dir = dir.into();

		self
	}

	/// Overrides the stale-lock threshold (defaults to 60 seconds).
	pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
		self.stale_after = stale_after;

		self
	}

	/// Overrides the contention sleep (defaults to 1 second).
	pub fn with_contention_interval(mut self, interval: Duration) -> Self {
		self.contention_interval = interval;

		self
	}

	/// Overrides the contention budget (defaults to 30 seconds).
	pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
		self.max_wait = max_wait;

		self
	}

	/// Overrides the default early-refresh window (defaults to 5 minutes).
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Checks paths and durations before any backend is built.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.lock_dir.as_os_str().is_empty() {
			return Err(ConfigError::EmptyPath { field: "lock_dir" });
		}
		if self.cache_dir.as_os_str().is_empty() {
			return Err(ConfigError::EmptyPath { field: "cache_dir" });
		}

		for (field, value) in [
			("stale_after", self.stale_after),
			("contention_interval", self.contention_interval),
			("max_wait", self.max_wait),
		] {
			if !value.is_positive() {
				return Err(ConfigError::NonPositiveDuration { field });
			}
		}

		Ok(())
	}
}
