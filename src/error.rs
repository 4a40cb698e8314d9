//! Coordinator-level error types shared by the refresh flow, lock backends, and caches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Lock contention, stale locks, and cache I/O failures are recovered internally and never
/// surface here; only refresh failures, contention timeouts, and configuration problems do.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Lock backend failure that could not be treated as plain contention.
	#[error(transparent)]
	Lock(#[from] crate::lock::LockError),
	/// Cache backend failure surfaced by an explicit maintenance call.
	#[error(transparent)]
	Cache(#[from] crate::store::CacheError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The caller-supplied refresh function failed; nothing was cached.
	#[error("Token refresh failed: {source}")]
	Refresh {
		/// Error returned by the refresh function.
		#[source]
		source: BoxError,
	},
	/// The refresh function returned a record without a usable access token.
	#[error("Refresh function returned a record without an access token.")]
	InvalidRefreshResult,
	/// Another holder kept the refresh lock longer than the configured wait budget.
	#[error("Gave up waiting for the refresh lock after {waited}.")]
	LockTimeout {
		/// Time spent contending before giving up.
		waited: Duration,
	},
}
impl Error {
	/// Wraps an error returned by a caller-supplied refresh function.
	pub fn refresh(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Refresh { source: Box::new(src) }
	}

	/// Returns the refresh function's own error when this is [`Error::Refresh`].
	pub fn refresh_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
		match self {
			Self::Refresh { source } => Some(source.as_ref()),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// The state directory environment variable is not set.
	#[error("Environment variable `{var}` is not set.")]
	MissingStateDir {
		/// Name of the variable that was consulted.
		var: &'static str,
	},
	/// A configured directory is empty.
	#[error("Configured path `{field}` is empty.")]
	EmptyPath {
		/// Field name.
		field: &'static str,
	},
	/// A configured duration must be strictly positive.
	#[error("Configured duration `{field}` must be positive.")]
	NonPositiveDuration {
		/// Field name.
		field: &'static str,
	},
}
