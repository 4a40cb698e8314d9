//! Refresh-lock contracts and the built-in lock backends.
//!
//! A [`RefreshLock`] grants exclusive, non-blocking ownership of one credential key. Backends
//! never wait: contention is reported as `Ok(false)` and backoff belongs to the coordinator.

pub mod file;
pub mod memory;

pub use file::FileLock;
pub use memory::MemoryLock;

// self
use crate::{_prelude::*, auth::CredentialKey, clock};

/// Boxed future returned by [`RefreshLock`] operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LockError>> + 'a + Send>>;

/// Advisory mutual exclusion over the refresh of one credential key.
pub trait RefreshLock
where
	Self: Send + Sync,
{
	/// Attempts to take the lock for `key` without waiting.
	///
	/// Returns `Ok(false)` while another holder owns a non-stale lock.
	fn try_acquire<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, bool>;

	/// Releases a lock previously acquired through this handle. Releasing a missing lock
	/// succeeds.
	fn release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()>;

	/// Removes the lock for `key` regardless of which holder owns it.
	fn force_release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()>;
}

/// Error type produced by [`RefreshLock`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LockError {
	/// Lock metadata could not be encoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the lock storage.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Metadata written into a held lock.
///
/// Only the existence of the lock matters for exclusion; the record exists to diagnose and
/// reclaim abandoned locks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
	/// Process id of the holder.
	pub pid: u32,
	/// Acquisition instant, persisted as epoch milliseconds.
	#[serde(with = "clock::unix_millis")]
	pub timestamp: OffsetDateTime,
	/// Random nonce identifying the lock handle that wrote the record.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
}
impl LockRecord {
	/// Creates a record for the current process stamped with the current clock.
	pub fn now(owner: impl Into<String>) -> Self {
		Self { pid: std::process::id(), timestamp: clock::now_millis(), owner: Some(owner.into()) }
	}

	/// Age of the record at `instant`; never negative.
	pub fn age_at(&self, instant: OffsetDateTime) -> Duration {
		let age = instant - self.timestamp;

		if age.is_negative() { Duration::ZERO } else { age }
	}

	/// Returns `true` when the record is strictly older than `stale_after` at `instant`.
	pub fn is_stale_at(&self, instant: OffsetDateTime, stale_after: Duration) -> bool {
		self.age_at(instant) > stale_after
	}
}

pub(crate) fn random_owner() -> String {
	format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn staleness_is_strictly_greater_than_threshold() {
		let record = LockRecord {
			pid: 42,
			timestamp: macros::datetime!(2025-01-01 00:00 UTC),
			owner: None,
		};
		let threshold = Duration::seconds(60);

		assert!(!record.is_stale_at(macros::datetime!(2025-01-01 00:01 UTC), threshold));
		assert!(record.is_stale_at(macros::datetime!(2025-01-01 00:01:00.001 UTC), threshold));
		assert_eq!(record.age_at(macros::datetime!(2024-12-31 23:59 UTC)), Duration::ZERO);
	}

	#[test]
	fn record_json_matches_pid_timestamp_shape() {
		let parsed: LockRecord = serde_json::from_str("{\"pid\":1234,\"timestamp\":1735689600000}")
			.expect("Foreign lock records without an owner should parse.");

		assert_eq!(parsed.pid, 1234);
		assert_eq!(parsed.timestamp, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(parsed.owner, None);

		let fresh = LockRecord::now("abc");
		let value = serde_json::to_value(&fresh).expect("Lock record should serialize.");

		assert_eq!(value["pid"], std::process::id());
		assert_eq!(value["owner"], "abc");
		assert!(value["timestamp"].is_i64());
	}

	#[test]
	fn random_owners_differ() {
		assert_ne!(random_owner(), random_owner());
	}
}
