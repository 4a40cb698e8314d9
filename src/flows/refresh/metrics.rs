// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for coordinated refreshes.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	provider_refreshes: AtomicU64,
	cache_reuses: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of calls that left the fast path.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns how often this process invoked a refresh function successfully.
	pub fn provider_refreshes(&self) -> u64 {
		self.provider_refreshes.load(Ordering::Relaxed)
	}

	/// Returns how often a record refreshed by someone else was reused from the cache.
	pub fn cache_reuses(&self) -> u64 {
		self.cache_reuses.load(Ordering::Relaxed)
	}

	/// Returns the number of failed calls.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_provider_refresh(&self) {
		self.provider_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_reuse(&self) {
		self.cache_reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
