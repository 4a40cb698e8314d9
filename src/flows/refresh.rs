//! Coordinated token refresh with cross-process locking and a double-checked cache.
//!
//! [`Coordinator::get_token`] returns the caller's token untouched while it is valid. Otherwise
//! the caller first queues behind other tasks of this process working on the same credential,
//! then contends for the credential's [`RefreshLock`](crate::lock::RefreshLock). The winner
//! re-reads the shared cache (another process may have refreshed in the meantime) and only calls
//! the refresh function when the cache is still stale. Losers sleep, re-read the cache, and try
//! again until the configured wait budget runs out.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::runtime::Handle;
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	flows::{Coordinator, GetTokenOptions, RefreshReason, TokenResult, common},
	lock::RefreshLock,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl Coordinator {
	/// Returns a usable token for the credential `token` belongs to, refreshing it through
	/// `refresh` at most once across every cooperating process.
	///
	/// `refresh` receives the caller's record and must return a record with a non-empty access
	/// token. Its error is returned as [`Error::Refresh`] after the lock has been released, and
	/// nothing is cached in that case.
	pub async fn get_token<F, Fut, E>(
		&self,
		token: &TokenRecord,
		refresh: F,
		options: GetTokenOptions,
	) -> Result<TokenResult>
	where
		F: FnOnce(TokenRecord) -> Fut,
		Fut: Future<Output = Result<TokenRecord, E>>,
		E: 'static + Send + Sync + StdError,
	{
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "get_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.coordinate(token, refresh, options)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn coordinate<F, Fut, E>(
		&self,
		token: &TokenRecord,
		refresh: F,
		options: GetTokenOptions,
	) -> Result<TokenResult>
	where
		F: FnOnce(TokenRecord) -> Fut,
		Fut: Future<Output = Result<TokenRecord, E>>,
		E: 'static + Send + Sync + StdError,
	{
		let buffer = options.expiry_buffer.unwrap_or(self.config.expiry_buffer);

		if !options.force_refresh && token.is_valid(buffer) {
			tracing::debug!("Token is valid; skipping refresh.");

			return Ok(TokenResult::unchanged(token.clone()));
		}

		self.refresh_metrics.record_attempt();

		let key = token.key();
		let guard = common::flow_guard(self, &key);
		let _singleflight = guard.lock().await;
		let started = OffsetDateTime::now_utc();
		let interval =
			StdDuration::try_from(self.config.contention_interval).unwrap_or(StdDuration::ZERO);

		loop {
			if let Some(held) = self.try_lock(&key).await {
				let result = self.refresh_locked(token, &key, refresh, options, buffer).await;

				held.release().await;

				if result.is_err() {
					self.refresh_metrics.record_failure();
				}

				return result;
			}

			tracing::debug!(key = %key, "Refresh lock is held elsewhere; waiting for its result.");
			tokio::time::sleep(interval).await;

			if let Some(cached) = self.cache.get(&key).await {
				if options.accepts_cached(&cached, token, buffer) {
					self.refresh_metrics.record_cache_reuse();

					return Ok(TokenResult::refreshed(
						cached,
						RefreshReason::RefreshedByOtherProcess,
					));
				}
			}

			let waited = OffsetDateTime::now_utc() - started;

			if waited >= self.config.max_wait {
				tracing::warn!(key = %key, %waited, "Gave up waiting for the refresh lock.");
				self.refresh_metrics.record_failure();

				return Err(Error::LockTimeout { waited });
			}
		}
	}

	async fn refresh_locked<F, Fut, E>(
		&self,
		token: &TokenRecord,
		key: &CredentialKey,
		refresh: F,
		options: GetTokenOptions,
		buffer: Duration,
	) -> Result<TokenResult>
	where
		F: FnOnce(TokenRecord) -> Fut,
		Fut: Future<Output = Result<TokenRecord, E>>,
		E: 'static + Send + Sync + StdError,
	{
		if let Some(cached) = self.cache.get(key).await {
			if options.accepts_cached(&cached, token, buffer) {
				tracing::debug!(key = %key, "Cache already holds a refreshed token.");
				self.refresh_metrics.record_cache_reuse();

				return Ok(TokenResult::refreshed(cached, RefreshReason::AlreadyRefreshed));
			}
		}

		let fresh = refresh(token.clone()).await.map_err(Error::refresh)?;

		if fresh.access.is_blank() {
			return Err(Error::InvalidRefreshResult);
		}
		if let Err(e) = self.cache.put(fresh.clone()).await {
			tracing::warn!(key = %key, error = %e, "Failed to cache refreshed token; continuing.");
		}

		self.refresh_metrics.record_provider_refresh();
		tracing::info!(key = %key, "Refreshed token.");

		Ok(TokenResult::refreshed(fresh, RefreshReason::RefreshedNow))
	}

	async fn try_lock(&self, key: &CredentialKey) -> Option<HeldLock> {
		match self.lock.try_acquire(key).await {
			Ok(true) => Some(HeldLock::new(self.lock.clone(), key.clone())),
			Ok(false) => None,
			Err(e) => {
				tracing::warn!(key = %key, error = %e, "Lock backend failed; treating as contended.");

				None
			},
		}
	}
}

/// Refresh lock owned by one `get_token` call.
///
/// The normal path awaits [`HeldLock::release`]. If the call is cancelled or the refresh
/// function panics, `Drop` hands the release to the current Tokio runtime instead.
struct HeldLock {
	lock: Arc<dyn RefreshLock>,
	key: CredentialKey,
	armed: bool,
}
impl HeldLock {
	fn new(lock: Arc<dyn RefreshLock>, key: CredentialKey) -> Self {
		Self { lock, key, armed: true }
	}

	async fn release(mut self) {
		if let Err(e) = self.lock.release(&self.key).await {
			tracing::warn!(key = %self.key, error = %e, "Failed to release refresh lock.");
		}

		self.armed = false;
	}
}
impl Drop for HeldLock {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let lock = self.lock.clone();
		let key = self.key.clone();

		match Handle::try_current() {
			Ok(handle) => {
				tracing::debug!(key = %key, "Refresh abandoned; releasing lock in the background.");
				handle.spawn(async move {
					if let Err(e) = lock.release(&key).await {
						tracing::warn!(
							key = %key,
							error = %e,
							"Failed to release abandoned refresh lock."
						);
					}
				});
			},
			Err(_) => tracing::warn!(
				key = %key,
				"No runtime to release abandoned refresh lock; it stays until it goes stale."
			),
		}
	}
}
