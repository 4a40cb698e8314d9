//! Shared request/response types for coordinator flows and the in-process guard table.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	flows::Coordinator,
};

/// Per-call options for [`Coordinator::get_token`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GetTokenOptions {
	/// Skips the validity fast path and refreshes unless the cache already holds a different,
	/// valid token.
	pub force_refresh: bool,
	/// Early-refresh window; `None` uses the coordinator's configured default.
	pub expiry_buffer: Option<Duration>,
}
impl GetTokenOptions {
	/// Default options: no forced refresh, configured buffer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Forces a coordinated refresh.
	pub fn force_refresh(mut self) -> Self {
		self.force_refresh = true;

		self
	}

	/// Overrides the force flag.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force_refresh = force;

		self
	}

	/// Overrides the early-refresh window for this call.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = Some(if buffer.is_negative() { Duration::ZERO } else { buffer });

		self
	}

	/// Determines whether a cached record can stand in for the caller's token.
	///
	/// A forced refresh exists because the caller's access token was rejected, so a cached
	/// copy of that same token never satisfies it.
	pub fn accepts_cached(
		&self,
		cached: &TokenRecord,
		current: &TokenRecord,
		buffer: Duration,
	) -> bool {
		cached.is_valid(buffer) && !(self.force_refresh && cached.access == current.access)
	}
}

/// Why [`Coordinator::get_token`] returned a different record than it was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshReason {
	/// Another process refreshed while this caller waited on the lock.
	RefreshedByOtherProcess,
	/// The cache already held a fresh record once this caller owned the lock.
	AlreadyRefreshed,
	/// This caller invoked the refresh function.
	RefreshedNow,
}
impl RefreshReason {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshReason::RefreshedByOtherProcess => "refreshed-by-other-process",
			RefreshReason::AlreadyRefreshed => "already-refreshed",
			RefreshReason::RefreshedNow => "refreshed-now",
		}
	}
}
impl Display for RefreshReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of [`Coordinator::get_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResult {
	/// Record the caller should use from now on.
	pub token: TokenRecord,
	/// `true` when `token` differs from what the caller passed in.
	pub refreshed: bool,
	/// Where the refreshed record came from; `None` when nothing changed.
	pub reason: Option<RefreshReason>,
}
impl TokenResult {
	/// Result for a token that was already valid.
	pub fn unchanged(token: TokenRecord) -> Self {
		Self { token, refreshed: false, reason: None }
	}

	/// Result for a token obtained through a refresh.
	pub fn refreshed(token: TokenRecord, reason: RefreshReason) -> Self {
		Self { token, refreshed: true, reason: Some(reason) }
	}

	/// Consumes the result and returns the record.
	pub fn into_token(self) -> TokenRecord {
		self.token
	}
}

/// Returns (and creates on demand) the in-process guard for a credential key.
pub(crate) fn flow_guard(coordinator: &Coordinator, key: &CredentialKey) -> Arc<AsyncMutex<()>> {
	let mut guards = coordinator.flow_guards.lock();

	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}
