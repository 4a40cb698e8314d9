//! Retry wrapper that recovers downstream calls from mid-flight token invalidation.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	classify::{self, AuthErrorSignal},
	flows::{Coordinator, GetTokenOptions},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Token handle shared between the retry wrapper and the operation it retries.
///
/// The wrapper updates the record in place after a forced refresh, so operations should read the
/// handle on every attempt instead of capturing a copy.
pub type SharedToken = Arc<RwLock<TokenRecord>>;

/// Callback invoked with the new record after each successful forced refresh.
pub type TokenRefreshedHook = Arc<dyn Fn(&TokenRecord) + Send + Sync>;

/// Options for [`Coordinator::retry_with_oauth_refresh`].
#[derive(Clone)]
pub struct RetryOptions {
	/// Number of forced refreshes allowed before the last error is returned.
	pub max_retries: u32,
	/// Optional hook notified after each refresh, e.g. to persist the credential elsewhere.
	pub on_token_refreshed: Option<TokenRefreshedHook>,
}
impl RetryOptions {
	const DEFAULT_MAX_RETRIES: u32 = 2;

	/// Default options: two retries, no hook.
	pub fn new() -> Self {
		Self { max_retries: Self::DEFAULT_MAX_RETRIES, on_token_refreshed: None }
	}

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Registers a hook called with every refreshed record.
	pub fn on_token_refreshed(
		mut self,
		hook: impl 'static + Fn(&TokenRecord) + Send + Sync,
	) -> Self {
		self.on_token_refreshed = Some(Arc::new(hook));

		self
	}
}
impl Default for RetryOptions {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for RetryOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryOptions")
			.field("max_retries", &self.max_retries)
			.field("on_token_refreshed_set", &self.on_token_refreshed.is_some())
			.finish()
	}
}

/// Creates a [`SharedToken`] from an owned record.
pub fn shared_token(token: TokenRecord) -> SharedToken {
	Arc::new(RwLock::new(token))
}

impl Coordinator {
	/// Runs `operation`, forcing a coordinated refresh and retrying whenever it fails with an
	/// error that [`classify::is_oauth_auth_error`] recognises.
	///
	/// Non-auth errors are returned immediately. Once `max_retries` refreshes have been spent,
	/// or when a forced refresh itself fails, the operation's own error is returned so callers
	/// never see refresh plumbing in place of the failure that triggered it.
	pub async fn retry_with_oauth_refresh<T, E, Op, OpFut, R, RFut, RE>(
		&self,
		mut operation: Op,
		token: &SharedToken,
		mut refresh: R,
		options: RetryOptions,
	) -> Result<T, E>
	where
		Op: FnMut() -> OpFut,
		OpFut: Future<Output = Result<T, E>>,
		E: AuthErrorSignal,
		R: FnMut(TokenRecord) -> RFut,
		RFut: Future<Output = Result<TokenRecord, RE>>,
		RE: 'static + Send + Sync + StdError,
	{
		const KIND: FlowKind = FlowKind::Retry;

		let span = FlowSpan::new(KIND, "retry_with_oauth_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut attempt = 0;

				loop {
					let err = match operation().await {
						Ok(value) => return Ok(value),
						Err(err) => err,
					};

					if !classify::is_oauth_auth_error(&err) {
						return Err(err);
					}
					if attempt >= options.max_retries {
						tracing::warn!(attempt, "Auth error persisted after exhausting retries.");

						return Err(err);
					}

					attempt += 1;

					let current = token.read().clone();
					let refreshed = match self
						.get_token(
							&current,
							|record| refresh(record),
							GetTokenOptions::new().force_refresh(),
						)
						.await
					{
						Ok(result) => result.token,
						Err(refresh_err) => {
							tracing::warn!(
								error = %refresh_err,
								"Forced refresh failed; returning the original error."
							);

							return Err(err);
						},
					};

					token.write().merge_refreshed(&refreshed);

					if let Some(hook) = &options.on_token_refreshed {
						hook(&refreshed);
					}

					tracing::debug!(attempt, "Retrying after forced refresh.");
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{_preludet, classify::ApiError};

	fn valid_token() -> SharedToken {
		shared_token(_preludet::token_fixture(
			"anthropic",
			"access-0",
			Some(OffsetDateTime::now_utc() + Duration::hours(1)),
		))
	}

	#[tokio::test]
	async fn failed_forced_refresh_returns_original_error() {
		let (coordinator, _, _) =
			_preludet::build_memory_coordinator(_preludet::fast_test_config("retry_refresh_fail"));
		let token = valid_token();
		let err = coordinator
			.retry_with_oauth_refresh(
				|| async { Err::<(), _>(ApiError::new(401, "downstream says no")) },
				&token,
				|_| async { Err::<TokenRecord, _>(ApiError::new(400, "invalid_grant")) },
				RetryOptions::new(),
			)
			.await
			.expect_err("The downstream error should surface.");

		assert_eq!(err, ApiError::new(401, "downstream says no"));
		assert_eq!(token.read().access.expose(), "access-0");
	}

	#[tokio::test]
	async fn exhausted_retries_return_last_auth_error() {
		let (coordinator, _, _) =
			_preludet::build_memory_coordinator(_preludet::fast_test_config("retry_exhausted"));
		let token = valid_token();
		let refreshes = AtomicUsize::new(0);
		let calls = AtomicUsize::new(0);
		let err = coordinator
			.retry_with_oauth_refresh(
				|| async {
					calls.fetch_add(1, Ordering::SeqCst);

					Err::<(), _>(ApiError::from_message("invalid_token"))
				},
				&token,
				|current| {
					let n = refreshes.fetch_add(1, Ordering::SeqCst) + 1;

					async move {
						let mut next = current;

						next.access = crate::auth::TokenSecret::new(format!("access-{n}"));

						Ok::<_, ApiError>(next)
					}
				},
				RetryOptions::new().with_max_retries(1),
			)
			.await
			.expect_err("Retries should be exhausted.");

		assert_eq!(err.message, "invalid_token");
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(token.read().access.expose(), "access-1");
	}
}
