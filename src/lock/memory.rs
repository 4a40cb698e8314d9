//! In-process [`RefreshLock`] with TTL expiry for tests and single-process deployments.

// self
use crate::{
	_prelude::*,
	auth::CredentialKey,
	lock::{LockFuture, RefreshLock},
};

type LockMap = Arc<Mutex<HashMap<CredentialKey, Holder>>>;

#[derive(Debug)]
struct Holder {
	owner: String,
	acquired: OffsetDateTime,
}

/// Lock table keyed by credential; entries older than the TTL count as abandoned.
///
/// Clones share the same table but carry their own owner nonce, so several coordinators built
/// from clones contend exactly like separate processes sharing a lock directory. Release only
/// drops an entry this handle owns.
#[derive(Debug)]
pub struct MemoryLock {
	held: LockMap,
	ttl: Duration,
	owner: String,
}
impl MemoryLock {
	/// Creates an empty lock table whose entries expire after `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { held: Default::default(), ttl, owner: super::random_owner() }
	}

	/// Nonce recorded for every entry this handle acquires.
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Returns `true` if `key` is currently held by anyone.
	pub fn is_held(&self, key: &CredentialKey) -> bool {
		let now = OffsetDateTime::now_utc();

		self.held.lock().get(key).is_some_and(|holder| now - holder.acquired <= self.ttl)
	}

	fn acquire_now(&self, key: &CredentialKey) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.held.lock();

		match guard.get(key) {
			Some(holder) if now - holder.acquired <= self.ttl => return false,
			Some(holder) => {
				tracing::info!(
					key = %key,
					previous = %holder.owner,
					"Reclaimed expired in-memory refresh lock."
				);
			},
			None => {},
		}

		guard.insert(key.clone(), Holder { owner: self.owner.clone(), acquired: now });

		true
	}

	fn release_now(&self, key: &CredentialKey, check_owner: bool) {
		let mut guard = self.held.lock();

		if check_owner && guard.get(key).is_some_and(|holder| holder.owner != self.owner) {
			tracing::warn!(
				key = %key,
				"In-memory refresh lock was reclaimed by another holder; leaving it in place."
			);

			return;
		}

		guard.remove(key);
	}
}
impl Clone for MemoryLock {
	fn clone(&self) -> Self {
		Self { held: self.held.clone(), ttl: self.ttl, owner: super::random_owner() }
	}
}
impl Default for MemoryLock {
	fn default() -> Self {
		Self::new(Duration::seconds(60))
	}
}
impl RefreshLock for MemoryLock {
	fn try_acquire<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, bool> {
		Box::pin(async move { Ok(self.acquire_now(key)) })
	}

	fn release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()> {
		Box::pin(async move {
			self.release_now(key, true);

			Ok(())
		})
	}

	fn force_release<'a>(&'a self, key: &'a CredentialKey) -> LockFuture<'a, ()> {
		Box::pin(async move {
			self.release_now(key, false);

			Ok(())
		})
	}
}
