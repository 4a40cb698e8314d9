//! Thread-safe in-memory [`TokenCache`] for tests and single-process deployments.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	store::{CacheError, CacheFuture, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<CredentialKey, TokenRecord>>>;

/// Cache backend that keeps records in-process. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl MemoryTokenCache {
	/// Number of cached credentials.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenCache for MemoryTokenCache {
	fn get<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { map.read().get(key).cloned() })
	}

	fn put(&self, record: TokenRecord) -> CacheFuture<'_, Result<(), CacheError>> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(record.key(), record);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a CredentialKey) -> CacheFuture<'a, Result<(), CacheError>> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}
