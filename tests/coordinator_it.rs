// std
use std::{
	fs,
	sync::atomic::{AtomicUsize, Ordering},
};
// self
use oauth2_refresh_coordinator::{
	_preludet::*,
	auth::{TokenRecord, TokenSecret},
	classify::ApiError,
	config::CoordinatorConfig,
	flows::{Coordinator, GetTokenOptions, RefreshReason},
	lock::RefreshLock,
	store::{FileTokenCache, TokenCache},
};

fn expired_token(access: &str) -> TokenRecord {
	token_fixture("anthropic", access, Some(OffsetDateTime::now_utc() - Duration::minutes(1)))
}

fn rotated(current: &TokenRecord, access: &str) -> TokenRecord {
	let mut next = current.clone();

	next.access = TokenSecret::new(access);
	next.refresh = Some(TokenSecret::new(format!("{access}-refresh")));
	next.expires = Some(OffsetDateTime::now_utc() + Duration::hours(1));

	next
}

#[tokio::test]
async fn valid_token_skips_refresh_and_lock() {
	let (coordinator, lock, cache) = build_memory_coordinator(fast_test_config("valid"));
	let token =
		token_fixture("anthropic", "still-good", Some(OffsetDateTime::now_utc() + Duration::hours(2)));
	let calls = AtomicUsize::new(0);
	let result = coordinator
		.get_token(
			&token,
			|current| async {
				calls.fetch_add(1, Ordering::SeqCst);

				Ok::<_, ApiError>(current)
			},
			GetTokenOptions::new(),
		)
		.await
		.expect("Valid tokens should be returned as-is.");

	assert!(!result.refreshed);
	assert_eq!(result.reason, None);
	assert_eq!(result.token, token);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert!(!lock.is_held(&token.key()));
	assert!(cache.is_empty());
	assert_eq!(coordinator.refresh_metrics.attempts(), 0);
}

#[tokio::test]
async fn token_inside_expiry_buffer_is_refreshed_early() {
	let (coordinator, _, _) = build_memory_coordinator(fast_test_config("buffer"));
	let token = token_fixture(
		"anthropic",
		"about-to-expire",
		Some(OffsetDateTime::now_utc() + Duration::minutes(2)),
	);
	let result = coordinator
		.get_token(
			&token,
			|current| async move { Ok::<_, ApiError>(rotated(&current, "early")) },
			GetTokenOptions::new(),
		)
		.await
		.expect("Tokens inside the default 5 minute buffer should refresh.");

	assert_eq!(result.reason, Some(RefreshReason::RefreshedNow));

	let relaxed = coordinator
		.get_token(
			&token,
			|_| async { Err::<TokenRecord, _>(ApiError::from_message("must not refresh")) },
			GetTokenOptions::new().with_expiry_buffer(Duration::minutes(1)),
		)
		.await
		.expect("A smaller buffer should keep the token valid.");

	assert!(!relaxed.refreshed);
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_cached() {
	let (coordinator, lock, cache) = build_memory_coordinator(fast_test_config("expired"));
	let token = expired_token("expired");
	let calls = AtomicUsize::new(0);
	let result = coordinator
		.get_token(
			&token,
			|current| {
				calls.fetch_add(1, Ordering::SeqCst);

				async move { Ok::<_, ApiError>(rotated(&current, "access-new")) }
			},
			GetTokenOptions::new(),
		)
		.await
		.expect("Expired tokens should refresh.");

	assert!(result.refreshed);
	assert_eq!(result.reason, Some(RefreshReason::RefreshedNow));
	assert_eq!(result.token.access.expose(), "access-new");
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(!lock.is_held(&token.key()));

	let cached = cache.get(&token.key()).await.expect("Refreshed token should be cached.");

	assert_eq!(cached, result.token);
	assert_eq!(coordinator.refresh_metrics.provider_refreshes(), 1);
}

#[tokio::test]
async fn force_refresh_invokes_refresh_for_valid_token() {
	let (coordinator, _, _) = build_memory_coordinator(fast_test_config("force"));
	let token =
		token_fixture("anthropic", "valid", Some(OffsetDateTime::now_utc() + Duration::hours(2)));
	let calls = AtomicUsize::new(0);
	let result = coordinator
		.get_token(
			&token,
			|current| {
				calls.fetch_add(1, Ordering::SeqCst);

				async move { Ok::<_, ApiError>(rotated(&current, "forced")) }
			},
			GetTokenOptions::new().force_refresh(),
		)
		.await
		.expect("Forced refresh should succeed.");

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(result.reason, Some(RefreshReason::RefreshedNow));
	assert_eq!(result.token.access.expose(), "forced");
}

#[tokio::test]
async fn cache_refreshed_elsewhere_is_reused_under_lock() {
	let (coordinator, _, cache) = build_memory_coordinator(fast_test_config("double_check"));
	let token = expired_token("expired");

	cache
		.put(rotated(&token, "written-by-peer"))
		.await
		.expect("Seeding the shared cache should succeed.");

	let result = coordinator
		.get_token(
			&token,
			|_| async { Err::<TokenRecord, _>(ApiError::from_message("must not refresh")) },
			GetTokenOptions::new(),
		)
		.await
		.expect("The cached record should satisfy the call.");

	assert_eq!(result.reason, Some(RefreshReason::AlreadyRefreshed));
	assert_eq!(result.token.access.expose(), "written-by-peer");
}

#[tokio::test]
async fn thundering_herd_across_processes_refreshes_once() {
	let config = fast_test_config("herd_memory");
	let (first, lock, cache) = build_memory_coordinator(config.clone());
	let peers: Vec<Coordinator> = (0..4)
		.map(|_| {
			let lock: Arc<dyn RefreshLock> = lock.clone();
			let cache: Arc<dyn TokenCache> = cache.clone();

			Coordinator::new(lock, cache, config.clone())
		})
		.collect();
	let token = expired_token("expired");
	let calls = Arc::new(AtomicUsize::new(0));
	let refresh = |current: TokenRecord| {
		let calls = calls.clone();

		async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(80)).await;

			Ok::<_, ApiError>(rotated(&current, "herd-winner"))
		}
	};
	let (a, b, c, d, e) = tokio::join!(
		first.get_token(&token, refresh, GetTokenOptions::new()),
		peers[0].get_token(&token, refresh, GetTokenOptions::new()),
		peers[1].get_token(&token, refresh, GetTokenOptions::new()),
		peers[2].get_token(&token, refresh, GetTokenOptions::new()),
		peers[3].get_token(&token, refresh, GetTokenOptions::new()),
	);
	let results = [a, b, c, d, e].map(|result| result.expect("Every contender should succeed."));

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(results.iter().all(|result| result.token.access.expose() == "herd-winner"));
	assert_eq!(
		results.iter().filter(|result| result.reason == Some(RefreshReason::RefreshedNow)).count(),
		1
	);
	assert!(!lock.is_held(&token.key()));
}

#[tokio::test]
async fn same_process_callers_queue_behind_one_refresh() {
	let (coordinator, _, _) = build_memory_coordinator(fast_test_config("singleflight"));
	let token = expired_token("expired");
	let calls = Arc::new(AtomicUsize::new(0));
	let refresh = |current: TokenRecord| {
		let calls = calls.clone();

		async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(30)).await;

			Ok::<_, ApiError>(rotated(&current, "singleflight"))
		}
	};
	let (first, second) = tokio::join!(
		coordinator.get_token(&token, refresh, GetTokenOptions::new()),
		coordinator.get_token(&token, refresh, GetTokenOptions::new()),
	);
	let first = first.expect("First caller should succeed.");
	let second = second.expect("Second caller should succeed.");

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(first.reason, Some(RefreshReason::RefreshedNow));
	assert_eq!(second.reason, Some(RefreshReason::AlreadyRefreshed));
	assert_eq!(second.token, first.token);
}

#[tokio::test]
async fn file_backed_coordinators_share_one_refresh() {
	let config = fast_test_config("herd_files");
	let coordinators: Vec<Coordinator> = (0..3)
		.map(|_| {
			Coordinator::from_config(config.clone()).expect("File-backed coordinator should build.")
		})
		.collect();
	let token = expired_token("expired");
	let calls = Arc::new(AtomicUsize::new(0));
	let refresh = |current: TokenRecord| {
		let calls = calls.clone();

		async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(60)).await;

			Ok::<_, ApiError>(rotated(&current, "from-disk"))
		}
	};
	let (a, b, c) = tokio::join!(
		coordinators[0].get_token(&token, refresh, GetTokenOptions::new()),
		coordinators[1].get_token(&token, refresh, GetTokenOptions::new()),
		coordinators[2].get_token(&token, refresh, GetTokenOptions::new()),
	);

	for result in [a, b, c] {
		assert_eq!(
			result.expect("Every contender should succeed.").token.access.expose(),
			"from-disk"
		);
	}

	assert_eq!(calls.load(Ordering::SeqCst), 1);

	let on_disk = FileTokenCache::new(&config.cache_dir)
		.get(&token.key())
		.await
		.expect("The refreshed token should be persisted.");

	assert_eq!(on_disk.access.expose(), "from-disk");
	assert!(!config.lock_dir.join(format!("{}.lock", token.key())).exists());

	let state_dir = config.cache_dir.parent().expect("Cache dir should have a parent.");

	fs::remove_dir_all(state_dir).expect("Failed to remove temporary state directory.");
}

#[tokio::test]
async fn unwritable_cache_still_returns_fresh_token() {
	let state_dir = test_state_dir("unwritable_cache");

	fs::create_dir_all(&state_dir).expect("Failed to create state directory.");

	let blocker = state_dir.join("tokens");

	fs::write(&blocker, b"not a directory").expect("Failed to create cache blocker file.");

	let config = CoordinatorConfig::new(&state_dir)
		.with_contention_interval(Duration::milliseconds(20));
	let coordinator =
		Coordinator::from_config(config).expect("File-backed coordinator should build.");
	let token = expired_token("expired");
	let result = coordinator
		.get_token(
			&token,
			|current| async move { Ok::<_, ApiError>(rotated(&current, "in-memory-only")) },
			GetTokenOptions::new(),
		)
		.await
		.expect("Cache write failures must not fail the refresh.");

	assert_eq!(result.token.access.expose(), "in-memory-only");
	assert_eq!(result.reason, Some(RefreshReason::RefreshedNow));

	fs::remove_dir_all(&state_dir).expect("Failed to remove temporary state directory.");
}

#[tokio::test]
async fn maintenance_helpers_clear_lock_and_cache() {
	let (coordinator, lock, cache) = build_memory_coordinator(fast_test_config("maintenance"));
	let token = expired_token("expired");
	let key = token.key();

	cache.put(rotated(&token, "cached")).await.expect("Seeding the cache should succeed.");

	assert!(lock.try_acquire(&key).await.expect("Seeding the lock should succeed."));

	coordinator.force_unlock(&key).await.expect("Force unlock should succeed.");
	coordinator.forget_token(&key).await.expect("Forget should succeed.");

	assert!(!lock.is_held(&key));
	assert!(cache.is_empty());
}

#[tokio::test]
async fn abandoned_file_backed_refresh_frees_lock_for_peers() {
	let config = fast_test_config("abandoned_files").with_max_wait(Duration::seconds(2));
	let impatient =
		Coordinator::from_config(config.clone()).expect("File-backed coordinator should build.");
	let peer =
		Coordinator::from_config(config.clone()).expect("File-backed coordinator should build.");
	let token = expired_token("expired");
	let abandoned = tokio::time::timeout(
		std::time::Duration::from_millis(100),
		impatient.get_token(
			&token,
			|_| async {
				tokio::time::sleep(std::time::Duration::from_secs(10)).await;

				Err::<TokenRecord, _>(ApiError::from_message("never finishes"))
			},
			GetTokenOptions::new(),
		),
	)
	.await;

	assert!(abandoned.is_err(), "The slow refresh should be cut off by the timeout.");

	let result = peer
		.get_token(
			&token,
			|current| async move { Ok::<_, ApiError>(rotated(&current, "after-abandon")) },
			GetTokenOptions::new(),
		)
		.await
		.expect("The peer should acquire the released lock well before it goes stale.");

	assert_eq!(result.reason, Some(RefreshReason::RefreshedNow));
	assert_eq!(result.token.access.expose(), "after-abandon");

	let state_dir = config.cache_dir.parent().expect("Cache dir should have a parent.");

	fs::remove_dir_all(state_dir).expect("Failed to remove temporary state directory.");
}
