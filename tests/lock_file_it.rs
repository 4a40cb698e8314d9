// std
use std::{
	fs,
	sync::{Barrier, atomic::{AtomicUsize, Ordering}},
	thread,
};
// crates.io
use tokio::runtime::Runtime;
// self
use oauth2_refresh_coordinator::{
	_preludet::*,
	auth::{CredentialKey, ProviderId},
	clock,
	lock::{FileLock, LockRecord, RefreshLock},
};

fn key(provider: &str) -> CredentialKey {
	CredentialKey::new(&ProviderId::new(provider).expect("Provider should be valid."), None)
}

#[test]
fn concurrent_contenders_get_exactly_one_lock() {
	const CONTENDERS: usize = 8;

	let dir = test_state_dir("lock_race");
	let key = key("anthropic");
	let barrier = Barrier::new(CONTENDERS);
	let winners = AtomicUsize::new(0);

	thread::scope(|scope| {
		for _ in 0..CONTENDERS {
			scope.spawn(|| {
				let rt = Runtime::new().expect("Failed to build Tokio runtime for lock race.");
				let lock = FileLock::new(&dir, Duration::seconds(60));

				barrier.wait();

				if rt.block_on(lock.try_acquire(&key)).expect("Acquire should not error.") {
					winners.fetch_add(1, Ordering::SeqCst);
				}
			});
		}
	});

	assert_eq!(winners.load(Ordering::SeqCst), 1);

	fs::remove_dir_all(&dir).expect("Failed to remove temporary lock directory.");
}

#[test]
fn locks_for_different_credentials_are_independent() {
	let dir = test_state_dir("lock_independent");
	let rt = Runtime::new().expect("Failed to build Tokio runtime for lock test.");
	let lock = FileLock::new(&dir, Duration::seconds(60));

	assert!(rt.block_on(lock.try_acquire(&key("anthropic"))).expect("Acquire should not error."));
	assert!(rt.block_on(lock.try_acquire(&key("openai"))).expect("Acquire should not error."));

	fs::remove_dir_all(&dir).expect("Failed to remove temporary lock directory.");
}

#[test]
fn lock_older_than_threshold_is_reclaimed_by_new_contender() {
	let dir = test_state_dir("lock_stale");
	let rt = Runtime::new().expect("Failed to build Tokio runtime for lock test.");
	let crashed = FileLock::new(&dir, Duration::seconds(60));
	let contender = FileLock::new(&dir, Duration::seconds(60));
	let key = key("anthropic");

	assert!(rt.block_on(crashed.try_acquire(&key)).expect("Acquire should not error."));
	assert!(!rt.block_on(contender.try_acquire(&key)).expect("Acquire should not error."));

	let aged = LockRecord {
		pid: 999_999,
		timestamp: clock::now_millis() - Duration::seconds(61),
		owner: Some(crashed.owner().to_owned()),
	};

	fs::write(
		crashed.path_for(&key),
		serde_json::to_vec(&aged).expect("Lock fixture should serialize."),
	)
	.expect("Failed to age lock record.");

	assert!(rt.block_on(contender.try_acquire(&key)).expect("Acquire should not error."));

	// The crashed holder finally releasing must not drop its successor's lock.
	rt.block_on(crashed.release(&key)).expect("Release should not error.");

	let record = contender.inspect(&key).expect("Successor lock should remain in place.");

	assert_eq!(record.owner.as_deref(), Some(contender.owner()));
	assert!(!record.is_stale_at(OffsetDateTime::now_utc(), Duration::seconds(60)));

	fs::remove_dir_all(&dir).expect("Failed to remove temporary lock directory.");
}

#[cfg(unix)]
#[test]
fn lock_files_are_owner_only() {
	// std
	use std::os::unix::fs::PermissionsExt;

	let dir = test_state_dir("lock_mode");
	let rt = Runtime::new().expect("Failed to build Tokio runtime for lock test.");
	let lock = FileLock::new(&dir, Duration::seconds(60));
	let key = key("anthropic");

	assert!(rt.block_on(lock.try_acquire(&key)).expect("Acquire should not error."));

	let file_mode = fs::metadata(lock.path_for(&key))
		.expect("Lock file should exist.")
		.permissions()
		.mode();
	let dir_mode = fs::metadata(&dir).expect("Lock dir should exist.").permissions().mode();

	assert_eq!(file_mode & 0o777, 0o600);
	assert_eq!(dir_mode & 0o777, 0o700);

	fs::remove_dir_all(&dir).expect("Failed to remove temporary lock directory.");
}
