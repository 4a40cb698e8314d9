//! Simulates several processes sharing one expired credential through a common state directory
//! and shows that only one of them reaches the token endpoint.

// std
use std::{
	env, fs,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
// self
use oauth2_refresh_coordinator::{
	auth::{ProviderId, TokenRecord, TokenSecret},
	classify::ApiError,
	config::CoordinatorConfig,
	flows::{Coordinator, GetTokenOptions},
};

const WORKERS: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let state_dir = env::temp_dir().join(format!("oauth2_refresh_demo_{}", std::process::id()));
	let config = CoordinatorConfig::new(&state_dir)
		.with_contention_interval(Duration::milliseconds(50))
		.with_max_wait(Duration::seconds(10));
	let expired = TokenRecord::builder(ProviderId::new("demo-provider")?)
		.access_token("demo-access-0")
		.refresh_token("demo-refresh-0")
		.expires_at(OffsetDateTime::now_utc() - Duration::minutes(1))
		.build()?;
	let endpoint_calls = Arc::new(AtomicUsize::new(0));
	let mut workers = Vec::with_capacity(WORKERS);

	for worker in 0..WORKERS {
		// Each coordinator owns its own lock handle and in-process guards, like a separate process.
		let coordinator = Coordinator::from_config(config.clone())?;
		let token = expired.clone();
		let endpoint_calls = endpoint_calls.clone();

		workers.push(tokio::spawn(async move {
			let result = coordinator
				.get_token(
					&token,
					|current| async move {
						let n = endpoint_calls.fetch_add(1, Ordering::SeqCst) + 1;

						tokio::time::sleep(StdDuration::from_millis(200)).await;

						let mut next = current;

						next.access = TokenSecret::new(format!("demo-access-{n}"));
						next.expires = Some(OffsetDateTime::now_utc() + Duration::hours(1));

						Ok::<_, ApiError>(next)
					},
					GetTokenOptions::new(),
				)
				.await?;

			println!(
				"worker {worker}: refreshed={} reason={}",
				result.refreshed,
				result.reason.map(|reason| reason.as_str()).unwrap_or("none"),
			);

			Ok::<_, oauth2_refresh_coordinator::error::Error>(())
		}));
	}

	for worker in workers {
		worker.await??;
	}

	println!("token endpoint calls: {}", endpoint_calls.load(Ordering::SeqCst));

	fs::remove_dir_all(&state_dir)?;

	Ok(())
}
