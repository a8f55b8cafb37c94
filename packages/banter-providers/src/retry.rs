use std::{future::Future, time::Duration};

use color_eyre::Result;
use rand::Rng;

/// Bounded randomized exponential backoff for collaborator calls. Every
/// caller of the generation/embedding/delivery clients goes through
/// [`call_with_retry`] instead of rolling its own loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &banter_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts,
			base_delay: Duration::from_millis(cfg.base_delay_ms),
			max_delay: Duration::from_millis(cfg.max_delay_ms),
		}
	}

	/// Uniformly random delay between the base and an exponentially growing,
	/// capped ceiling.
	fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let base = self.base_delay.as_millis() as u64;
		let max = self.max_delay.as_millis() as u64;
		let exp = attempt.saturating_sub(1).min(16);
		let ceiling = base.saturating_mul(1_u64 << exp).min(max).max(base);
		let millis = rand::thread_rng().gen_range(base..=ceiling);

		Duration::from_millis(millis)
	}
}

pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut f: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let max_attempts = policy.max_attempts.max(1);
	let mut attempt = 1;

	loop {
		match f().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				tracing::error!(%label, attempt, max_attempts, error = %err, "Collaborator call failed.");

				if attempt >= max_attempts {
					return Err(err);
				}

				tokio::time::sleep(policy.delay_for_attempt(attempt)).await;

				attempt += 1;
			},
		}
	}
}
