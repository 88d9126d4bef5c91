//! Bounded retry combinator with a fixed cooldown between attempts.

// self
use crate::_prelude::*;

/// Fixed-cooldown retry budget for operations that can report "busy, try later".
///
/// The policy never backs off: contention on an advisory lease resolves in roughly one
/// refresh duration, so evenly spaced probes are the right shape. Attempts that return an
/// error are never retried; only the busy signal is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts to make, clamped to at least one.
	pub max_attempts: u32,
	/// Pause between attempts; no pause follows the final attempt.
	pub cooldown: Duration,
}
impl RetryPolicy {
	/// Builds a policy from an attempt budget and a cooldown.
	pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
		Self { max_attempts, cooldown }
	}

	/// Drives `attempt` until it yields a value, fails, or the budget runs out.
	///
	/// `attempt` receives the 1-based attempt index and resolves to:
	/// - `Ok(Some(value))` - done, returned as-is;
	/// - `Ok(None)` - busy; the policy sleeps `cooldown` and tries again;
	/// - `Err(e)` - fatal; returned immediately without further attempts.
	///
	/// Exhausting the budget yields `Ok(None)`; mapping that to a domain error is the
	/// caller's decision.
	pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<Option<T>, E>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<Option<T>, E>>,
	{
		let budget = self.max_attempts.max(1);

		for index in 1..=budget {
			if let Some(value) = attempt(index).await? {
				return Ok(Some(value));
			}
			if index < budget {
				tokio::time::sleep(self.cooldown.try_into().unwrap_or_default()).await;
			}
		}

		Ok(None)
	}
}
