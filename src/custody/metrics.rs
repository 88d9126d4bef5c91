// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters covering custody flow outcomes.
#[derive(Debug, Default)]
pub struct CustodyMetrics {
	attempts: AtomicU64,
	reuses: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
	contention: AtomicU64,
}
impl CustodyMetrics {
	/// Returns the total number of transactional flow entries.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of flows satisfied by the stored access token without a
	/// provider call.
	pub fn reuses(&self) -> u64 {
		self.reuses.load(Ordering::Relaxed)
	}

	/// Returns the number of provider exchanges that were persisted successfully.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of flows that surfaced an error to the caller.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of conditional lock writes that lost to another live holder.
	pub fn contention(&self) -> u64 {
		self.contention.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reuse(&self) {
		self.reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_contention(&self) {
		self.contention.fetch_add(1, Ordering::Relaxed);
	}
}
