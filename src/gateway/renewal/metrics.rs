// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential renewals.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	joined: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of refresh-endpoint exchanges started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that stored a new access token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many callers awaited a renewal started by another caller.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}
}
