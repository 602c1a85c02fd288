//! Delay between automatic restart attempts.
//!
//! The delay for consecutive failure `n` (0-indexed) is `first × factor^n`,
//! clamped to `max`. The base is derived from the failure count alone, so the
//! schedule is deterministic for a given crash history.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
	/// Delay before the first restart.
	pub first: Duration,
	/// Upper bound for any single delay.
	pub max: Duration,
	/// Growth per consecutive failure; 1.0 keeps the delay constant.
	pub factor: f64,
}

impl Default for BackoffPolicy {
	/// 1s, doubling, capped at 60s.
	fn default() -> Self {
		Self {
			first: Duration::from_secs(1),
			max: Duration::from_secs(60),
			factor: 2.0,
		}
	}
}

impl BackoffPolicy {
	pub fn delay(&self, failures: u32) -> Duration {
		let exp = failures.min(i32::MAX as u32) as i32;
		let secs = self.first.as_secs_f64() * self.factor.powi(exp);

		if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
			self.max
		} else {
			Duration::from_secs_f64(secs)
		}
	}
}
