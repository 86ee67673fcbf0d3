//! The settle delay between creating a controller and looking for its pods.

use std::{
	future::Future,
	sync::{Arc, Mutex, PoisonError},
	time::Duration,
};

/// Waits for the control plane to catch up.
pub trait Delay: Send + Sync {
	fn wait(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
	async fn wait(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Returns immediately, remembering every requested wait.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
	waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingDelay {
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits requested so far, in order.
	pub fn waits(&self) -> Vec<Duration> {
		self.waits
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

impl Delay for RecordingDelay {
	async fn wait(&self, duration: Duration) {
		self.waits
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(duration);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_recording_delay_shares_log_between_clones() {
		let delay = RecordingDelay::new();
		let clone = delay.clone();

		clone.wait(Duration::from_secs(5)).await;
		delay.wait(Duration::from_secs(1)).await;

		assert_eq!(
			delay.waits(),
			[Duration::from_secs(5), Duration::from_secs(1)]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_tokio_delay_sleeps() {
		let start = tokio::time::Instant::now();
		TokioDelay.wait(Duration::from_secs(5)).await;
		assert!(start.elapsed() >= Duration::from_secs(5));
	}
}
