//! On-chain discovery for the DRT backend.
//!
//! Watchers poll the chain at a fixed interval and push what they find on an
//! unbounded channel. Each watcher runs as one spawned task that is stopped
//! through a broadcast signal.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Re-export implementations
pub mod implementations {
	pub mod onchain {
		pub mod events;
		pub mod wallet;
	}
}

pub use implementations::onchain::events::{EventWatcher, EventWatcherConfig};
pub use implementations::onchain::wallet::{WalletWatcher, WalletWatcherConfig};

/// Upper bound on blocks scanned in one polling round.
pub const MAX_BLOCKS_PER_POLL: u64 = 500;

/// Errors that can occur while watching the chain.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("Already monitoring")]
	AlreadyMonitoring,
	#[error("Validation error: {0}")]
	ValidationError(String),
	#[error("Delivery error: {0}")]
	Delivery(String),
}

impl From<drt_delivery::DeliveryError> for DiscoveryError {
	fn from(e: drt_delivery::DeliveryError) -> Self {
		DiscoveryError::Delivery(e.to_string())
	}
}

/// Trait implemented by every chain watcher.
#[async_trait]
pub trait DiscoveryInterface: Send + Sync {
	/// What the watcher reports.
	type Item: Send + 'static;

	/// Starts polling and forwards discoveries to `sender`.
	async fn start_monitoring(
		&self,
		sender: mpsc::UnboundedSender<Self::Item>,
	) -> Result<(), DiscoveryError>;

	async fn stop_monitoring(&self) -> Result<(), DiscoveryError>;

	fn is_monitoring(&self) -> bool;
}

/// Running state of a watcher: the spawned task and its stop channel.
#[derive(Default)]
pub struct MonitorHandle {
	/// Flag indicating if monitoring is active
	is_monitoring: Arc<AtomicBool>,
	/// Handle for the monitoring task
	monitoring_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
	/// Channel for signaling monitoring shutdown
	stop_signal: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl MonitorHandle {
	pub fn is_running(&self) -> bool {
		self.is_monitoring.load(Ordering::SeqCst)
	}

	/// Spawns `task` with a fresh stop receiver.
	pub async fn spawn<F, Fut>(&self, task: F) -> Result<(), DiscoveryError>
	where
		F: FnOnce(broadcast::Receiver<()>) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		if self.is_monitoring.swap(true, Ordering::SeqCst) {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let (stop_tx, stop_rx) = broadcast::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);
		*self.monitoring_handle.lock().await = Some(tokio::spawn(task(stop_rx)));
		Ok(())
	}

	/// Signals the task to stop and waits for it to finish.
	pub async fn stop(&self) {
		if !self.is_monitoring.load(Ordering::SeqCst) {
			return;
		}

		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(());
		}
		if let Some(handle) = self.monitoring_handle.lock().await.take() {
			let _ = handle.await;
		}

		self.is_monitoring.store(false, Ordering::SeqCst);
	}
}

/// Next inclusive block range to scan after `last_seen`, capped at
/// [`MAX_BLOCKS_PER_POLL`] blocks. `None` when there is nothing new.
pub fn next_range(last_seen: u64, latest: u64) -> Option<(u64, u64)> {
	if latest <= last_seen {
		return None;
	}
	let from = last_seen + 1;
	let to = latest.min(last_seen.saturating_add(MAX_BLOCKS_PER_POLL));
	Some((from, to))
}
