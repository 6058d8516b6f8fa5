//! Background monitors.
//!
//! Each monitor is a spawned task that ends when the shared broadcast stop
//! signal fires. A monitor whose configuration, contract or integration is
//! missing is skipped with a warning so the API still starts.

use crate::AppState;
use drt_delivery::{DeliveryError, DeliveryInterface};
use drt_discovery::{DiscoveryInterface, EventWatcher, EventWatcherConfig};
use drt_integrations::IntegrationError;
use drt_types::LogEntry;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

pub mod auto_tweet;
pub mod autostation;
pub mod broadcaster;
pub mod liquidity;
pub mod transactions;
pub mod twin_core;

/// Errors raised inside a monitor iteration. They are logged, never fatal.
#[derive(Debug, Error)]
pub enum MonitorError {
	#[error("Integration error: {0}")]
	Integration(#[from] IntegrationError),
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Failed to decode event: {0}")]
	Decode(String),
	#[error("Memory file error: {0}")]
	Memory(String),
}

/// The running monitors and their stop signal.
pub struct MonitorSet {
	stop_tx: broadcast::Sender<()>,
	handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl MonitorSet {
	fn new() -> Self {
		let (stop_tx, _) = broadcast::channel(1);
		Self {
			stop_tx,
			handles: Vec::new(),
		}
	}

	fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
	where
		F: FnOnce(broadcast::Receiver<()>) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let handle = tokio::spawn(task(self.stop_tx.subscribe()));
		tracing::info!(monitor = name, "Started monitor");
		self.handles.push((name, handle));
	}

	/// Names of the monitors that were started.
	pub fn names(&self) -> Vec<&'static str> {
		self.handles.iter().map(|(name, _)| *name).collect()
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	/// Signals every monitor to stop and waits for them.
	pub async fn shutdown(self) {
		let _ = self.stop_tx.send(());
		for (name, handle) in self.handles {
			if let Err(e) = handle.await {
				tracing::error!(monitor = name, error = %e, "Monitor task failed");
			}
		}
		tracing::info!("All monitors stopped");
	}
}

fn skip(monitor: &str, reason: impl std::fmt::Display) {
	tracing::warn!(monitor, reason = %reason, "Monitor enabled but not started");
}

/// Starts every enabled monitor whose prerequisites are configured.
pub fn spawn_monitors(state: &AppState) -> MonitorSet {
	let mut set = MonitorSet::new();
	let monitors = &state.config.monitors;

	if monitors.liquidity.enabled {
		match liquidity::sources(state) {
			Ok(sources) => {
				let cache = state.liquidity.clone();
				let delivery = state.delivery.clone();
				let interval = monitors.liquidity.interval_secs;
				set.spawn("liquidity", move |stop| {
					liquidity::run(cache, delivery, sources, interval, stop)
				});
			},
			Err(reason) => skip("liquidity", reason),
		}
	}

	if monitors.transactions.enabled {
		match transactions::TransactionMonitor::from_state(state) {
			Ok(monitor) => set.spawn("transactions", move |stop| monitor.run(stop)),
			Err(reason) => skip("transactions", reason),
		}
	}

	if monitors.autostation_listener.enabled {
		match autostation::AutoStationListener::from_state(state) {
			Ok(listener) => set.spawn("autostation", move |stop| listener.run(stop)),
			Err(reason) => skip("autostation", reason),
		}
	}

	if monitors.auto_tweet.enabled {
		match auto_tweet::AutoTweetRelay::from_state(state) {
			Ok(relay) => set.spawn("auto_tweet", move |stop| relay.run(stop)),
			Err(reason) => skip("auto_tweet", reason),
		}
	}

	if monitors.twin_core.enabled {
		match twin_core::TwinCore::from_state(state) {
			Ok(core) => set.spawn("twin_core", move |stop| core.run(stop)),
			Err(reason) => skip("twin_core", reason),
		}
	}

	if monitors.station_broadcaster.enabled {
		match broadcaster::StationBroadcaster::from_state(state) {
			Ok(broadcaster) => set.spawn("station_broadcaster", move |stop| broadcaster.run(stop)),
			Err(reason) => skip("station_broadcaster", reason),
		}
	}

	tracing::info!(monitors = ?set.names(), "Monitors running");
	set
}

/// Feeds every log of `config`'s event to `handle` until stopped.
pub(crate) async fn watch_events<F, Fut>(
	chain: Arc<dyn DeliveryInterface>,
	config: EventWatcherConfig,
	mut stop_rx: broadcast::Receiver<()>,
	mut handle: F,
) where
	F: FnMut(LogEntry) -> Fut,
	Fut: Future<Output = ()>,
{
	let name = config.name.clone();
	let watcher = match EventWatcher::new(config, chain) {
		Ok(watcher) => watcher,
		Err(e) => {
			tracing::error!(watcher = %name, error = %e, "Invalid event watcher");
			return;
		},
	};

	let (tx, mut rx) = mpsc::unbounded_channel();
	if let Err(e) = watcher.start_monitoring(tx).await {
		tracing::error!(watcher = %name, error = %e, "Failed to start event watcher");
		return;
	}

	loop {
		tokio::select! {
			Some(log) = rx.recv() => handle(log).await,
			_ = stop_rx.recv() => break,
		}
	}

	if let Err(e) = watcher.stop_monitoring().await {
		tracing::warn!(watcher = %name, error = %e, "Failed to stop event watcher");
	}
}
