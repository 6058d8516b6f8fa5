//! Contract event discovery.
//!
//! Polls `eth_getLogs` for one event on one contract. Every round scans the
//! blocks mined since the previous round, so each log is forwarded once.

use crate::{next_range, DiscoveryError, DiscoveryInterface, MonitorHandle};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use drt_delivery::DeliveryInterface;
use drt_types::{format_address, LogEntry, LogFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Event watcher configuration.
#[derive(Debug, Clone)]
pub struct EventWatcherConfig {
	/// Name used in log lines, e.g. "autostation-broadcast"
	pub name: String,
	pub address: Address,
	/// topic0 of the watched event
	pub event_signature: B256,
	pub polling_interval_secs: u64,
	/// First block to scan. Defaults to the block after the current head.
	pub start_block: Option<u64>,
}

pub struct EventWatcher {
	config: EventWatcherConfig,
	delivery: Arc<dyn DeliveryInterface>,
	handle: MonitorHandle,
}

impl EventWatcher {
	pub fn new(
		config: EventWatcherConfig,
		delivery: Arc<dyn DeliveryInterface>,
	) -> Result<Self, DiscoveryError> {
		if config.polling_interval_secs == 0 {
			return Err(DiscoveryError::ValidationError(
				"polling_interval_secs must be at least 1".to_string(),
			));
		}
		Ok(Self {
			config,
			delivery,
			handle: MonitorHandle::default(),
		})
	}

	async fn polling_loop(
		config: EventWatcherConfig,
		delivery: Arc<dyn DeliveryInterface>,
		sender: mpsc::UnboundedSender<LogEntry>,
		mut stop_rx: broadcast::Receiver<()>,
		mut last_seen: u64,
	) {
		let mut interval = tokio::time::interval(Duration::from_secs(config.polling_interval_secs));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let latest = match delivery.get_block_number().await {
						Ok(latest) => latest,
						Err(e) => {
							tracing::error!(watcher = %config.name, error = %e, "Failed to fetch block number");
							continue;
						},
					};
					let Some((from_block, to_block)) = next_range(last_seen, latest) else {
						continue;
					};

					let filter = LogFilter {
						address: config.address,
						event_signature: config.event_signature,
						from_block,
						to_block,
					};
					match delivery.get_logs(filter).await {
						Ok(logs) => {
							tracing::debug!(
								watcher = %config.name,
								from_block,
								to_block,
								logs = logs.len(),
								"Scanned block range"
							);
							for log in logs {
								if sender.send(log).is_err() {
									tracing::info!(watcher = %config.name, "Receiver dropped, stopping");
									return;
								}
							}
							last_seen = to_block;
						},
						Err(e) => {
							tracing::error!(watcher = %config.name, error = %e, "Failed to fetch logs");
						},
					}
				}
				_ = stop_rx.recv() => {
					tracing::info!(watcher = %config.name, "Stopping event polling");
					break;
				}
			}
		}
	}
}

#[async_trait]
impl DiscoveryInterface for EventWatcher {
	type Item = LogEntry;

	async fn start_monitoring(
		&self,
		sender: mpsc::UnboundedSender<LogEntry>,
	) -> Result<(), DiscoveryError> {
		let last_seen = match self.config.start_block {
			Some(block) => block.saturating_sub(1),
			None => self.delivery.get_block_number().await?,
		};

		let config = self.config.clone();
		let delivery = self.delivery.clone();
		self.handle
			.spawn(move |stop_rx| Self::polling_loop(config, delivery, sender, stop_rx, last_seen))
			.await?;

		tracing::info!(
			watcher = %self.config.name,
			contract = %format_address(&self.config.address),
			polling_interval = self.config.polling_interval_secs,
			from_block = last_seen + 1,
			"Event watcher started"
		);
		Ok(())
	}

	async fn stop_monitoring(&self) -> Result<(), DiscoveryError> {
		self.handle.stop().await;
		tracing::info!(watcher = %self.config.name, "Stopped event watcher");
		Ok(())
	}

	fn is_monitoring(&self) -> bool {
		self.handle.is_running()
	}
}
