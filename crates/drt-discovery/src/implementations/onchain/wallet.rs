//! Wallet activity discovery.
//!
//! Scans every new block and forwards the transactions sent by one wallet.

use crate::{next_range, DiscoveryError, DiscoveryInterface, MonitorHandle};
use alloy_primitives::Address;
use async_trait::async_trait;
use drt_delivery::DeliveryInterface;
use drt_types::{format_address, TransactionSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Clone)]
pub struct WalletWatcherConfig {
	pub wallet: Address,
	pub polling_interval_secs: u64,
	/// First block to scan. Defaults to the block after the current head.
	pub start_block: Option<u64>,
}

pub struct WalletWatcher {
	config: WalletWatcherConfig,
	delivery: Arc<dyn DeliveryInterface>,
	handle: MonitorHandle,
}

impl WalletWatcher {
	pub fn new(
		config: WalletWatcherConfig,
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

	/// Scans `from..=to` and forwards the wallet's transactions.
	///
	/// Returns the last block fully scanned, which is `from - 1` when the
	/// first block could not be fetched.
	async fn scan(
		wallet: Address,
		delivery: &dyn DeliveryInterface,
		sender: &mpsc::UnboundedSender<TransactionSummary>,
		from: u64,
		to: u64,
	) -> u64 {
		for block in from..=to {
			let txs = match delivery.get_block_transactions(block).await {
				Ok(txs) => txs,
				Err(e) => {
					tracing::error!(block, error = %e, "Failed to fetch block transactions");
					return block - 1;
				},
			};
			for tx in txs.into_iter().filter(|tx| tx.from == wallet) {
				tracing::debug!(tx_hash = %tx.hash, block, "Wallet transaction found");
				if sender.send(tx).is_err() {
					return to;
				}
			}
		}
		to
	}

	async fn polling_loop(
		config: WalletWatcherConfig,
		delivery: Arc<dyn DeliveryInterface>,
		sender: mpsc::UnboundedSender<TransactionSummary>,
		mut stop_rx: broadcast::Receiver<()>,
		mut last_seen: u64,
	) {
		let mut interval = tokio::time::interval(Duration::from_secs(config.polling_interval_secs));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if sender.is_closed() {
						break;
					}
					match delivery.get_block_number().await {
						Ok(latest) => {
							if let Some((from, to)) = next_range(last_seen, latest) {
								last_seen = Self::scan(config.wallet, delivery.as_ref(), &sender, from, to).await;
							}
						},
						Err(e) => tracing::error!(error = %e, "Failed to fetch block number"),
					}
				}
				_ = stop_rx.recv() => {
					tracing::info!("Stopping wallet polling");
					break;
				}
			}
		}
	}
}

#[async_trait]
impl DiscoveryInterface for WalletWatcher {
	type Item = TransactionSummary;

	async fn start_monitoring(
		&self,
		sender: mpsc::UnboundedSender<TransactionSummary>,
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
			wallet = %format_address(&self.config.wallet),
			polling_interval = self.config.polling_interval_secs,
			"Wallet watcher started"
		);
		Ok(())
	}

	async fn stop_monitoring(&self) -> Result<(), DiscoveryError> {
		self.handle.stop().await;
		tracing::info!("Stopped wallet watcher");
		Ok(())
	}

	fn is_monitoring(&self) -> bool {
		self.handle.is_running()
	}
}
