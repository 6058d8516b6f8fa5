//! Tweets about the backend wallet's outgoing transactions.

use super::MonitorError;
use crate::{ApiError, AppState};
use alloy_primitives::Address;
use drt_delivery::DeliveryInterface;
use drt_discovery::{DiscoveryInterface, WalletWatcher, WalletWatcherConfig};
use drt_integrations::{prepare_tweet, Assistant, SocialPoster};
use drt_types::{format_address, format_amount, truncate_id, TransactionSummary, TOKEN_DECIMALS};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub struct TransactionMonitor {
	config: WalletWatcherConfig,
	chain: Arc<dyn DeliveryInterface>,
	assistant: Assistant,
	social: Arc<dyn SocialPoster>,
}

impl TransactionMonitor {
	/// Watches `monitors.transactions.wallet`, or the signer when unset.
	pub fn from_state(state: &AppState) -> Result<Self, ApiError> {
		let settings = &state.config.monitors.transactions;
		let wallet = match settings.wallet {
			Some(wallet) => wallet,
			None => state.signer()?,
		};
		let social = state
			.social
			.clone()
			.ok_or_else(|| ApiError::Unavailable("Twitter integration is not configured".into()))?;

		Ok(Self {
			config: WalletWatcherConfig {
				wallet,
				polling_interval_secs: settings.interval_secs,
				start_block: None,
			},
			chain: state.delivery.chain().clone(),
			assistant: state.assistant()?.clone(),
			social,
		})
	}

	pub fn wallet(&self) -> Address {
		self.config.wallet
	}

	/// Asks the model for a tweet about `tx` and posts it.
	///
	/// Returns the id of the posted tweet, `None` when the reply was blank.
	pub async fn announce(&self, tx: &TransactionSummary) -> Result<Option<String>, MonitorError> {
		let details = json!({
			"hash": tx.hash.to_string(),
			"from": format_address(&tx.from),
			"to": tx.to.as_ref().map(format_address),
			"value": format_amount(tx.value, TOKEN_DECIMALS),
			"blockNumber": tx.block_number,
		});
		let short_hash = truncate_id(&tx.hash.to_string());
		let reply = self.assistant.generate_tweet(&details).await?;
		let Some(text) = prepare_tweet(&reply) else {
			tracing::warn!(tx_hash = %short_hash, "Model returned an empty tweet");
			return Ok(None);
		};
		let id = self.social.post(&text).await?;
		tracing::info!(tx_hash = %short_hash, tweet_id = %id, "Posted transaction tweet");
		Ok(Some(id))
	}

	pub async fn run(self, mut stop_rx: broadcast::Receiver<()>) {
		let watcher = match WalletWatcher::new(self.config.clone(), self.chain.clone()) {
			Ok(watcher) => watcher,
			Err(e) => {
				tracing::error!(error = %e, "Invalid wallet watcher");
				return;
			},
		};
		let (tx, mut rx) = mpsc::unbounded_channel();
		if let Err(e) = watcher.start_monitoring(tx).await {
			tracing::error!(error = %e, "Failed to start wallet watcher");
			return;
		}
		tracing::info!(wallet = %format_address(&self.wallet()), "Monitoring wallet transactions");

		loop {
			tokio::select! {
				Some(summary) = rx.recv() => {
					if let Err(e) = self.announce(&summary).await {
						tracing::error!(tx_hash = %summary.hash, error = %e, "Failed to tweet transaction");
					}
				}
				_ = stop_rx.recv() => break,
			}
		}

		if let Err(e) = watcher.stop_monitoring().await {
			tracing::warn!(error = %e, "Failed to stop wallet watcher");
		}
	}
}
