//! Relays `Tweet(message)` events from the AutoTweet contract to Twitter.

use super::{watch_events, MonitorError};
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_sol_types::SolEvent;
use drt_delivery::contracts::IAutoTweet;
use drt_delivery::DeliveryInterface;
use drt_discovery::EventWatcherConfig;
use drt_integrations::{prepare_tweet, SocialPoster};
use drt_types::LogEntry;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct AutoTweetRelay {
	config: EventWatcherConfig,
	chain: Arc<dyn DeliveryInterface>,
	social: Arc<dyn SocialPoster>,
}

impl AutoTweetRelay {
	pub fn from_state(state: &AppState) -> Result<Self, ApiError> {
		let address = require_contract(state.config.contracts.auto_tweet, "auto_tweet")?;
		let social = state
			.social
			.clone()
			.ok_or_else(|| ApiError::Unavailable("Twitter integration is not configured".into()))?;
		Ok(Self {
			config: EventWatcherConfig {
				name: "auto-tweet".to_string(),
				address,
				event_signature: IAutoTweet::Tweet::SIGNATURE_HASH,
				polling_interval_secs: state.config.monitors.auto_tweet.interval_secs,
				start_block: None,
			},
			chain: state.delivery.chain().clone(),
			social,
		})
	}

	/// Posts the event's message. Blank messages are skipped.
	pub async fn relay(&self, log: &LogEntry) -> Result<Option<String>, MonitorError> {
		let event = IAutoTweet::Tweet::decode_raw_log(log.topics.iter().copied(), &log.data)
			.map_err(|e| MonitorError::Decode(e.to_string()))?;
		let Some(text) = prepare_tweet(&event.message) else {
			return Ok(None);
		};
		let id = self.social.post(&text).await?;
		tracing::info!(tweet_id = %id, "Relayed on-chain tweet");
		Ok(Some(id))
	}

	pub async fn run(self, stop_rx: broadcast::Receiver<()>) {
		let chain = self.chain.clone();
		let config = self.config.clone();
		let relay = Arc::new(self);
		watch_events(chain, config, stop_rx, move |log| {
			let relay = relay.clone();
			async move {
				if let Err(e) = relay.relay(&log).await {
					tracing::error!(error = %e, "Failed to relay tweet");
				}
			}
		})
		.await;
	}
}
