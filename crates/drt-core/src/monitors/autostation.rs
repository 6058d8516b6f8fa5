//! Reacts to AutoStation `Broadcast` events with a sentiment read and a
//! one-message summary.

use super::{watch_events, MonitorError};
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::Address;
use alloy_sol_types::SolEvent;
use drt_delivery::contracts::IAutoStation;
use drt_delivery::DeliveryInterface;
use drt_discovery::EventWatcherConfig;
use drt_integrations::Assistant;
use drt_types::{format_address, LogEntry};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A decoded broadcast and the model's take on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastNote {
	pub channel: String,
	pub user: Address,
	pub message: String,
	pub sentiment: String,
	pub summary: String,
}

pub struct AutoStationListener {
	config: EventWatcherConfig,
	chain: Arc<dyn DeliveryInterface>,
	assistant: Assistant,
}

impl AutoStationListener {
	pub fn from_state(state: &AppState) -> Result<Self, ApiError> {
		let address = require_contract(state.config.contracts.autostation, "autostation")?;
		Ok(Self {
			config: EventWatcherConfig {
				name: "autostation-broadcast".to_string(),
				address,
				event_signature: IAutoStation::Broadcast::SIGNATURE_HASH,
				polling_interval_secs: state.config.monitors.autostation_listener.interval_secs,
				start_block: None,
			},
			chain: state.delivery.chain().clone(),
			assistant: state.assistant()?.clone(),
		})
	}

	pub async fn handle(&self, log: &LogEntry) -> Result<BroadcastNote, MonitorError> {
		let event = IAutoStation::Broadcast::decode_raw_log(log.topics.iter().copied(), &log.data)
			.map_err(|e| MonitorError::Decode(e.to_string()))?;

		let sentiment = self.assistant.analyze_sentiment(&event.message).await?;
		let summary = self
			.assistant
			.summarize_channel(std::slice::from_ref(&event.message))
			.await?;

		Ok(BroadcastNote {
			channel: event.channel,
			user: event.user,
			message: event.message,
			sentiment,
			summary,
		})
	}

	pub async fn run(self, stop_rx: broadcast::Receiver<()>) {
		let chain = self.chain.clone();
		let config = self.config.clone();
		let listener = Arc::new(self);
		watch_events(chain, config, stop_rx, move |log| {
			let listener = listener.clone();
			async move {
				match listener.handle(&log).await {
					Ok(note) => tracing::info!(
						channel = %note.channel,
						user = %format_address(&note.user),
						message = %note.message,
						sentiment = %note.sentiment,
						summary = %note.summary,
						"AutoStation broadcast"
					),
					Err(e) => tracing::error!(error = %e, "Broadcast event error"),
				}
			}
		})
		.await;
	}
}
