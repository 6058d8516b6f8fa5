//! Periodic heartbeat message on an AutoStation channel.

use super::MonitorError;
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, TxHash, U256};
use chrono::{DateTime, SecondsFormat, Utc};
use drt_delivery::contracts::IAutoStation;
use drt_delivery::DeliveryService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Text posted at `now`.
pub fn heartbeat_message(now: DateTime<Utc>) -> String {
	format!(
		"Hello world from AI! Current UTC time: {}",
		now.to_rfc3339_opts(SecondsFormat::Millis, true)
	)
}

pub struct StationBroadcaster {
	delivery: Arc<DeliveryService>,
	autostation: Address,
	channel: String,
	interval_secs: u64,
}

impl StationBroadcaster {
	pub fn from_state(state: &AppState) -> Result<Self, ApiError> {
		let settings = &state.config.monitors.station_broadcaster;
		state.signer()?;
		Ok(Self {
			delivery: state.delivery.clone(),
			autostation: require_contract(state.config.contracts.autostation, "autostation")?,
			channel: settings.channel.clone(),
			interval_secs: settings.interval_secs,
		})
	}

	pub async fn broadcast(&self, now: DateTime<Utc>) -> Result<TxHash, MonitorError> {
		let message = heartbeat_message(now);
		let receipt = self
			.delivery
			.execute(
				self.autostation,
				&IAutoStation::postMessageCall {
					channel: self.channel.clone(),
					message: message.clone(),
				},
				U256::ZERO,
			)
			.await?;
		tracing::info!(channel = %self.channel, tx_hash = %receipt.hash, message = %message, "Broadcasted");
		Ok(receipt.hash)
	}

	pub async fn run(self, mut stop_rx: broadcast::Receiver<()>) {
		let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// The first post goes out one interval after start.
		interval.tick().await;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if let Err(e) = self.broadcast(Utc::now()).await {
						tracing::error!(channel = %self.channel, error = %e, "Error posting to AutoStation");
					}
				}
				_ = stop_rx.recv() => {
					tracing::info!("Stopping station broadcaster");
					break;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::state_with;
	use alloy_sol_types::SolCall;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};

	fn broadcaster(mock: Arc<MockDelivery>) -> Result<StationBroadcaster, ApiError> {
		let config = ConfigBuilder::new()
			.with_contracts(|c| c.autostation = Some(addr(0x60)))
			.build();
		StationBroadcaster::from_state(&state_with(config, mock))
	}

	#[test]
	fn test_heartbeat_message_format() {
		let now = DateTime::from_timestamp(1_700_000_000, 5_000_000).unwrap();
		assert_eq!(
			heartbeat_message(now),
			"Hello world from AI! Current UTC time: 2023-11-14T22:13:20.005Z"
		);
	}

	#[tokio::test]
	async fn test_broadcast_posts_on_default_channel() {
		let mock = Arc::new(MockDelivery::new());
		let station = broadcaster(mock.clone()).unwrap();
		let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		station.broadcast(now).await.unwrap();

		let submitted = mock.submitted();
		assert_eq!(submitted.len(), 1);
		assert_eq!(submitted[0].to, addr(0x60));
		let call = IAutoStation::postMessageCall::abi_decode(&submitted[0].data).unwrap();
		assert_eq!(call.channel, "ai-general");
		assert_eq!(call.message, heartbeat_message(now));
	}

	#[test]
	fn test_requires_signer() {
		assert!(broadcaster(Arc::new(MockDelivery::new().read_only())).is_err());
	}
}
