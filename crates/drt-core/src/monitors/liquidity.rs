//! Cached DRTv1/WETH pool reserves.
//!
//! The monitor reads the pool's DRTv1 and WETH balances at a fixed interval.
//! `GET /api/liquidity` serves the cached values and checks trade sizes
//! against them. Trade handlers ask the DRTrade contract through
//! `checkLiquidity` instead.

use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, U256};
use drt_delivery::{DeliveryError, DeliveryService};
use drt_types::{current_timestamp, format_amount, TOKEN_DECIMALS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Pool balances at one point in time, in base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiquiditySnapshot {
	pub drt: U256,
	pub weth: U256,
	/// Unix time of the last successful refresh, `None` before the first one
	pub updated_at: Option<u64>,
}

impl LiquiditySnapshot {
	/// Whether the pool can cover `amount`: DRTv1 when buying, WETH when selling.
	pub fn covers(&self, amount: U256, is_buy: bool) -> bool {
		let reserve = if is_buy { self.drt } else { self.weth };
		reserve >= amount
	}
}

/// JSON form of a snapshot with human-readable amounts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityView {
	pub drt: String,
	pub weth: String,
	pub updated_at: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sufficient: Option<bool>,
}

impl From<LiquiditySnapshot> for LiquidityView {
	fn from(snapshot: LiquiditySnapshot) -> Self {
		Self {
			drt: format_amount(snapshot.drt, TOKEN_DECIMALS),
			weth: format_amount(snapshot.weth, TOKEN_DECIMALS),
			updated_at: snapshot.updated_at,
			sufficient: None,
		}
	}
}

/// Addresses the monitor reads.
#[derive(Debug, Clone, Copy)]
pub struct LiquiditySources {
	pub pool: Address,
	pub drt: Address,
	pub weth: Address,
}

/// The pool and token addresses from `[contracts]`.
pub fn sources(state: &AppState) -> Result<LiquiditySources, ApiError> {
	let contracts = &state.config.contracts;
	Ok(LiquiditySources {
		pool: require_contract(contracts.liquidity_pool, "liquidity_pool")?,
		drt: require_contract(contracts.drt_v1, "drt_v1")?,
		weth: require_contract(contracts.weth, "weth")?,
	})
}

#[derive(Debug, Clone, Default)]
pub struct LiquidityCache {
	inner: Arc<RwLock<LiquiditySnapshot>>,
}

impl LiquidityCache {
	pub async fn snapshot(&self) -> LiquiditySnapshot {
		*self.inner.read().await
	}

	pub async fn check(&self, amount: U256, is_buy: bool) -> bool {
		self.inner.read().await.covers(amount, is_buy)
	}

	/// Reads both balances and replaces the cached snapshot.
	///
	/// On error the previous snapshot is kept.
	pub async fn refresh(
		&self,
		delivery: &DeliveryService,
		sources: LiquiditySources,
	) -> Result<LiquiditySnapshot, DeliveryError> {
		let (drt, weth) = tokio::try_join!(
			delivery.token_balance(sources.drt, sources.pool),
			delivery.token_balance(sources.weth, sources.pool),
		)?;

		let snapshot = LiquiditySnapshot {
			drt,
			weth,
			updated_at: Some(current_timestamp()),
		};
		*self.inner.write().await = snapshot;

		tracing::debug!(
			drt = %format_amount(drt, TOKEN_DECIMALS),
			weth = %format_amount(weth, TOKEN_DECIMALS),
			"Liquidity pool updated"
		);
		Ok(snapshot)
	}
}

/// Refreshes `cache` every `interval_secs` until stopped.
pub async fn run(
	cache: LiquidityCache,
	delivery: Arc<DeliveryService>,
	sources: LiquiditySources,
	interval_secs: u64,
	mut stop_rx: broadcast::Receiver<()>,
) {
	let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			_ = interval.tick() => {
				if let Err(e) = cache.refresh(&delivery, sources).await {
					tracing::error!(error = %e, "Error updating liquidity");
				}
			}
			_ = stop_rx.recv() => {
				tracing::info!("Stopping liquidity monitor");
				break;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_sol_types::{SolCall, SolValue};
	use drt_delivery::contracts::IERC20;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::addr;

	fn sources() -> LiquiditySources {
		LiquiditySources {
			pool: addr(0x50),
			drt: addr(0x01),
			weth: addr(0x02),
		}
	}

	fn delivery(drt: u64, weth: u64) -> Arc<DeliveryService> {
		let mock = MockDelivery::new()
			.with_call_response_for(addr(0x01), IERC20::balanceOfCall::SELECTOR, U256::from(drt).abi_encode())
			.with_call_response_for(addr(0x02), IERC20::balanceOfCall::SELECTOR, U256::from(weth).abi_encode());
		Arc::new(DeliveryService::new(Arc::new(mock), 1))
	}

	#[test]
	fn test_covers_uses_side_of_trade() {
		let snapshot = LiquiditySnapshot {
			drt: U256::from(100u64),
			weth: U256::from(10u64),
			updated_at: None,
		};
		assert!(snapshot.covers(U256::from(100u64), true));
		assert!(!snapshot.covers(U256::from(101u64), true));
		assert!(snapshot.covers(U256::from(10u64), false));
		assert!(!snapshot.covers(U256::from(11u64), false));
	}

	#[tokio::test]
	async fn test_refresh_replaces_snapshot() {
		let cache = LiquidityCache::default();
		assert!(!cache.check(U256::from(1u64), true).await);

		let snapshot = cache.refresh(&delivery(500, 7), sources()).await.unwrap();
		assert_eq!(snapshot.drt, U256::from(500u64));
		assert!(snapshot.updated_at.is_some());
		assert!(cache.check(U256::from(500u64), true).await);
		assert!(!cache.check(U256::from(8u64), false).await);
	}

	#[tokio::test]
	async fn test_run_stops_on_signal() {
		let cache = LiquidityCache::default();
		let (stop_tx, stop_rx) = broadcast::channel(1);
		let task = tokio::spawn(run(cache.clone(), delivery(3, 4), sources(), 1, stop_rx));

		// The first tick fires immediately.
		tokio::time::sleep(Duration::from_millis(50)).await;
		stop_tx.send(()).unwrap();
		task.await.unwrap();
		assert_eq!(cache.snapshot().await.weth, U256::from(4u64));
	}

	#[test]
	fn test_view_formats_amounts() {
		let view = LiquidityView::from(LiquiditySnapshot {
			drt: U256::from(1_500_000_000_000_000_000u128),
			weth: U256::ZERO,
			updated_at: Some(9),
		});
		assert_eq!(view.drt, "1.5");
		assert_eq!(view.weth, "0");
	}
}
