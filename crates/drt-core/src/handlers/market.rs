//! DRTv1 transfer history and token prices.

use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, TxHash};
use alloy_sol_types::SolEvent;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, SecondsFormat};
use drt_delivery::contracts::IERC20;
use drt_integrations::{split_list, PriceQuotes};
use drt_types::{format_amount, LogEntry, TOKEN_DECIMALS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of transfers returned by `GET /api/transactions`.
pub const RECENT_TRANSFERS: usize = 25;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
	pub from: Address,
	pub to: Address,
	pub amount: String,
	/// ISO-8601 time of the block, e.g. `2024-05-01T12:00:00.000Z`
	pub timestamp: Option<String>,
	pub tx_hash: Option<TxHash>,
}

/// Formats a Unix timestamp the way JavaScript's `toISOString` does.
pub fn iso_timestamp(secs: u64) -> Option<String> {
	let secs = i64::try_from(secs).ok()?;
	DateTime::from_timestamp(secs, 0).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn decode_transfer(log: &LogEntry) -> Option<IERC20::Transfer> {
	match IERC20::Transfer::decode_raw_log(log.topics.iter().copied(), &log.data) {
		Ok(transfer) => Some(transfer),
		Err(e) => {
			tracing::warn!(tx_hash = ?log.transaction_hash, error = %e, "Skipping undecodable Transfer log");
			None
		},
	}
}

/// Latest DRTv1 transfers, newest first.
pub async fn transactions(State(state): State<AppState>) -> Result<Json<Vec<TransferView>>, ApiError> {
	const MESSAGE: &str = "Failed to fetch transactions";
	let token = require_contract(state.config.contracts.drt_v1, "drt_v1")?;

	let logs = state
		.delivery
		.recent_logs(
			token,
			IERC20::Transfer::SIGNATURE_HASH,
			state.config.network.log_lookback_blocks,
		)
		.await
		.map_err(|e| ApiError::chain(MESSAGE, e))?;

	let skip = logs.len().saturating_sub(RECENT_TRANSFERS);
	let mut timestamps: HashMap<u64, Option<String>> = HashMap::new();
	let mut transfers = Vec::with_capacity(RECENT_TRANSFERS);

	for log in logs.iter().skip(skip).rev() {
		let Some(transfer) = decode_transfer(log) else {
			continue;
		};

		let timestamp = match log.block_number {
			Some(block) => match timestamps.get(&block) {
				Some(cached) => cached.clone(),
				None => {
					let secs = state
						.delivery
						.get_block_timestamp(block)
						.await
						.map_err(|e| ApiError::chain(MESSAGE, e))?;
					let iso = iso_timestamp(secs);
					timestamps.insert(block, iso.clone());
					iso
				},
			},
			None => None,
		};

		transfers.push(TransferView {
			from: transfer.from,
			to: transfer.to,
			amount: format_amount(transfer.value, TOKEN_DECIMALS),
			timestamp,
			tx_hash: log.transaction_hash,
		});
	}

	tracing::debug!(scanned = logs.len(), returned = transfers.len(), "Fetched DRTv1 transfers");
	Ok(Json(transfers))
}

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
	pub ids: Option<String>,
	pub symbols: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
	pub source: &'static str,
	pub prices: PriceQuotes,
}

/// USD prices: `?ids=` goes to CoinGecko, `?symbols=` to CoinMarketCap.
pub async fn prices(
	State(state): State<AppState>,
	Query(query): Query<PricesQuery>,
) -> Result<Json<PricesResponse>, ApiError> {
	let ids = query.ids.as_deref().map(split_list).unwrap_or_default();
	if !ids.is_empty() {
		let prices = state.prices.coingecko(&ids).await?;
		return Ok(Json(PricesResponse {
			source: "coingecko",
			prices,
		}));
	}

	let symbols = query.symbols.as_deref().map(split_list).unwrap_or_default();
	if !symbols.is_empty() {
		let prices = state.prices.coinmarketcap(&symbols).await?;
		return Ok(Json(PricesResponse {
			source: "coinmarketcap",
			prices,
		}));
	}

	Err(ApiError::bad_request("Provide ?ids= (CoinGecko) or ?symbols= (CoinMarketCap)"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::{default_state, send, state_with};
	use alloy_primitives::{Bytes, U256};
	use alloy_sol_types::SolValue;
	use axum::http::StatusCode;
	use axum::routing::get;
	use axum::Router;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};
	use serde_json::json;
	use std::sync::Arc;

	fn transfer_log(block: u64, from: u8, to: u8, value: u64, index: u8) -> LogEntry {
		LogEntry {
			address: addr(0x01),
			topics: vec![
				IERC20::Transfer::SIGNATURE_HASH,
				addr(from).into_word(),
				addr(to).into_word(),
			],
			data: Bytes::from(U256::from(value).abi_encode()),
			block_number: Some(block),
			transaction_hash: Some(TxHash::repeat_byte(index)),
			log_index: Some(0),
		}
	}

	fn token_config() -> drt_types::Config {
		ConfigBuilder::new()
			.with_contracts(|c| c.drt_v1 = Some(addr(0x01)))
			.build()
	}

	#[test]
	fn test_iso_timestamp() {
		assert_eq!(iso_timestamp(0).unwrap(), "1970-01-01T00:00:00.000Z");
		assert_eq!(iso_timestamp(1_700_000_000).unwrap(), "2023-11-14T22:13:20.000Z");
	}

	#[tokio::test]
	async fn test_transactions_newest_first() {
		let mut mock = MockDelivery::new()
			.with_block_timestamp(90, 1_700_000_000)
			.with_block_timestamp(95, 1_700_000_060);
		mock = mock
			.with_log(transfer_log(90, 0x0a, 0x0b, 5, 1))
			.with_log(transfer_log(95, 0x0b, 0x0c, 7, 2));
		let (status, body) = send(state_with(token_config(), Arc::new(mock)), "GET", "/api/transactions", None).await;

		assert_eq!(status, StatusCode::OK);
		let transfers = body.as_array().unwrap();
		assert_eq!(transfers.len(), 2);
		assert_eq!(transfers[0]["from"], json!(addr(0x0b)));
		assert_eq!(transfers[0]["timestamp"], "2023-11-14T22:14:20.000Z");
		assert_eq!(transfers[0]["amount"], "0.000000000000000007");
		assert_eq!(transfers[1]["to"], json!(addr(0x0b)));
	}

	#[tokio::test]
	async fn test_transactions_keeps_latest_page() {
		let mut mock = MockDelivery::new().with_block_timestamp(99, 1);
		for i in 0..30u8 {
			mock = mock.with_log(transfer_log(99, 0x0a, 0x0b, i as u64, i + 1));
		}
		let mock = Arc::new(mock);
		let (_, body) = send(state_with(token_config(), mock.clone()), "GET", "/api/transactions", None).await;

		let transfers = body.as_array().unwrap();
		assert_eq!(transfers.len(), RECENT_TRANSFERS);
		assert_eq!(transfers[0]["txHash"], json!(TxHash::repeat_byte(30)));

		let filter = mock.last_log_filter().unwrap();
		assert_eq!(filter.to_block, 100);
		assert_eq!(filter.from_block, 0);
	}

	#[tokio::test]
	async fn test_prices_requires_query() {
		let (status, _) = send(default_state(Arc::new(MockDelivery::new())), "GET", "/api/prices", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_prices_from_coingecko() {
		let app = Router::new().route(
			"/simple/price",
			get(|| async { Json(json!({"ethereum": {"usd": 3000.5}})) }),
		);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let url = format!("http://{}", listener.local_addr().unwrap());
		tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

		let config = ConfigBuilder::new()
			.with(|c| c.prices.coingecko_url = url)
			.build();
		let (status, body) = send(
			state_with(config, Arc::new(MockDelivery::new())),
			"GET",
			"/api/prices?ids=ethereum",
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"source": "coingecko", "prices": {"ethereum": 3000.5}}));
	}
}
