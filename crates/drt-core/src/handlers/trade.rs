//! Vault trades, DRTrade liquidity-checked swaps and DRTSwapRouter calldata.

use super::{positive_amount, required, ApiJson, TxResponse};
use crate::monitors::liquidity::LiquidityView;
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use axum::extract::{Query, State};
use axum::Json;
use drt_delivery::contracts::{IDRTSwapRouter, IDRTVault, IDRTrade};
use drt_types::{format_address, parse_amount, AmountInput, TOKEN_DECIMALS};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
	pub user_address: Option<Address>,
	pub eth_amount: Option<AmountInput>,
}

/// Buys DRTv1 from the vault, paying `ethAmount` ETH from the backend wallet.
#[instrument(skip_all)]
pub async fn buy_drt_v1(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<BuyRequest>,
) -> Result<Json<TxResponse>, ApiError> {
	let value = positive_amount(req.eth_amount.as_ref(), "Invalid ETH amount")?;
	let vault = require_contract(state.config.contracts.vault, "vault")?;

	let receipt = state
		.delivery
		.execute(vault, &IDRTVault::buyDRTv1Call {}, value)
		.await?;
	tracing::info!(
		user = ?req.user_address.as_ref().map(format_address),
		tx_hash = %receipt.hash,
		"Bought DRTv1 from vault"
	);
	Ok(Json(TxResponse::new(receipt.hash)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
	pub user_address: Option<Address>,
	pub token_amount: Option<AmountInput>,
}

#[instrument(skip_all)]
pub async fn sell_drt_v1(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<SellRequest>,
) -> Result<Json<TxResponse>, ApiError> {
	let amount = positive_amount(req.token_amount.as_ref(), "Invalid token amount")?;
	let vault = require_contract(state.config.contracts.vault, "vault")?;

	let receipt = state
		.delivery
		.execute(vault, &IDRTVault::sellDRTv1Call { amount }, U256::ZERO)
		.await?;
	tracing::info!(
		user = ?req.user_address.as_ref().map(format_address),
		tx_hash = %receipt.hash,
		"Sold DRTv1 to vault"
	);
	Ok(Json(TxResponse::new(receipt.hash)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrtradeRequest {
	pub wallet_address: Option<Address>,
	pub direction: Option<String>,
	pub amount: Option<AmountInput>,
}

/// A validated DRTrade request.
struct TradeIntent {
	wallet: Address,
	is_buy: bool,
	amount: U256,
}

impl DrtradeRequest {
	fn validate(self) -> Result<TradeIntent, ApiError> {
		const MESSAGE: &str = "Wallet address, direction and amount are required.";
		let wallet = required(self.wallet_address, MESSAGE)?;
		let direction = required(self.direction, MESSAGE)?;
		let amount = required(self.amount, MESSAGE)?.to_units(TOKEN_DECIMALS)?;

		let is_buy = match direction.to_lowercase().as_str() {
			"buy" => true,
			"sell" => false,
			other => {
				return Err(ApiError::bad_request(format!(
					"direction must be \"buy\" or \"sell\", got \"{}\"",
					other
				)))
			},
		};
		Ok(TradeIntent {
			wallet,
			is_buy,
			amount,
		})
	}
}

pub const INSUFFICIENT_LIQUIDITY: &str = "Insufficient liquidity, please try again later.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrtradeResponse {
	pub status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tx_hash: Option<TxHash>,
}

impl DrtradeResponse {
	fn proceed() -> Self {
		Self {
			status: "proceed",
			message: None,
			tx_hash: None,
		}
	}

	fn abort() -> Self {
		Self {
			status: "abort",
			message: Some(INSUFFICIENT_LIQUIDITY),
			tx_hash: None,
		}
	}

	fn executed(tx_hash: TxHash) -> Self {
		Self {
			status: "executed",
			message: None,
			tx_hash: Some(tx_hash),
		}
	}
}

async fn check_liquidity(state: &AppState, drtrade: Address, intent: &TradeIntent) -> Result<bool, ApiError> {
	let call = IDRTrade::checkLiquidityCall {
		isBuy: intent.is_buy,
		amount: intent.amount,
	};
	let liquid = state
		.delivery
		.read(drtrade, &call)
		.await
		.map_err(|e| ApiError::chain("Liquidity check failed", e))?;

	tracing::info!(
		wallet = %format_address(&intent.wallet),
		is_buy = intent.is_buy,
		amount = %intent.amount,
		liquid,
		"DRTrade liquidity check"
	);
	Ok(liquid)
}

/// Asks the DRTrade contract whether the pool can cover the trade.
#[instrument(skip_all)]
pub async fn liquidity_check(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<DrtradeRequest>,
) -> Result<Json<DrtradeResponse>, ApiError> {
	let intent = req.validate()?;
	let drtrade = require_contract(state.config.contracts.drtrade, "drtrade")?;

	if check_liquidity(&state, drtrade, &intent).await? {
		Ok(Json(DrtradeResponse::proceed()))
	} else {
		Ok(Json(DrtradeResponse::abort()))
	}
}

/// Runs the liquidity check and, when it passes, swaps through DRTrade.
#[instrument(skip_all)]
pub async fn execute_trade(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<DrtradeRequest>,
) -> Result<Json<DrtradeResponse>, ApiError> {
	let intent = req.validate()?;
	let drtrade = require_contract(state.config.contracts.drtrade, "drtrade")?;

	if !check_liquidity(&state, drtrade, &intent).await? {
		return Ok(Json(DrtradeResponse::abort()));
	}

	let result = if intent.is_buy {
		let call = IDRTrade::swapExactWETHForDRTv1Call {
			amountIn: intent.amount,
		};
		state.delivery.execute(drtrade, &call, U256::ZERO).await
	} else {
		let call = IDRTrade::swapExactDRTv1ForWETHCall {
			amountIn: intent.amount,
		};
		state.delivery.execute(drtrade, &call, U256::ZERO).await
	};
	let receipt = result.map_err(|e| ApiError::chain("Trade execution failed", e))?;

	Ok(Json(DrtradeResponse::executed(receipt.hash)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityQuery {
	/// Trade size in ether units.
	pub amount: Option<String>,
	#[serde(default)]
	pub is_buy: bool,
}

/// Pool balances as last read by the liquidity monitor. Given `amount`, the
/// response also says whether the cached reserve on that side covers it.
pub async fn liquidity(
	State(state): State<AppState>,
	Query(query): Query<LiquidityQuery>,
) -> Result<Json<LiquidityView>, ApiError> {
	let mut view: LiquidityView = state.liquidity.snapshot().await.into();
	if let Some(amount) = query.amount {
		let amount = parse_amount(&amount, TOKEN_DECIMALS)?;
		view.sufficient = Some(state.liquidity.check(amount, query.is_buy).await);
	}
	Ok(Json(view))
}

/// Unsigned transaction for the caller's wallet to sign.
#[derive(Debug, Serialize)]
pub struct Calldata {
	pub to: Address,
	pub data: Bytes,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapDrtForEthRequest {
	#[serde(default, rename = "fromV2")]
	pub from_v2: bool,
	pub amount_in: Option<AmountInput>,
	pub amount_out_min: Option<AmountInput>,
	pub wallet_address: Option<Address>,
}

fn base_units(amount: Option<&AmountInput>) -> Result<U256, ApiError> {
	match amount {
		Some(amount) => Ok(amount.to_base_units()?),
		None => Ok(U256::ZERO),
	}
}

pub async fn swap_drt_for_eth(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<SwapDrtForEthRequest>,
) -> Result<Json<Calldata>, ApiError> {
	let to = require_contract(state.config.contracts.swap_router, "swap_router")?;
	let amount_in = base_units(Some(required(req.amount_in.as_ref(), "amountIn is required")?))?;
	let call = IDRTSwapRouter::swapDRTforETHCall {
		fromV2: req.from_v2,
		amountIn: amount_in,
		amountOutMin: base_units(req.amount_out_min.as_ref())?,
	};
	Ok(Json(Calldata {
		to,
		data: call.abi_encode().into(),
		value: None,
	}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEthForDrtRequest {
	#[serde(default, rename = "toV2")]
	pub to_v2: bool,
	pub amount_out_min: Option<AmountInput>,
	/// Wei to attach to the transaction
	pub eth_value: Option<AmountInput>,
	pub wallet_address: Option<Address>,
}

pub async fn swap_eth_for_drt(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<SwapEthForDrtRequest>,
) -> Result<Json<Calldata>, ApiError> {
	let to = require_contract(state.config.contracts.swap_router, "swap_router")?;
	let value = base_units(Some(required(req.eth_value.as_ref(), "ethValue is required")?))?;
	let call = IDRTSwapRouter::swapETHforDRTCall {
		toV2: req.to_v2,
		amountOutMin: base_units(req.amount_out_min.as_ref())?,
	};
	Ok(Json(Calldata {
		to,
		data: call.abi_encode().into(),
		value: Some(value.to_string()),
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::{send, state_with};
	use alloy_sol_types::SolValue;
	use axum::http::StatusCode;
	use crate::monitors::liquidity::LiquiditySources;
	use drt_delivery::contracts::IERC20;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};
	use serde_json::json;
	use std::sync::Arc;

	const ONE: u128 = 1_000_000_000_000_000_000;

	fn trade_config() -> drt_types::Config {
		ConfigBuilder::new()
			.with_contracts(|c| {
				c.vault = Some(addr(0x10));
				c.drtrade = Some(addr(0x11));
				c.swap_router = Some(addr(0x12));
			})
			.build()
	}

	fn liquid(mock: MockDelivery, liquid: bool) -> MockDelivery {
		mock.with_call_response(IDRTrade::checkLiquidityCall::SELECTOR, liquid.abi_encode())
	}

	#[tokio::test]
	async fn test_buy_attaches_value() {
		let mock = Arc::new(MockDelivery::new());
		let (status, body) = send(
			state_with(trade_config(), mock.clone()),
			"POST",
			"/api/trade/buyDRTv1",
			Some(json!({"userAddress": addr(0x99), "ethAmount": "0.5"})),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		let sent = mock.submitted();
		assert_eq!(sent[0].to, addr(0x10));
		assert_eq!(sent[0].value, U256::from(ONE / 2));
		assert_eq!(sent[0].selector(), Some(IDRTVault::buyDRTv1Call::SELECTOR));
	}

	#[tokio::test]
	async fn test_buy_and_sell_reject_bad_amounts() {
		for (uri, body, message) in [
			("/api/trade/buyDRTv1", json!({"ethAmount": "0"}), "Invalid ETH amount"),
			("/api/trade/buyDRTv1", json!({"ethAmount": "abc"}), "Invalid ETH amount"),
			("/api/trade/sellDRTv1", json!({"tokenAmount": -1}), "Invalid token amount"),
			("/api/trade/sellDRTv1", json!({}), "Invalid token amount"),
		] {
			let mock = Arc::new(MockDelivery::new());
			let (status, response) =
				send(state_with(trade_config(), mock.clone()), "POST", uri, Some(body)).await;
			assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
			assert_eq!(response["error"], message);
			assert!(mock.submitted().is_empty());
		}
	}

	#[tokio::test]
	async fn test_sell_encodes_amount() {
		let mock = Arc::new(MockDelivery::new());
		let (status, _) = send(
			state_with(trade_config(), mock.clone()),
			"POST",
			"/api/trade/sellDRTv1",
			Some(json!({"tokenAmount": 3})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		let call = IDRTVault::sellDRTv1Call::abi_decode(&mock.submitted()[0].data).unwrap();
		assert_eq!(call.amount, U256::from(3 * ONE));
	}

	#[tokio::test]
	async fn test_drtrade_proceed_and_abort() {
		let request = json!({"walletAddress": addr(0x99), "direction": "BUY", "amount": "10"});

		let mock = Arc::new(liquid(MockDelivery::new(), true));
		let (status, body) = send(
			state_with(trade_config(), mock),
			"POST",
			"/api/drtrade",
			Some(request.clone()),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"status": "proceed"}));

		let mock = Arc::new(liquid(MockDelivery::new(), false));
		let (_, body) = send(state_with(trade_config(), mock), "POST", "/api/drtrade", Some(request)).await;
		assert_eq!(body, json!({"status": "abort", "message": INSUFFICIENT_LIQUIDITY}));
	}

	#[tokio::test]
	async fn test_drtrade_validation() {
		let mock = Arc::new(MockDelivery::new());
		let (status, body) = send(
			state_with(trade_config(), mock.clone()),
			"POST",
			"/api/drtrade",
			Some(json!({"walletAddress": addr(0x99), "amount": "10"})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "Wallet address, direction and amount are required.");

		let (status, _) = send(
			state_with(trade_config(), mock),
			"POST",
			"/api/drtrade",
			Some(json!({"walletAddress": addr(0x99), "direction": "hold", "amount": "10"})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_execute_swaps_by_direction() {
		let mock = Arc::new(liquid(MockDelivery::new(), true));
		let (status, body) = send(
			state_with(trade_config(), mock.clone()),
			"POST",
			"/api/drtrade/execute",
			Some(json!({"walletAddress": addr(0x99), "direction": "sell", "amount": "2"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "executed");
		assert!(body["txHash"].is_string());

		let sent = mock.submitted();
		assert_eq!(sent.len(), 1);
		let call = IDRTrade::swapExactDRTv1ForWETHCall::abi_decode(&sent[0].data).unwrap();
		assert_eq!(call.amountIn, U256::from(2 * ONE));
	}

	#[tokio::test]
	async fn test_execute_aborts_without_sending() {
		let mock = Arc::new(liquid(MockDelivery::new(), false));
		let (_, body) = send(
			state_with(trade_config(), mock.clone()),
			"POST",
			"/api/drtrade/execute",
			Some(json!({"walletAddress": addr(0x99), "direction": "buy", "amount": "2"})),
		)
		.await;
		assert_eq!(body["status"], "abort");
		assert!(mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_liquidity_before_first_refresh() {
		let state = state_with(trade_config(), Arc::new(MockDelivery::new()));
		let (status, body) = send(state, "GET", "/api/liquidity", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"drt": "0", "weth": "0", "updatedAt": null}));
	}

	#[tokio::test]
	async fn test_liquidity_checks_cached_reserve() {
		let balance = IERC20::balanceOfCall::SELECTOR;
		let mock = MockDelivery::new()
			.with_call_response_for(addr(0x01), balance, U256::from(5 * ONE).abi_encode())
			.with_call_response_for(addr(0x02), balance, U256::from(ONE).abi_encode());
		let state = state_with(trade_config(), Arc::new(mock));
		let sources = LiquiditySources {
			pool: addr(0x50),
			drt: addr(0x01),
			weth: addr(0x02),
		};
		state.liquidity.refresh(&state.delivery, sources).await.unwrap();

		let (status, body) =
			send(state.clone(), "GET", "/api/liquidity?amount=4.5&isBuy=true", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["drt"], "5");
		assert_eq!(body["sufficient"], true);

		let (_, body) = send(state.clone(), "GET", "/api/liquidity?amount=1.5", None).await;
		assert_eq!(body["sufficient"], false);

		let (status, _) = send(state, "GET", "/api/liquidity?amount=abc", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_swap_calldata() {
		let state = state_with(trade_config(), Arc::new(MockDelivery::new()));
		let (status, body) = send(
			state.clone(),
			"POST",
			"/api/swap/swapDRTforETH",
			Some(json!({"fromV2": true, "amountIn": "1000", "amountOutMin": 5})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["to"], format_address(&addr(0x12)));
		assert!(body.get("value").is_none());
		let data: Bytes = serde_json::from_value(body["data"].clone()).unwrap();
		let call = IDRTSwapRouter::swapDRTforETHCall::abi_decode(&data).unwrap();
		assert!(call.fromV2);
		assert_eq!(call.amountIn, U256::from(1000u64));
		assert_eq!(call.amountOutMin, U256::from(5u64));

		let (status, body) = send(
			state,
			"POST",
			"/api/swap/swapETHforDRT",
			Some(json!({"amountOutMin": "1", "ethValue": "250"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["value"], "250");
		let data: Bytes = serde_json::from_value(body["data"].clone()).unwrap();
		let call = IDRTSwapRouter::swapETHforDRTCall::abi_decode(&data).unwrap();
		assert!(!call.toV2);
	}
}
