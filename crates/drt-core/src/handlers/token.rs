//! Liveness, DRTv1 minting, balance lookups and the DMOS digitize/rebate calls.

use super::{parse_address, positive_amount, required, ApiJson, TxResponse};
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, TxHash, U256};
use axum::extract::{Path, State};
use axum::Json;
use drt_delivery::contracts::{IDRTToken, IDigitize, IRebateVault};
use drt_types::{format_address, format_amount, AmountInput, TOKEN_DECIMALS};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const LIVENESS_MESSAGE: &str = "DRTv1 Backend API is live 🚀";

pub async fn index() -> &'static str {
	LIVENESS_MESSAGE
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub ok: bool,
	pub chain_id: u64,
	pub block_number: u64,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
	let block_number = state.delivery.get_block_number().await?;
	Ok(Json(HealthResponse {
		ok: true,
		chain_id: state.config.network.chain_id,
		block_number,
	}))
}

#[derive(Debug, Deserialize)]
pub struct MintRequest {
	pub recipient: Option<Address>,
	pub amount: Option<AmountInput>,
}

/// Mints `amount` whole DRTv1 tokens to `recipient`.
#[instrument(skip_all)]
pub async fn mint(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<MintRequest>,
) -> Result<Json<TxResponse>, ApiError> {
	const MESSAGE: &str = "recipient and amount required";
	let recipient = required(req.recipient, MESSAGE)?;
	let amount = positive_amount(req.amount.as_ref(), MESSAGE)?;
	let token = require_contract(state.config.contracts.drt_v1, "drt_v1")?;

	let receipt = state
		.delivery
		.execute(token, &IDRTToken::mintCall { to: recipient, amount }, U256::ZERO)
		.await?;

	tracing::info!(
		recipient = %format_address(&recipient),
		amount = %format_amount(amount, TOKEN_DECIMALS),
		tx_hash = %receipt.hash,
		"Minted DRTv1"
	);
	Ok(Json(TxResponse::new(receipt.hash)))
}

#[derive(Debug, Serialize)]
pub struct Balances {
	pub eth: String,
	#[serde(rename = "sETH")]
	pub seth: String,
	#[serde(rename = "dRTv1")]
	pub drt_v1: String,
	#[serde(rename = "dRTv2")]
	pub drt_v2: String,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
	pub success: bool,
	pub balances: Balances,
}

/// ETH, sETH, DRTv1 and DRTv2 balances of an address, in whole tokens.
pub async fn balances(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<BalancesResponse>, ApiError> {
	let owner = parse_address(&address)?;

	let contracts = &state.config.contracts;
	let seth = require_contract(contracts.seth, "seth")?;
	let drt_v1 = require_contract(contracts.drt_v1, "drt_v1")?;
	let drt_v2 = require_contract(contracts.drt_v2, "drt_v2")?;

	let delivery = &state.delivery;
	let (eth, seth, drt_v1, drt_v2) = tokio::try_join!(
		delivery.get_balance(owner),
		delivery.token_balance(seth, owner),
		delivery.token_balance(drt_v1, owner),
		delivery.token_balance(drt_v2, owner),
	)?;

	Ok(Json(BalancesResponse {
		success: true,
		balances: Balances {
			eth: format_amount(eth, TOKEN_DECIMALS),
			seth: format_amount(seth, TOKEN_DECIMALS),
			drt_v1: format_amount(drt_v1, TOKEN_DECIMALS),
			drt_v2: format_amount(drt_v2, TOKEN_DECIMALS),
		},
	}))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DmosResponse {
	pub status: &'static str,
	pub tx_hash: TxHash,
}

impl DmosResponse {
	fn ok(tx_hash: TxHash) -> Json<Self> {
		Json(Self {
			status: "ok",
			tx_hash,
		})
	}
}

#[derive(Debug, Deserialize)]
pub struct DigitizeRequest {
	pub to: Option<Address>,
	/// Raw token units
	pub amount: Option<AmountInput>,
}

/// Mints digitized tokens through the Digitize contract.
#[instrument(skip_all)]
pub async fn dmos_mint(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<DigitizeRequest>,
) -> Result<Json<DmosResponse>, ApiError> {
	const MESSAGE: &str = "to and amount are required";
	let to = required(req.to, MESSAGE)?;
	let amount = required(req.amount.as_ref(), MESSAGE)?.to_base_units()?;
	let digitize = require_contract(state.config.contracts.digitize, "digitize")?;

	let receipt = state
		.delivery
		.execute(digitize, &IDigitize::mintCall { to, amount }, U256::ZERO)
		.await?;
	Ok(DmosResponse::ok(receipt.hash))
}

#[derive(Debug, Deserialize)]
pub struct RebateRequest {
	pub collector: Option<Address>,
	/// Raw token units
	pub amount: Option<AmountInput>,
}

#[instrument(skip_all)]
pub async fn credit_rebate(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<RebateRequest>,
) -> Result<Json<DmosResponse>, ApiError> {
	const MESSAGE: &str = "collector and amount are required";
	let collector = required(req.collector, MESSAGE)?;
	let amount = required(req.amount.as_ref(), MESSAGE)?.to_base_units()?;
	let vault = require_contract(state.config.contracts.rebate_vault, "rebate_vault")?;

	let receipt = state
		.delivery
		.execute(vault, &IRebateVault::creditRebateCall { collector, amount }, U256::ZERO)
		.await?;
	tracing::info!(collector = %format_address(&collector), amount = %amount, "Credited rebate");
	Ok(DmosResponse::ok(receipt.hash))
}

/// Claims the backend wallet's accumulated rebate.
#[instrument(skip_all)]
pub async fn claim_rebate(State(state): State<AppState>) -> Result<Json<DmosResponse>, ApiError> {
	let vault = require_contract(state.config.contracts.rebate_vault, "rebate_vault")?;
	let receipt = state
		.delivery
		.execute(vault, &IRebateVault::claimRebateCall {}, U256::ZERO)
		.await?;
	Ok(DmosResponse::ok(receipt.hash))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::{default_state, send, state_with};
	use alloy_sol_types::{SolCall, SolValue};
	use axum::http::StatusCode;
	use drt_delivery::contracts::IERC20;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};
	use serde_json::json;
	use std::sync::Arc;

	fn token_config() -> drt_types::Config {
		ConfigBuilder::new()
			.with_contracts(|c| {
				c.drt_v1 = Some(addr(0x01));
				c.drt_v2 = Some(addr(0x02));
				c.seth = Some(addr(0x03));
			})
			.build()
	}

	#[tokio::test]
	async fn test_index_and_health() {
		let mock = Arc::new(MockDelivery::new().with_block_number(1234));
		let (status, body) = send(default_state(mock.clone()), "GET", "/", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!(LIVENESS_MESSAGE));

		let (status, body) = send(default_state(mock), "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["blockNumber"], 1234);
		assert_eq!(body["chainId"], 1);
	}

	#[tokio::test]
	async fn test_mint_scales_amount() {
		let mock = Arc::new(MockDelivery::new());
		let state = state_with(token_config(), mock.clone());
		let (status, body) = send(
			state,
			"POST",
			"/api/mint",
			Some(json!({"recipient": addr(0x55), "amount": 2})),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		let sent = mock.submitted();
		assert_eq!(sent[0].to, addr(0x01));
		let call = IDRTToken::mintCall::abi_decode(&sent[0].data).unwrap();
		assert_eq!(call.to, addr(0x55));
		assert_eq!(call.amount, U256::from(2_000_000_000_000_000_000u128));
	}

	#[tokio::test]
	async fn test_mint_validation() {
		let mock = Arc::new(MockDelivery::new());
		let (status, body) = send(
			state_with(token_config(), mock.clone()),
			"POST",
			"/api/mint",
			Some(json!({"recipient": addr(0x55)})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "recipient and amount required");

		let (status, _) = send(
			default_state(mock.clone()),
			"POST",
			"/api/mint",
			Some(json!({"recipient": addr(0x55), "amount": "1"})),
		)
		.await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert!(mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_mint_without_signer() {
		let mock = Arc::new(MockDelivery::new().read_only());
		let (status, _) = send(
			state_with(token_config(), mock),
			"POST",
			"/api/mint",
			Some(json!({"recipient": addr(0x55), "amount": "1"})),
		)
		.await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	}

	#[tokio::test]
	async fn test_balances_formats_each_token() {
		let owner = addr(0x77);
		let one = U256::from(1_000_000_000_000_000_000u128);
		let mock = MockDelivery::new()
			.with_balance(owner, one * U256::from(3u64))
			.with_call_response_for(addr(0x01), IERC20::balanceOfCall::SELECTOR, (one / U256::from(2u64)).abi_encode())
			.with_call_response_for(addr(0x02), IERC20::balanceOfCall::SELECTOR, U256::ZERO.abi_encode())
			.with_call_response_for(addr(0x03), IERC20::balanceOfCall::SELECTOR, one.abi_encode());
		let state = state_with(token_config(), Arc::new(mock));

		let uri = format!("/api/balances/{}", format_address(&owner));
		let (status, body) = send(state, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			body["balances"],
			json!({"eth": "3", "sETH": "1", "dRTv1": "0.5", "dRTv2": "0"})
		);
	}

	#[tokio::test]
	async fn test_dmos_calls() {
		let config = ConfigBuilder::new()
			.with_contracts(|c| {
				c.digitize = Some(addr(0x0d));
				c.rebate_vault = Some(addr(0x0e));
			})
			.build();
		let mock = Arc::new(MockDelivery::new());
		let state = state_with(config, mock.clone());

		let (status, body) = send(
			state.clone(),
			"POST",
			"/api/dmos/mint",
			Some(json!({"to": addr(0x55), "amount": "500"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
		assert!(body["txHash"].is_string());

		let (status, _) = send(
			state.clone(),
			"POST",
			"/api/dmos/credit-rebate",
			Some(json!({"collector": addr(0x56), "amount": 20})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, _) = send(state, "POST", "/api/dmos/claim", None).await;
		assert_eq!(status, StatusCode::OK);

		let sent = mock.submitted();
		let mint = IDigitize::mintCall::abi_decode(&sent[0].data).unwrap();
		assert_eq!((sent[0].to, mint.to, mint.amount), (addr(0x0d), addr(0x55), U256::from(500u64)));
		let credit = IRebateVault::creditRebateCall::abi_decode(&sent[1].data).unwrap();
		assert_eq!((sent[1].to, credit.collector), (addr(0x0e), addr(0x56)));
		assert_eq!(sent[2].selector(), Some(IRebateVault::claimRebateCall::SELECTOR));
	}

	#[tokio::test]
	async fn test_balances_rejects_bad_address() {
		let state = state_with(token_config(), Arc::new(MockDelivery::new()));
		let (status, _) = send(state, "GET", "/api/balances/0x1234", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}
}
