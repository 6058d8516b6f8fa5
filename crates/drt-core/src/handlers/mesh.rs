//! Mesh routing and multi-hop swap execution.
//!
//! Route lookups run against the pool graph loaded at startup. Swaps are
//! signed by the backend wallet: the input token is approved for the router,
//! gas is estimated and the swap is sent and awaited.

use super::{positive_amount, required, ApiJson};
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, TxHash, U256};
use axum::extract::{Query, State};
use axum::Json;
use drt_delivery::DeliveryError;
use drt_dex::{deadline, encode_v3_path, hop_pairs, SwapEncoder};
use drt_types::{current_timestamp, format_address, AmountInput};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshRouteQuery {
	pub token_in: Option<String>,
	pub token_out: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeshRouteResponse {
	pub path: Vec<Address>,
	pub pools: Vec<Address>,
}

/// Shortest route between two tokens with the pool used by each hop.
pub async fn mesh_route(
	State(state): State<AppState>,
	Query(query): Query<MeshRouteQuery>,
) -> Result<Json<MeshRouteResponse>, ApiError> {
	const MESSAGE: &str = "Missing tokenIn or tokenOut";
	let token_in = required(query.token_in.filter(|s| !s.is_empty()), MESSAGE)?;
	let token_out = required(query.token_out.filter(|s| !s.is_empty()), MESSAGE)?;
	let token_in = super::parse_address(&token_in)?;
	let token_out = super::parse_address(&token_out)?;

	let route = state.router.find_route(&token_in, &token_out)?;
	Ok(Json(MeshRouteResponse {
		path: route.path,
		pools: route.pools,
	}))
}

/// Wraps a delivery failure during a swap, keeping the read-only case distinct.
fn swap_failed(e: DeliveryError) -> ApiError {
	match e {
		DeliveryError::NoSigner => e.into(),
		e => ApiError::chain("Swap failed", e),
	}
}

/// Approves the universal router for `amount_in` of `token_in`, then sends
/// `multiHopSwap` over `hops` with an estimated gas limit.
pub async fn execute_mesh_swap(
	state: &AppState,
	token_in: Address,
	token_out: Address,
	amount_in: U256,
	hops: &[[Address; 2]],
) -> Result<TxHash, ApiError> {
	let router = require_contract(state.config.contracts.universal_router, "universal_router")?;
	let mesh = &state.config.mesh;

	let approve = SwapEncoder::approve(token_in, router, amount_in, mesh.approve_gas_limit);
	state.delivery.deliver(approve).await.map_err(swap_failed)?;

	let swap = SwapEncoder::multi_hop_swap(
		router,
		token_in,
		token_out,
		amount_in,
		hops,
		deadline(current_timestamp(), mesh.deadline_secs),
	);
	let gas = state
		.delivery
		.estimate_gas(swap.clone())
		.await
		.map_err(swap_failed)?;
	let receipt = state
		.delivery
		.deliver(swap.with_gas_limit(gas))
		.await
		.map_err(swap_failed)?;

	tracing::info!(
		token_in = %format_address(&token_in),
		token_out = %format_address(&token_out),
		hops = hops.len(),
		gas,
		tx_hash = %receipt.hash,
		"Mesh swap executed"
	);
	Ok(receipt.hash)
}

/// Checks that hop pairs chain from `token_in` to `token_out`.
pub fn validate_hops(
	token_in: Address,
	token_out: Address,
	paths: &[Vec<Address>],
) -> Result<Vec<[Address; 2]>, ApiError> {
	let mut hops = Vec::with_capacity(paths.len());
	let mut current = token_in;
	for (i, pair) in paths.iter().enumerate() {
		let [from, to] = pair.as_slice() else {
			return Err(ApiError::bad_request(format!(
				"paths[{}] must contain exactly two tokens",
				i
			)));
		};
		if *from != current {
			return Err(ApiError::bad_request(format!(
				"paths[{}] does not continue from {}",
				i,
				format_address(&current)
			)));
		}
		hops.push([*from, *to]);
		current = *to;
	}
	if current != token_out {
		return Err(ApiError::bad_request(format!(
			"paths do not end at tokenOut {}",
			format_address(&token_out)
		)));
	}
	Ok(hops)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshRouteRequest {
	pub token_in: Option<Address>,
	pub token_out: Option<Address>,
	pub amount_in: Option<AmountInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSwapResponse {
	pub success: bool,
	pub tx_hash: TxHash,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<Vec<Address>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paths: Option<Vec<[Address; 2]>>,
}

/// Finds a route of at most `max_hops` hops and swaps along it.
#[instrument(skip_all)]
pub async fn mesh_route_swap(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<MeshRouteRequest>,
) -> Result<Json<MeshSwapResponse>, ApiError> {
	const MESSAGE: &str = "Missing required fields";
	let token_in = required(req.token_in, MESSAGE)?;
	let token_out = required(req.token_out, MESSAGE)?;
	let amount_in = positive_amount(req.amount_in.as_ref(), MESSAGE)?;

	let path = state.router.find_path(&token_in, &token_out).map_err(|e| match e {
		drt_dex::DexError::NoRouteFound(..) => {
			ApiError::bad_request("No valid route found between tokens")
		},
		e => e.into(),
	})?;
	let hops = hop_pairs(&path);

	let tx_hash = execute_mesh_swap(&state, token_in, token_out, amount_in, &hops).await?;
	Ok(Json(MeshSwapResponse {
		success: true,
		tx_hash,
		path: Some(path),
		paths: Some(hops),
	}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSwapRequest {
	pub token_in: Option<Address>,
	pub token_out: Option<Address>,
	pub amount_in: Option<AmountInput>,
	#[serde(default)]
	pub paths: Vec<Vec<Address>>,
}

/// Swaps along caller-supplied hop pairs.
#[instrument(skip_all)]
pub async fn mesh_swap(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<MeshSwapRequest>,
) -> Result<Json<MeshSwapResponse>, ApiError> {
	const MESSAGE: &str = "Missing required fields.";
	let token_in = required(req.token_in, MESSAGE)?;
	let token_out = required(req.token_out, MESSAGE)?;
	let amount_in = positive_amount(req.amount_in.as_ref(), MESSAGE)?;
	if req.paths.is_empty() {
		return Err(ApiError::bad_request(MESSAGE));
	}
	let hops = validate_hops(token_in, token_out, &req.paths)?;

	let tx_hash = execute_mesh_swap(&state, token_in, token_out, amount_in, &hops).await?;
	Ok(Json(MeshSwapResponse {
		success: true,
		tx_hash,
		path: None,
		paths: None,
	}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniswapSwapRequest {
	pub token_in: Option<Address>,
	pub token_out: Option<Address>,
	pub amount_in: Option<AmountInput>,
	#[serde(default)]
	pub paths: Vec<Vec<Address>>,
	#[serde(default)]
	pub v3_fees: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniswapSwapResponse {
	pub success: bool,
	#[serde(rename = "type")]
	pub kind: &'static str,
	pub tx_hash: TxHash,
}

/// Swaps through Uniswap: V3 `exactInput` for a single path with fee tiers,
/// otherwise V2 `swapExactTokensForTokens` over the first path.
#[instrument(skip_all)]
pub async fn uniswap_swap(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<UniswapSwapRequest>,
) -> Result<Json<UniswapSwapResponse>, ApiError> {
	const MESSAGE: &str = "tokenIn, amountIn and paths are required";
	let token_in = required(req.token_in, MESSAGE)?;
	let amount_in = positive_amount(req.amount_in.as_ref(), MESSAGE)?;
	let path = required(req.paths.first(), MESSAGE)?.clone();
	if path.len() < 2 {
		return Err(ApiError::bad_request("paths[0] needs at least two tokens"));
	}
	if path.first() != Some(&token_in) {
		return Err(ApiError::bad_request("paths[0] must start with tokenIn"));
	}
	if let Some(token_out) = req.token_out {
		if path.last() != Some(&token_out) {
			return Err(ApiError::bad_request("paths[0] must end with tokenOut"));
		}
	}

	let recipient = state.signer()?;
	let contracts = &state.config.contracts;
	let use_v3 = req.paths.len() == 1 && !req.v3_fees.is_empty();
	let swap_deadline = deadline(current_timestamp(), state.config.mesh.deadline_secs);

	let (kind, router, swap) = if use_v3 {
		let router = require_contract(contracts.uniswap_v3_router, "uniswap_v3_router")?;
		let encoded = encode_v3_path(&path, &req.v3_fees)?;
		let swap = SwapEncoder::v3_exact_input(
			router,
			encoded,
			recipient,
			swap_deadline,
			amount_in,
			U256::ZERO,
		);
		("v3", router, swap)
	} else {
		let router = require_contract(contracts.uniswap_v2_router, "uniswap_v2_router")?;
		let swap = SwapEncoder::v2_swap(router, amount_in, U256::ZERO, path, recipient, swap_deadline);
		("v2", router, swap)
	};

	let approve = SwapEncoder::approve(token_in, router, amount_in, state.config.mesh.approve_gas_limit);
	state.delivery.deliver(approve).await.map_err(swap_failed)?;
	let receipt = state.delivery.deliver(swap).await.map_err(swap_failed)?;

	tracing::info!(kind, tx_hash = %receipt.hash, "Uniswap swap executed");
	Ok(Json(UniswapSwapResponse {
		success: true,
		kind,
		tx_hash: receipt.hash,
	}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapRequest {
	pub token_in: Option<Address>,
	pub token_out: Option<Address>,
	/// Raw base units
	pub amount_in_wei: Option<AmountInput>,
	pub user_address: Option<Address>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapResponse {
	pub message: &'static str,
	pub tx_hash: TxHash,
	pub hops: usize,
}

/// Swaps along the greedy long walk between two tokens.
#[instrument(skip_all)]
pub async fn execute_swap(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<ExecuteSwapRequest>,
) -> Result<Json<ExecuteSwapResponse>, ApiError> {
	const MESSAGE: &str = "Missing required fields";
	let token_in = required(req.token_in, MESSAGE)?;
	let token_out = required(req.token_out, MESSAGE)?;
	let amount_in = required(req.amount_in_wei.as_ref(), MESSAGE)?.to_base_units()?;
	let user = required(req.user_address, MESSAGE)?;

	let path = state
		.router
		.long_walk(&token_in, &token_out, state.config.mesh.long_walk_steps)
		.map_err(|e| match e {
			drt_dex::DexError::NoRouteFound(..) => ApiError::NotFound("No valid 30-hop path found".into()),
			e => e.into(),
		})?;
	let hops = hop_pairs(&path);

	tracing::info!(user = %format_address(&user), hops = hops.len(), "Executing long-walk swap");
	let tx_hash = execute_mesh_swap(&state, token_in, token_out, amount_in, &hops).await?;
	Ok(Json(ExecuteSwapResponse {
		message: "Swap executed",
		tx_hash,
		hops: hops.len(),
	}))
}
