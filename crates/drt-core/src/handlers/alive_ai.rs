//! The AliveAI proto-conscious cycle.
//!
//! One cycle mints an emotional token, swaps it against its pool partner,
//! pushes the sixteen emotional balances into the AliveAI contract, submits a
//! thought and records the resulting `E` value.

use super::{required, ApiJson};
use crate::{ApiError, AppState};
use alloy_primitives::{Address, I256, U256};
use axum::extract::State;
use axum::Json;
use drt_delivery::contracts::{IAliveAI, IEmotionalBase};
use drt_dex::{deadline, SwapEncoder};
use drt_types::{current_timestamp, emotional_symbols, format_address, AliveAiConfig, AmountInput};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Bounded history of the latest `E` values, oldest first.
#[derive(Debug, Clone)]
pub struct ReflectionHistory {
	capacity: usize,
	values: Arc<Mutex<VecDeque<I256>>>,
}

impl ReflectionHistory {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			values: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
		}
	}

	pub async fn push(&self, value: I256) {
		let mut values = self.values.lock().await;
		values.push_back(value);
		while values.len() > self.capacity {
			values.pop_front();
		}
	}

	pub async fn snapshot(&self) -> Vec<I256> {
		self.values.lock().await.iter().copied().collect()
	}
}

fn token(config: &AliveAiConfig, symbol: &str) -> Result<Address, ApiError> {
	config
		.tokens
		.get(symbol)
		.copied()
		.ok_or_else(|| ApiError::bad_request(format!("Unknown emotional token: {}", symbol)))
}

fn signed(value: Option<&AmountInput>, field: &str) -> Result<I256, ApiError> {
	let value = required(value, &format!("{} is required", field))?.to_string();
	I256::from_dec_str(&value)
		.map_err(|_| ApiError::bad_request(format!("{} must be an integer, got {}", field, value)))
}

/// Mints `amount` of the `axis` token through EmotionalBase.
pub async fn mint_emotion(state: &AppState, axis: &str, amount: U256) -> Result<(), ApiError> {
	let alive = state.alive_ai()?;
	let call = IEmotionalBase::mintCall {
		token: token(alive, axis)?,
		amount,
	};
	state
		.delivery
		.execute(alive.emotional_base, &call, U256::ZERO)
		.await?;
	tracing::info!(axis, amount = %amount, "Minted emotional token");
	Ok(())
}

/// Swaps the whole `token_in` balance of `holder` into `token_out` through
/// the pool that pairs them.
pub async fn swap_emotion(
	state: &AppState,
	token_in: &str,
	token_out: &str,
	holder: Address,
) -> Result<(), ApiError> {
	let alive = state.alive_ai()?;
	if !alive.pools.iter().any(|pool| pool.contains(token_in, token_out)) {
		return Err(ApiError::bad_request(format!(
			"No pool found for {}/{}",
			token_in, token_out
		)));
	}
	let from = token(alive, token_in)?;
	let to = token(alive, token_out)?;

	let amount_in = state
		.delivery
		.read(
			alive.emotional_base,
			&IEmotionalBase::balanceOfCall {
				token: from,
				account: holder,
			},
		)
		.await?;

	let swap = SwapEncoder::v2_swap(
		alive.router,
		amount_in,
		U256::ZERO,
		vec![from, to],
		holder,
		deadline(current_timestamp(), alive.swap_deadline_secs),
	);
	state.delivery.deliver(swap).await?;
	tracing::info!(token_in, token_out, amount_in = %amount_in, "Swapped emotional token");
	Ok(())
}

/// Balances of the sixteen emotional tokens held by the AliveAI wallet.
pub async fn emotional_balances(state: &AppState) -> Result<Vec<(String, U256)>, ApiError> {
	let alive = state.alive_ai()?;
	let mut balances = Vec::with_capacity(16);
	for symbol in emotional_symbols() {
		let token = alive.tokens.get(&symbol).copied().ok_or_else(|| {
			ApiError::Unavailable(format!("alive_ai.tokens is missing {}", symbol))
		})?;
		let balance = state
			.delivery
			.read(
				alive.emotional_base,
				&IEmotionalBase::balanceOfCall {
					token,
					account: alive.wallet,
				},
			)
			.await?;
		balances.push((symbol, balance));
	}
	Ok(balances)
}

/// Writes the emotional balances into the AliveAI contract.
pub async fn update_affective_state(state: &AppState) -> Result<Vec<(String, U256)>, ApiError> {
	let alive = state.alive_ai()?;
	let balances = emotional_balances(state).await?;
	let v: Vec<U256> = balances.iter().map(|(_, balance)| *balance).collect();
	let call = IAliveAI::updateAffectiveStateCall {
		v21: v[0],
		v22: v[1],
		v23: v[2],
		v24: v[3],
		v25: v[4],
		v26: v[5],
		v27: v[6],
		v28: v[7],
		v29: v[8],
		v30: v[9],
		v31: v[10],
		v32: v[11],
		v33: v[12],
		v34: v[13],
		v35: v[14],
		v36: v[15],
	};
	state
		.delivery
		.execute(alive.contract, &call, U256::ZERO)
		.await?;
	Ok(balances)
}

/// Submits `(stimulus, cognition)` and reads back the latest `E`.
pub async fn submit_thought(state: &AppState, stimulus: I256, cognition: I256) -> Result<I256, ApiError> {
	let alive = state.alive_ai()?;
	state
		.delivery
		.execute(
			alive.contract,
			&IAliveAI::submitThoughtCall {
				stimulus,
				cognition,
			},
			U256::ZERO,
		)
		.await?;
	let e = state
		.delivery
		.read(alive.contract, &IAliveAI::getLatestECall {})
		.await?;
	Ok(e)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRequest {
	pub stimulus: Option<AmountInput>,
	pub cognition: Option<AmountInput>,
	pub axis: Option<String>,
	/// Raw token units to mint
	pub amount: Option<AmountInput>,
	pub token_swap_out: Option<String>,
	pub from_address: Option<Address>,
}

#[derive(Debug, Serialize)]
pub struct CycleState {
	#[serde(rename = "E")]
	pub e: String,
	#[serde(rename = "last10E")]
	pub last_e: Vec<String>,
	/// Emotional balances of the AliveAI wallet in base units
	pub balances: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CycleResponse {
	pub success: bool,
	pub state: CycleState,
}

/// Runs one full cycle on behalf of `fromAddress`.
#[instrument(skip_all)]
pub async fn run_cycle(
	State(state): State<AppState>,
	ApiJson(req): ApiJson<CycleRequest>,
) -> Result<Json<CycleResponse>, ApiError> {
	let from = required(req.from_address, "fromAddress required")?;
	let axis = required(req.axis, "axis is required")?;
	let token_swap_out = required(req.token_swap_out, "tokenSwapOut is required")?;
	let amount = required(req.amount.as_ref(), "amount is required")?.to_base_units()?;
	let stimulus = signed(req.stimulus.as_ref(), "stimulus")?;
	let cognition = signed(req.cognition.as_ref(), "cognition")?;
	state.signer()?;

	tracing::info!(from = %format_address(&from), axis = %axis, "Running proto-conscious cycle");

	mint_emotion(&state, &axis, amount).await?;
	swap_emotion(&state, &axis, &token_swap_out, from).await?;
	let balances = update_affective_state(&state).await?;
	let e = submit_thought(&state, stimulus, cognition).await?;
	state.reflections.push(e).await;

	tracing::info!(e = %e, "Proto-conscious cycle complete");
	Ok(Json(CycleResponse {
		success: true,
		state: CycleState {
			e: e.to_string(),
			last_e: state
				.reflections
				.snapshot()
				.await
				.iter()
				.map(ToString::to_string)
				.collect(),
			balances: balances
				.into_iter()
				.map(|(symbol, balance)| (symbol, balance.to_string()))
				.collect(),
		},
	}))
}

#[derive(Debug, Serialize)]
pub struct ReflectionsResponse {
	pub reflections: Vec<String>,
}

pub async fn reflections(State(state): State<AppState>) -> Json<ReflectionsResponse> {
	let reflections = state
		.reflections
		.snapshot()
		.await
		.iter()
		.map(ToString::to_string)
		.collect();
	Json(ReflectionsResponse { reflections })
}
