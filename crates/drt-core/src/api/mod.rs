//! HTTP routes of the backend.

use crate::handlers::{alive_ai, market, mesh, resource, token, trade};
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the application router with every route mounted.
pub fn router(state: AppState) -> Router {
	let upload_limit = state.config.resource.max_upload_bytes;

	Router::new()
		.route("/", get(token::index))
		.route("/health", get(token::health))
		.route("/api/mint", post(token::mint))
		.route("/api/balances/:address", get(token::balances))
		.route("/api/dmos/mint", post(token::dmos_mint))
		.route("/api/dmos/credit-rebate", post(token::credit_rebate))
		.route("/api/dmos/claim", post(token::claim_rebate))
		.route("/api/trade/buyDRTv1", post(trade::buy_drt_v1))
		.route("/api/trade/sellDRTv1", post(trade::sell_drt_v1))
		.route("/api/drtrade", post(trade::liquidity_check))
		.route("/api/drtrade/execute", post(trade::execute_trade))
		.route("/api/liquidity", get(trade::liquidity))
		.route("/api/swap/swapDRTforETH", post(trade::swap_drt_for_eth))
		.route("/api/swap/swapETHforDRT", post(trade::swap_eth_for_drt))
		.route("/mesh-route", get(mesh::mesh_route))
		.route("/api/meshRoute", post(mesh::mesh_route_swap))
		.route("/api/meshSwap", post(mesh::mesh_swap))
		.route("/api/uniswapSwap", post(mesh::uniswap_swap))
		.route("/api/execute-swap", post(mesh::execute_swap))
		.route("/api/aliveai/runCycle", post(alive_ai::run_cycle))
		.route("/api/aliveai/reflections", get(alive_ai::reflections))
		.route(
			"/api/verify",
			post(resource::verify).layer(DefaultBodyLimit::max(upload_limit)),
		)
		.route("/api/transactions", get(market::transactions))
		.route("/api/prices", get(market::prices))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state)
}
