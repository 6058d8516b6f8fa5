//! Swap calldata for the universal mesh router and the Uniswap routers.
//!
//! This module provides transaction builders for:
//! - ERC20 approvals to a router
//! - `multiHopSwap` on the DRT universal router (hop-pair paths)
//! - Uniswap V2 `swapExactTokensForTokens`
//! - Uniswap V3 `exactInput` with a packed path

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use drt_types::{format_address, Transaction};

sol! {
	/// ERC20 interface for token approvals
	interface IERC20Approve {
		function approve(address spender, uint256 amount) external returns (bool);
	}

	/// DRT universal router that walks a list of hop pairs.
	interface IDRTUniversalRouter {
		function multiHopSwap(
			address tokenIn,
			address tokenOut,
			uint256 amountIn,
			address[][] paths,
			uint256 deadline
		) external returns (uint256 amountOut);
	}

	interface IUniswapV2Router02 {
		function swapExactTokensForTokens(
			uint256 amountIn,
			uint256 amountOutMin,
			address[] path,
			address to,
			uint256 deadline
		) external returns (uint256[] amounts);
	}

	/// Parameters for a V3 multi-hop exact-input swap
	#[derive(Debug)]
	struct ExactInputParams {
		bytes path;
		address recipient;
		uint256 deadline;
		uint256 amountIn;
		uint256 amountOutMinimum;
	}

	interface ISwapRouterV3 {
		function exactInput(ExactInputParams calldata params) external payable returns (uint256 amountOut);
	}
}

/// Gas limit used for a V2 router swap.
pub const V2_SWAP_GAS_LIMIT: u64 = 300_000;
/// Gas limit used for a V3 router swap.
pub const V3_SWAP_GAS_LIMIT: u64 = 500_000;

/// Builds unsigned swap transactions.
pub struct SwapEncoder;

impl SwapEncoder {
	/// Generates approve calldata for a specific spender.
	pub fn approve(token: Address, spender: Address, amount: U256, gas_limit: u64) -> Transaction {
		let call = IERC20Approve::approveCall { spender, amount };

		tracing::debug!(
			token = %format_address(&token),
			spender = %format_address(&spender),
			amount = %amount,
			"Encoded approve for spender"
		);

		Transaction::call(token, call.abi_encode()).with_gas_limit(gas_limit)
	}

	/// Encodes `multiHopSwap` with hop pairs `[[A, B], [B, C], ...]`.
	pub fn multi_hop_swap(
		router: Address,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
		hops: &[[Address; 2]],
		deadline: U256,
	) -> Transaction {
		let call = IDRTUniversalRouter::multiHopSwapCall {
			tokenIn: token_in,
			tokenOut: token_out,
			amountIn: amount_in,
			paths: hops.iter().map(|pair| pair.to_vec()).collect(),
			deadline,
		};

		tracing::info!(
			token_in = %format_address(&token_in),
			token_out = %format_address(&token_out),
			amount_in = %amount_in,
			hops = hops.len(),
			"Encoded multi-hop swap"
		);

		Transaction::call(router, call.abi_encode())
	}

	pub fn v2_swap(
		router: Address,
		amount_in: U256,
		amount_out_min: U256,
		path: Vec<Address>,
		recipient: Address,
		deadline: U256,
	) -> Transaction {
		let call = IUniswapV2Router02::swapExactTokensForTokensCall {
			amountIn: amount_in,
			amountOutMin: amount_out_min,
			path,
			to: recipient,
			deadline,
		};
		Transaction::call(router, call.abi_encode()).with_gas_limit(V2_SWAP_GAS_LIMIT)
	}

	pub fn v3_exact_input(
		router: Address,
		path: Bytes,
		recipient: Address,
		deadline: U256,
		amount_in: U256,
		amount_out_min: U256,
	) -> Transaction {
		let call = ISwapRouterV3::exactInputCall {
			params: ExactInputParams {
				path,
				recipient,
				deadline,
				amountIn: amount_in,
				amountOutMinimum: amount_out_min,
			},
		};
		Transaction::call(router, call.abi_encode()).with_gas_limit(V3_SWAP_GAS_LIMIT)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use drt_types::utils::tests::builders::addr;

	#[test]
	fn test_approve_encoding() {
		let tx = SwapEncoder::approve(addr(1), addr(2), U256::from(1_000u64), 100_000);
		assert_eq!(tx.to, addr(1));
		assert_eq!(tx.gas_limit, Some(100_000));
		assert_eq!(tx.selector(), Some(IERC20Approve::approveCall::SELECTOR));
		let decoded = IERC20Approve::approveCall::abi_decode(&tx.data).unwrap();
		assert_eq!(decoded.spender, addr(2));
		assert_eq!(decoded.amount, U256::from(1_000u64));
	}

	#[test]
	fn test_multi_hop_swap_carries_hop_pairs() {
		let hops = [[addr(1), addr(2)], [addr(2), addr(3)]];
		let tx = SwapEncoder::multi_hop_swap(
			addr(9),
			addr(1),
			addr(3),
			U256::from(5u64),
			&hops,
			U256::from(1_600u64),
		);
		assert_eq!(tx.to, addr(9));
		let decoded = IDRTUniversalRouter::multiHopSwapCall::abi_decode(&tx.data).unwrap();
		assert_eq!(decoded.paths, vec![vec![addr(1), addr(2)], vec![addr(2), addr(3)]]);
		assert_eq!(decoded.deadline, U256::from(1_600u64));
	}

	#[test]
	fn test_v2_and_v3_selectors_differ() {
		let v2 = SwapEncoder::v2_swap(
			addr(7),
			U256::from(1u64),
			U256::ZERO,
			vec![addr(1), addr(2)],
			addr(3),
			U256::from(10u64),
		);
		let v3 = SwapEncoder::v3_exact_input(
			addr(8),
			Bytes::from(vec![0u8; 43]),
			addr(3),
			U256::from(10u64),
			U256::from(1u64),
			U256::ZERO,
		);
		assert_eq!(v2.gas_limit, Some(V2_SWAP_GAS_LIMIT));
		assert_eq!(v3.gas_limit, Some(V3_SWAP_GAS_LIMIT));
		assert_ne!(v2.selector(), v3.selector());
		let decoded = ISwapRouterV3::exactInputCall::abi_decode(&v3.data).unwrap();
		assert_eq!(decoded.params.recipient, addr(3));
	}
}
