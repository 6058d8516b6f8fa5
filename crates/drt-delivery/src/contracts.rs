//! Solidity bindings for the contracts the backend talks to.
//!
//! Only the functions and events that are actually called are declared.
//! The router interfaces live next to the calldata builders in `drt-dex`
//! and are re-exported here.

use alloy_sol_types::sol;

pub use drt_dex::swap::{IDRTUniversalRouter, ISwapRouterV3, IUniswapV2Router02};

sol! {
	#[derive(Debug)]
	interface IERC20 {
		event Transfer(address indexed from, address indexed to, uint256 value);

		function balanceOf(address account) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
	}

	/// DRTv1 token with an owner-gated mint.
	interface IDRTToken {
		function mint(address to, uint256 amount) external;
	}

	interface IDRTVault {
		function buyDRTv1() external payable;
		function sellDRTv1(uint256 amount) external;
	}

	/// DRTrade pool wrapper with an on-chain liquidity check.
	interface IDRTrade {
		function checkLiquidity(bool isBuy, uint256 amount) external view returns (bool);
		function swapExactDRTv1ForWETH(uint256 amountIn) external returns (uint256);
		function swapExactWETHForDRTv1(uint256 amountIn) external returns (uint256);
	}

	interface IDRTSwapRouter {
		function swapDRTforETH(bool fromV2, uint256 amountIn, uint256 amountOutMin) external;
		function swapETHforDRT(bool toV2, uint256 amountOutMin) external payable;
	}

	interface IDigitize {
		function mint(address to, uint256 amount) external;
	}

	interface IRebateVault {
		function creditRebate(address collector, uint256 amount) external;
		function claimRebate() external;
	}

	/// AliveAI affective state contract.
	interface IAliveAI {
		function updateAffectiveState(
			uint256 v21, uint256 v22, uint256 v23, uint256 v24,
			uint256 v25, uint256 v26, uint256 v27, uint256 v28,
			uint256 v29, uint256 v30, uint256 v31, uint256 v32,
			uint256 v33, uint256 v34, uint256 v35, uint256 v36
		) external;
		function submitThought(int256 stimulus, int256 cognition) external;
		function getLatestE() external view returns (int256);
	}

	/// Multi-token ledger for the emotional tokens.
	interface IEmotionalBase {
		function mint(address token, uint256 amount) external;
		function balanceOf(address token, address account) external view returns (uint256);
	}

	#[derive(Debug)]
	interface IAutoStation {
		event Broadcast(string channel, address indexed user, string message);

		function postMessage(string channel, string message) external;
	}

	interface IAIConsciousness {
		function reflect(string thought) external;
	}

	#[derive(Debug)]
	interface IAutoTweet {
		event Tweet(string message);
	}
}
