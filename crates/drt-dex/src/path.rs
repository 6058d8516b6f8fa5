//! Path helpers shared by the mesh and Uniswap swap flows.

use crate::router::DexError;
use alloy_primitives::{Address, Bytes, U256};
use drt_types::config::MAX_FEE_TIER;

/// Wraps a token path `[A, B, C]` into hop pairs `[[A, B], [B, C]]`.
pub fn hop_pairs(path: &[Address]) -> Vec<[Address; 2]> {
	path.windows(2).map(|pair| [pair[0], pair[1]]).collect()
}

/// Encodes a Uniswap V3 packed path: `token0 ‖ fee0 ‖ token1 ‖ … ‖ tokenN`.
///
/// Each fee is written as 3 big-endian bytes.
pub fn encode_v3_path(tokens: &[Address], fees: &[u32]) -> Result<Bytes, DexError> {
	if tokens.len() < 2 {
		return Err(DexError::InvalidPath("at least two tokens are required".into()));
	}
	if tokens.len() != fees.len() + 1 {
		return Err(DexError::InvalidPath(format!(
			"{} tokens need {} fee tiers, got {}",
			tokens.len(),
			tokens.len() - 1,
			fees.len()
		)));
	}

	let mut encoded = Vec::with_capacity(tokens.len() * 20 + fees.len() * 3);
	for (token, fee) in tokens.iter().zip(fees) {
		if *fee > MAX_FEE_TIER {
			return Err(DexError::InvalidFeeTier(*fee));
		}
		encoded.extend_from_slice(token.as_slice());
		encoded.extend_from_slice(&fee.to_be_bytes()[1..]);
	}
	if let Some(last) = tokens.last() {
		encoded.extend_from_slice(last.as_slice());
	}

	Ok(Bytes::from(encoded))
}

/// Swap deadline `secs` after `now`, as a uint256.
pub fn deadline(now: u64, secs: u64) -> U256 {
	U256::from(now.saturating_add(secs))
}
