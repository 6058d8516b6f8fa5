//! Undirected token graph built from the configured pool list.

use alloy_primitives::Address;
use drt_types::PoolConfig;
use std::collections::HashMap;

/// A two-token liquidity pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
	pub address: Address,
	pub token_a: Address,
	pub token_b: Address,
	pub fee: Option<u32>,
}

impl From<&PoolConfig> for Pool {
	fn from(config: &PoolConfig) -> Self {
		Self {
			address: config.address,
			token_a: config.token_a,
			token_b: config.token_b,
			fee: config.fee,
		}
	}
}

/// Adjacency view over a pool list.
///
/// Neighbours of a token keep the order in which their pools were listed,
/// which is what the greedy walk relies on.
#[derive(Debug, Clone, Default)]
pub struct PoolGraph {
	pools: Vec<Pool>,
	// token -> [(neighbour, pool address)]
	edges: HashMap<Address, Vec<(Address, Address)>>,
}

impl PoolGraph {
	pub fn new(pools: Vec<Pool>) -> Self {
		let mut edges: HashMap<Address, Vec<(Address, Address)>> = HashMap::new();
		for pool in &pools {
			edges
				.entry(pool.token_a)
				.or_default()
				.push((pool.token_b, pool.address));
			edges
				.entry(pool.token_b)
				.or_default()
				.push((pool.token_a, pool.address));
		}
		Self { pools, edges }
	}

	pub fn from_config(pools: &[PoolConfig]) -> Self {
		Self::new(pools.iter().map(Pool::from).collect())
	}

	pub fn pools(&self) -> &[Pool] {
		&self.pools
	}

	pub fn contains_token(&self, token: &Address) -> bool {
		self.edges.contains_key(token)
	}

	/// Neighbouring tokens with the pool connecting them.
	pub fn neighbours(&self, token: &Address) -> &[(Address, Address)] {
		self.edges.get(token).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn token_count(&self) -> usize {
		self.edges.len()
	}
}
