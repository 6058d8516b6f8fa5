//! Mesh routing over the configured pool graph.
//!
//! This module provides:
//! - Shortest multi-hop path search (BFS) with a hop limit
//! - Route lookup that also reports the pool used for every hop
//! - The greedy long walk used for the fixed-length "30-hop" swaps

use crate::graph::{Pool, PoolGraph};
use alloy_primitives::Address;
use drt_types::format_address;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Represents errors that can happen during routing or swap encoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DexError {
	#[error("No route found from {0} to {1}")]
	NoRouteFound(String, String),

	#[error("Token {0} is not part of any pool")]
	UnknownToken(String),

	#[error("Input and output token are the same: {0}")]
	IdenticalTokens(String),

	#[error("Invalid V3 path: {0}")]
	InvalidPath(String),

	#[error("Invalid fee tier: {0}")]
	InvalidFeeTier(u32),
}

/// A token path plus the pool traversed by each hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
	/// Sequence of tokens in the route (includes input and output)
	pub path: Vec<Address>,
	/// Pool address for each hop, `path.len() - 1` entries
	pub pools: Vec<Address>,
}

impl Route {
	pub fn hops(&self) -> usize {
		self.pools.len()
	}
}

/// Router for finding mesh swap paths through the pool graph.
pub struct MeshRouter {
	graph: PoolGraph,
	/// Maximum number of hops allowed in a route
	max_hops: usize,
}

impl MeshRouter {
	pub fn new(graph: PoolGraph, max_hops: usize) -> Self {
		Self { graph, max_hops }
	}

	pub fn from_pools(pools: Vec<Pool>, max_hops: usize) -> Self {
		Self::new(PoolGraph::new(pools), max_hops)
	}

	pub fn graph(&self) -> &PoolGraph {
		&self.graph
	}

	pub fn max_hops(&self) -> usize {
		self.max_hops
	}

	/// Finds the shortest route from `token_in` to `token_out`.
	///
	/// Uses BFS bounded by `max_hops`. Tokens already expanded are not queued
	/// again, so the first route that reaches `token_out` has the fewest hops.
	pub fn find_route(&self, token_in: &Address, token_out: &Address) -> Result<Route, DexError> {
		self.find_route_within(token_in, token_out, self.max_hops)
	}

	/// Same as [`find_route`](Self::find_route) with an explicit hop limit.
	pub fn find_route_within(
		&self,
		token_in: &Address,
		token_out: &Address,
		max_hops: usize,
	) -> Result<Route, DexError> {
		if token_in == token_out {
			return Err(DexError::IdenticalTokens(format_address(token_in)));
		}

		tracing::debug!(
			token_in = %format_address(token_in),
			token_out = %format_address(token_out),
			max_hops,
			pools_available = self.graph.pools().len(),
			"Finding mesh route"
		);

		// token -> (previous token, pool used to reach it)
		let mut came_from: HashMap<Address, (Address, Address)> = HashMap::new();
		let mut visited = HashSet::from([*token_in]);
		let mut queue = VecDeque::from([(*token_in, 0usize)]);

		while let Some((current, depth)) = queue.pop_front() {
			if current == *token_out {
				let route = self.rebuild(token_in, token_out, &came_from);
				tracing::debug!(hops = route.hops(), "Found mesh route");
				return Ok(route);
			}

			// Don't exceed max hops
			if depth >= max_hops {
				continue;
			}

			for (next, pool) in self.graph.neighbours(&current) {
				if visited.insert(*next) {
					came_from.insert(*next, (current, *pool));
					queue.push_back((*next, depth + 1));
				}
			}
		}

		tracing::debug!(
			token_in = %format_address(token_in),
			token_out = %format_address(token_out),
			"No mesh route between tokens"
		);

		Err(DexError::NoRouteFound(
			format_address(token_in),
			format_address(token_out),
		))
	}

	/// Token path only, as used by the hop-pair mesh route.
	pub fn find_path(&self, token_in: &Address, token_out: &Address) -> Result<Vec<Address>, DexError> {
		self.find_route(token_in, token_out).map(|route| route.path)
	}

	fn rebuild(
		&self,
		token_in: &Address,
		token_out: &Address,
		came_from: &HashMap<Address, (Address, Address)>,
	) -> Route {
		let mut path = vec![*token_out];
		let mut pools = Vec::new();
		let mut current = *token_out;
		while current != *token_in {
			// Every token except the start was reached through an edge.
			let Some((previous, pool)) = came_from.get(&current) else {
				break;
			};
			path.push(*previous);
			pools.push(*pool);
			current = *previous;
		}
		path.reverse();
		pools.reverse();
		Route { path, pools }
	}

	/// Greedy fixed-length walk through unique tokens.
	///
	/// Starting at `token_in`, repeatedly follows the first listed pool that
	/// leads to an unvisited token, for at most `max_steps` steps, stopping as
	/// soon as `token_out` is reached. If the walk ends next to `token_out`, the
	/// final hop is appended. Walks that cannot reach `token_out` fail instead of
	/// producing a disconnected path.
	pub fn long_walk(
		&self,
		token_in: &Address,
		token_out: &Address,
		max_steps: usize,
	) -> Result<Vec<Address>, DexError> {
		for token in [token_in, token_out] {
			if !self.graph.contains_token(token) {
				return Err(DexError::UnknownToken(format_address(token)));
			}
		}
		if token_in == token_out {
			return Err(DexError::IdenticalTokens(format_address(token_in)));
		}

		let mut path = vec![*token_in];
		let mut visited = HashSet::from([*token_in]);
		let mut current = *token_in;

		for _ in 0..max_steps {
			let next = self
				.graph
				.neighbours(&current)
				.iter()
				.map(|(token, _)| *token)
				.find(|token| !visited.contains(token));

			let Some(next) = next else {
				break;
			};
			path.push(next);
			visited.insert(next);
			current = next;
			if current == *token_out {
				break;
			}
		}

		if current != *token_out {
			let adjacent = self
				.graph
				.neighbours(&current)
				.iter()
				.any(|(token, _)| token == token_out);
			if !adjacent {
				return Err(DexError::NoRouteFound(
					format_address(token_in),
					format_address(token_out),
				));
			}
			path.push(*token_out);
		}

		tracing::debug!(
			steps = path.len() - 1,
			token_in = %format_address(token_in),
			token_out = %format_address(token_out),
			"Built long walk path"
		);

		Ok(path)
	}
}
