//! DEX utilities for mesh routing and swap transaction construction.
//!
//! This crate provides the pool graph built from configuration, the
//! breadth-first mesh router with its hop-pair and greedy long-walk variants,
//! Uniswap V3 packed-path encoding, and calldata builders for the universal
//! router and the Uniswap V2/V3 routers.

pub mod graph;
pub mod path;
pub mod router;
pub mod swap;

pub use graph::{Pool, PoolGraph};
pub use path::{deadline, encode_v3_path, hop_pairs};
pub use router::{DexError, MeshRouter, Route};
pub use swap::SwapEncoder;
