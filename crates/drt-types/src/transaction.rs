//! Chain-agnostic transaction and log types.
//!
//! These are the values that cross the delivery boundary. They carry only what
//! the handlers need, so the delivery implementation is free to use whichever
//! RPC representation it likes internally.

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use serde::{Deserialize, Serialize};

/// A contract call or value transfer to be signed by the backend wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	/// Explicit gas limit. `None` lets the provider estimate.
	pub gas_limit: Option<u64>,
}

impl Transaction {
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to,
			data: data.into(),
			value: U256::ZERO,
			gas_limit: None,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}

	/// The 4-byte function selector, if the calldata carries one.
	pub fn selector(&self) -> Option<[u8; 4]> {
		self.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
	}
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	pub hash: TxHash,
	pub block_number: Option<u64>,
	pub gas_used: u64,
	pub success: bool,
}

/// Log query for a single contract and event signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
	pub address: Address,
	pub event_signature: B256,
	pub from_block: u64,
	pub to_block: u64,
}

/// A raw event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	pub block_number: Option<u64>,
	pub transaction_hash: Option<TxHash>,
	pub log_index: Option<u64>,
}

/// The fields of a mined transaction the monitors care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
	pub hash: TxHash,
	pub from: Address,
	pub to: Option<Address>,
	pub value: U256,
	pub block_number: u64,
}
