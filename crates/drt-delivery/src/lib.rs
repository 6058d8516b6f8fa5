//! Transaction delivery and chain access for the DRT backend.
//!
//! Handlers never talk to an RPC node directly. They go through the
//! [`DeliveryInterface`] trait, wrapped by [`DeliveryService`], which adds
//! confirmation handling and typed contract reads on top of the raw calls.

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use drt_types::{
	format_address, LogEntry, LogFilter, Transaction, TransactionReceipt, TransactionSummary,
};
use std::sync::Arc;
use thiserror::Error;

pub mod contracts;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use implementations::evm::alloy::AlloyDelivery;

/// Errors that can occur during chain access and transaction delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a transaction is mined but reverts.
	#[error("Transaction reverted: {0}")]
	Reverted(String),
	/// Error that occurs when a read call returns data that cannot be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
	/// Error that occurs when waiting for a receipt takes too long.
	#[error("Timed out waiting for transaction {0}")]
	Timeout(String),
	/// Error that occurs when a write is attempted without a configured key.
	#[error("No signer configured; set network.private_key to send transactions")]
	NoSigner,
}

/// Trait defining the interface for chain access.
///
/// One implementation talks to a JSON-RPC node through alloy; the test mock
/// answers from in-memory tables.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Address transactions are sent from, if a signer is configured.
	fn signer_address(&self) -> Option<Address>;

	fn chain_id(&self) -> u64;

	/// Signs and broadcasts a transaction, returning its hash.
	async fn submit(&self, tx: Transaction) -> Result<TxHash, DeliveryError>;

	/// Waits until the transaction is mined with the given number of confirmations.
	async fn wait_for_confirmation(
		&self,
		hash: TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Executes a read-only `eth_call` and returns the raw return data.
	async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError>;

	async fn estimate_gas(&self, tx: Transaction) -> Result<u64, DeliveryError>;

	/// Native ETH balance in wei.
	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError>;

	async fn get_block_number(&self) -> Result<u64, DeliveryError>;

	/// Unix timestamp of the given block.
	async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, DeliveryError>;

	async fn get_logs(&self, filter: LogFilter) -> Result<Vec<LogEntry>, DeliveryError>;

	/// Transactions included in the given block.
	async fn get_block_transactions(
		&self,
		block_number: u64,
	) -> Result<Vec<TransactionSummary>, DeliveryError>;
}

/// Service that wraps a delivery implementation with confirmation handling
/// and typed contract access.
pub struct DeliveryService {
	/// The underlying chain access implementation
	delivery: Arc<dyn DeliveryInterface>,
	/// Number of confirmations required before a write is reported as done
	confirmations: u64,
}

impl DeliveryService {
	pub fn new(delivery: Arc<dyn DeliveryInterface>, confirmations: u64) -> Self {
		Self {
			delivery,
			confirmations: confirmations.max(1),
		}
	}

	/// Direct access to the underlying implementation.
	pub fn chain(&self) -> &Arc<dyn DeliveryInterface> {
		&self.delivery
	}

	pub fn signer_address(&self) -> Option<Address> {
		self.delivery.signer_address()
	}

	/// Submits a transaction and waits for it to be confirmed.
	///
	/// A receipt with a failed status is turned into [`DeliveryError::Reverted`].
	pub async fn deliver(&self, tx: Transaction) -> Result<TransactionReceipt, DeliveryError> {
		let to = tx.to;
		let hash = self.delivery.submit(tx).await?;
		tracing::info!(
			tx_hash = %hash,
			to = %format_address(&to),
			"Submitted transaction"
		);

		let receipt = self
			.delivery
			.wait_for_confirmation(hash, self.confirmations)
			.await?;

		if !receipt.success {
			tracing::warn!(tx_hash = %hash, "Transaction reverted");
			return Err(DeliveryError::Reverted(hash.to_string()));
		}

		tracing::info!(
			tx_hash = %hash,
			block_number = ?receipt.block_number,
			gas_used = receipt.gas_used,
			"Transaction confirmed"
		);
		Ok(receipt)
	}

	/// Encodes `call`, sends it to `to` with `value` attached and waits for it.
	pub async fn execute<C: SolCall>(
		&self,
		to: Address,
		call: &C,
		value: U256,
	) -> Result<TransactionReceipt, DeliveryError> {
		let tx = Transaction::call(to, call.abi_encode()).with_value(value);
		tracing::debug!(
			to = %format_address(&to),
			method = C::SIGNATURE,
			"Executing contract call"
		);
		self.deliver(tx).await
	}

	/// Performs an `eth_call` and decodes the typed return value.
	pub async fn read<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return, DeliveryError> {
		let data = self
			.delivery
			.call(Transaction::call(to, call.abi_encode()))
			.await?;
		C::abi_decode_returns(&data)
			.map_err(|e| DeliveryError::Decode(format!("{}: {}", C::SIGNATURE, e)))
	}

	/// ERC-20 `balanceOf(owner)` on `token`.
	pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, DeliveryError> {
		self.read(token, &contracts::IERC20::balanceOfCall { account: owner })
			.await
	}

	pub async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.delivery.get_balance(address).await
	}

	pub async fn estimate_gas(&self, tx: Transaction) -> Result<u64, DeliveryError> {
		self.delivery.estimate_gas(tx).await
	}

	pub async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.delivery.get_block_number().await
	}

	pub async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, DeliveryError> {
		self.delivery.get_block_timestamp(block_number).await
	}

	/// Logs of one event on one contract over the last `lookback` blocks.
	pub async fn recent_logs(
		&self,
		address: Address,
		event_signature: B256,
		lookback: u64,
	) -> Result<Vec<LogEntry>, DeliveryError> {
		let latest = self.delivery.get_block_number().await?;
		self.delivery
			.get_logs(LogFilter {
				address,
				event_signature,
				from_block: latest.saturating_sub(lookback),
				to_block: latest,
			})
			.await
	}
}
