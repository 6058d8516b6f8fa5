//! JSON-RPC delivery through an alloy HTTP provider.
//!
//! The provider is built once at startup. When a private key is configured
//! it is wrapped with an [`EthereumWallet`] so `submit` signs locally and
//! the fillers take care of nonce, gas and chain id. Without a key the
//! delivery is read-only and every write fails with
//! [`DeliveryError::NoSigner`].

use crate::{DeliveryError, DeliveryInterface};
use alloy_consensus::Transaction as _;
use alloy_network::{EthereumWallet, TransactionResponse as _};
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, Filter, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use drt_types::{
	LogEntry, LogFilter, NetworkConfig, Transaction, TransactionReceipt, TransactionSummary,
};
use tokio::time::{sleep, Duration, Instant};

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Upper bound on how long a write may take to be confirmed.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Alloy-backed chain access.
pub struct AlloyDelivery {
	provider: DynProvider,
	/// Address of the configured signer, `None` in read-only mode
	signer: Option<Address>,
	chain_id: u64,
}

impl AlloyDelivery {
	/// Builds the provider from the network section of the configuration.
	pub fn from_config(network: &NetworkConfig) -> Result<Self, DeliveryError> {
		let url = network
			.rpc_url
			.parse::<reqwest::Url>()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL: {}", e)))?;

		let key = network
			.private_key
			.as_ref()
			.filter(|key| !key.is_empty());

		let (provider, signer) = match key {
			Some(key) => {
				let signer = key
					.expose_secret()
					.parse::<PrivateKeySigner>()
					.map_err(|e| DeliveryError::Network(format!("Invalid private key: {}", e)))?;
				let address = signer.address();
				let wallet = EthereumWallet::from(signer);
				let provider = ProviderBuilder::new()
					.wallet(wallet)
					.connect_http(url)
					.erased();
				(provider, Some(address))
			},
			None => {
				tracing::warn!("No private key configured; chain access is read-only");
				(ProviderBuilder::new().connect_http(url).erased(), None)
			},
		};

		tracing::info!(
			chain_id = network.chain_id,
			signer = ?signer,
			"Initialized alloy delivery"
		);

		Ok(Self {
			provider,
			signer,
			chain_id: network.chain_id,
		})
	}

	fn request(&self, tx: &Transaction) -> TransactionRequest {
		let mut request = TransactionRequest::default()
			.to(tx.to)
			.input(tx.data.clone().into())
			.value(tx.value);
		if let Some(from) = self.signer {
			request = request.from(from);
		}
		if let Some(gas_limit) = tx.gas_limit {
			request = request.gas_limit(gas_limit);
		}
		request
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn signer_address(&self) -> Option<Address> {
		self.signer
	}

	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn submit(&self, tx: Transaction) -> Result<TxHash, DeliveryError> {
		if self.signer.is_none() {
			return Err(DeliveryError::NoSigner);
		}

		let pending = self
			.provider
			.send_transaction(self.request(&tx))
			.await
			.map_err(|e| {
				tracing::error!(error = %e, "Transaction submission failed");
				DeliveryError::Network(format!("Failed to send transaction: {}", e))
			})?;

		Ok(*pending.tx_hash())
	}

	async fn wait_for_confirmation(
		&self,
		hash: TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let started = Instant::now();

		loop {
			let receipt = self
				.provider
				.get_transaction_receipt(hash)
				.await
				.map_err(|e| DeliveryError::Network(format!("Failed to fetch receipt: {}", e)))?;

			if let Some(receipt) = receipt {
				let mined_in = receipt.block_number;
				let current = self.get_block_number().await?;
				let confirmed = match mined_in {
					Some(block) => current.saturating_sub(block) + 1 >= confirmations,
					None => false,
				};

				if confirmed {
					return Ok(TransactionReceipt {
						hash: receipt.transaction_hash,
						block_number: mined_in,
						gas_used: receipt.gas_used,
						success: receipt.status(),
					});
				}
			}

			if started.elapsed() >= RECEIPT_TIMEOUT {
				return Err(DeliveryError::Timeout(hash.to_string()));
			}

			tracing::debug!(tx_hash = %hash, confirmations, "Waiting for confirmation");
			sleep(RECEIPT_POLL_INTERVAL).await;
		}
	}

	async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError> {
		self.provider
			.call(self.request(&tx))
			.await
			.map_err(|e| DeliveryError::Network(format!("eth_call failed: {}", e)))
	}

	async fn estimate_gas(&self, tx: Transaction) -> Result<u64, DeliveryError> {
		self.provider
			.estimate_gas(self.request(&tx))
			.await
			.map_err(|e| DeliveryError::Network(format!("Gas estimation failed: {}", e)))
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to fetch balance: {}", e)))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to fetch block number: {}", e)))
	}

	async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, DeliveryError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Number(block_number))
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to fetch block: {}", e)))?
			.ok_or_else(|| DeliveryError::Network(format!("Block {} not found", block_number)))?;

		Ok(block.header.timestamp)
	}

	async fn get_logs(&self, filter: LogFilter) -> Result<Vec<LogEntry>, DeliveryError> {
		let query = Filter::new()
			.address(filter.address)
			.event_signature(filter.event_signature)
			.from_block(filter.from_block)
			.to_block(filter.to_block);

		let logs = self
			.provider
			.get_logs(&query)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to fetch logs: {}", e)))?;

		Ok(logs
			.into_iter()
			.map(|log| LogEntry {
				address: log.inner.address,
				topics: log.inner.data.topics().to_vec(),
				data: log.inner.data.data.clone(),
				block_number: log.block_number,
				transaction_hash: log.transaction_hash,
				log_index: log.log_index,
			})
			.collect())
	}

	async fn get_block_transactions(
		&self,
		block_number: u64,
	) -> Result<Vec<TransactionSummary>, DeliveryError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Number(block_number))
			.full()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to fetch block: {}", e)))?
			.ok_or_else(|| DeliveryError::Network(format!("Block {} not found", block_number)))?;

		Ok(block
			.transactions
			.txns()
			.map(|tx| TransactionSummary {
				hash: tx.tx_hash(),
				from: tx.from(),
				to: tx.to(),
				value: tx.value(),
				block_number,
			})
			.collect())
	}
}
