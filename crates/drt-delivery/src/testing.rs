//! In-memory delivery for tests (enable the `testing` feature).

use crate::{DeliveryError, DeliveryInterface};
use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use async_trait::async_trait;
use drt_types::{LogEntry, LogFilter, Transaction, TransactionReceipt, TransactionSummary};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default signer used by the mock: `0x00..0a11ce`.
pub const MOCK_SIGNER: Address = Address::new([
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0a, 0x11, 0xce,
]);

/// Delivery double that records submitted transactions and answers reads
/// from tables keyed by 4-byte selector.
pub struct MockDelivery {
	signer: Option<Address>,
	chain_id: u64,
	block_number: u64,
	gas_estimate: u64,
	reverting: bool,
	submitted: Mutex<Vec<Transaction>>,
	/// Responses for a selector on a specific contract
	targeted: HashMap<(Address, [u8; 4]), Bytes>,
	/// Responses for a selector on any contract
	calls: HashMap<[u8; 4], Bytes>,
	balances: HashMap<Address, U256>,
	timestamps: HashMap<u64, u64>,
	logs: Vec<LogEntry>,
	block_transactions: HashMap<u64, Vec<TransactionSummary>>,
	log_filters: Mutex<Vec<LogFilter>>,
}

impl Default for MockDelivery {
	fn default() -> Self {
		Self::new()
	}
}

impl MockDelivery {
	pub fn new() -> Self {
		Self {
			signer: Some(MOCK_SIGNER),
			chain_id: 1,
			block_number: 100,
			gas_estimate: 210_000,
			reverting: false,
			submitted: Mutex::new(Vec::new()),
			targeted: HashMap::new(),
			calls: HashMap::new(),
			balances: HashMap::new(),
			timestamps: HashMap::new(),
			logs: Vec::new(),
			block_transactions: HashMap::new(),
			log_filters: Mutex::new(Vec::new()),
		}
	}

	/// Drops the signer so every write fails with [`DeliveryError::NoSigner`].
	pub fn read_only(mut self) -> Self {
		self.signer = None;
		self
	}

	/// Every confirmed transaction reports a failed status.
	pub fn reverting(mut self) -> Self {
		self.reverting = true;
		self
	}

	pub fn with_block_number(mut self, block_number: u64) -> Self {
		self.block_number = block_number;
		self
	}

	pub fn with_gas_estimate(mut self, gas: u64) -> Self {
		self.gas_estimate = gas;
		self
	}

	pub fn with_call_response(mut self, selector: [u8; 4], data: impl Into<Bytes>) -> Self {
		self.calls.insert(selector, data.into());
		self
	}

	pub fn with_call_response_for(
		mut self,
		to: Address,
		selector: [u8; 4],
		data: impl Into<Bytes>,
	) -> Self {
		self.targeted.insert((to, selector), data.into());
		self
	}

	pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
		self.balances.insert(address, balance);
		self
	}

	pub fn with_block_timestamp(mut self, block_number: u64, timestamp: u64) -> Self {
		self.timestamps.insert(block_number, timestamp);
		self
	}

	pub fn with_log(mut self, log: LogEntry) -> Self {
		self.logs.push(log);
		self
	}

	pub fn with_block_transactions(mut self, block_number: u64, txs: Vec<TransactionSummary>) -> Self {
		self.block_transactions.insert(block_number, txs);
		self
	}

	/// Transactions submitted so far, in order.
	pub fn submitted(&self) -> Vec<Transaction> {
		self.submitted.lock().map(|txs| txs.clone()).unwrap_or_default()
	}

	pub fn last_log_filter(&self) -> Option<LogFilter> {
		self.log_filters
			.lock()
			.ok()
			.and_then(|filters| filters.last().cloned())
	}
}

#[async_trait]
impl DeliveryInterface for MockDelivery {
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
		let mut submitted = self
			.submitted
			.lock()
			.map_err(|e| DeliveryError::Network(e.to_string()))?;
		submitted.push(tx);
		Ok(B256::left_padding_from(&(submitted.len() as u64).to_be_bytes()))
	}

	async fn wait_for_confirmation(
		&self,
		hash: TxHash,
		_confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		Ok(TransactionReceipt {
			hash,
			block_number: Some(self.block_number),
			gas_used: 21_000,
			success: !self.reverting,
		})
	}

	async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError> {
		let Some(selector) = tx.selector() else {
			return Ok(Bytes::new());
		};
		Ok(self
			.targeted
			.get(&(tx.to, selector))
			.or_else(|| self.calls.get(&selector))
			.cloned()
			.unwrap_or_default())
	}

	async fn estimate_gas(&self, _tx: Transaction) -> Result<u64, DeliveryError> {
		Ok(self.gas_estimate)
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		Ok(self.balances.get(&address).copied().unwrap_or_default())
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		Ok(self.block_number)
	}

	async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, DeliveryError> {
		self.timestamps
			.get(&block_number)
			.copied()
			.ok_or_else(|| DeliveryError::Network(format!("Block {} not found", block_number)))
	}

	async fn get_logs(&self, filter: LogFilter) -> Result<Vec<LogEntry>, DeliveryError> {
		let logs = self
			.logs
			.iter()
			.filter(|log| log.address == filter.address)
			.filter(|log| log.topics.first() == Some(&filter.event_signature))
			.filter(|log| {
				log.block_number
					.map(|n| n >= filter.from_block && n <= filter.to_block)
					.unwrap_or(true)
			})
			.cloned()
			.collect();
		if let Ok(mut filters) = self.log_filters.lock() {
			filters.push(filter);
		}
		Ok(logs)
	}

	async fn get_block_transactions(
		&self,
		block_number: u64,
	) -> Result<Vec<TransactionSummary>, DeliveryError> {
		Ok(self
			.block_transactions
			.get(&block_number)
			.cloned()
			.unwrap_or_default())
	}
}
