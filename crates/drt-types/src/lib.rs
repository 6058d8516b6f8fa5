//! Common types for the DRT backend.
//!
//! This crate holds the configuration model and loader, secret handling,
//! the chain-agnostic transaction types shared by delivery and discovery,
//! token unit conversion, and small utilities used across the workspace.

pub mod config;
pub mod secret;
pub mod transaction;
pub mod units;
pub mod utils;

pub use config::{
	emotional_symbols, AliveAiConfig, BroadcasterConfig, Config, ConfigError, ContractsConfig,
	EmotionPoolConfig, MeshConfig, MonitorsConfig, NetworkConfig, OpenAiConfig, PollerConfig,
	PoolConfig, PricesConfig, ResourceConfig, ServerConfig, TwinCoreConfig, TwitterConfig,
	WalletMonitorConfig,
};
pub use secret::SecretString;
pub use transaction::{LogEntry, LogFilter, Transaction, TransactionReceipt, TransactionSummary};
pub use units::{
	format_amount, parse_amount, parse_base_units, AmountInput, UnitsError, TOKEN_DECIMALS,
};
pub use utils::{current_timestamp, format_address, truncate_id};
