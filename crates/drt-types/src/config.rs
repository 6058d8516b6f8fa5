//! Configuration model and loader.
//!
//! The backend is configured from a single TOML file. Before parsing, every
//! `${VAR}` or `${VAR:-default}` placeholder is replaced with the value of the
//! matching environment variable so deployments can keep keys and addresses in
//! the environment while the file stays in version control.
//!
//! Contract addresses are optional. A handler whose contract is not configured
//! reports the feature as unavailable instead of failing at startup.

use crate::SecretString;
use alloy_primitives::Address;
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Upper bound for a Uniswap V3 fee tier, in hundredths of a bip.
pub const MAX_FEE_TIER: u32 = 1_000_000;
/// Upper bound on the number of hops the mesh router may explore.
pub const MAX_ROUTING_HOPS: usize = 64;

/// Symbols of the emotional tokens in `updateAffectiveState` argument order.
pub fn emotional_symbols() -> impl Iterator<Item = String> {
	(21..=36).map(|n| format!("DRTv{}", n))
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Failed to read config file: {0}")]
	Io(String),
	#[error("Failed to parse config: {0}")]
	Parse(String),
	#[error("Environment variable {0} is not set and has no default")]
	MissingEnv(String),
	#[error("Invalid configuration: {0}")]
	Validation(String),
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub server: ServerConfig,
	pub network: NetworkConfig,
	#[serde(default)]
	pub contracts: ContractsConfig,
	#[serde(default)]
	pub mesh: MeshConfig,
	#[serde(default)]
	pub alive_ai: Option<AliveAiConfig>,
	#[serde(default)]
	pub openai: Option<OpenAiConfig>,
	#[serde(default)]
	pub twitter: Option<TwitterConfig>,
	#[serde(default)]
	pub prices: PricesConfig,
	#[serde(default)]
	pub resource: ResourceConfig,
	#[serde(default)]
	pub monitors: MonitorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
		}
	}
}

/// The single EVM network every contract lives on.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
	pub chain_id: u64,
	pub rpc_url: String,
	/// Confirmations to wait for before a write is reported as done.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Signing key. Without it the backend runs read-only.
	#[serde(default, deserialize_with = "optional_secret")]
	pub private_key: Option<SecretString>,
	/// How far back `GET /api/transactions` scans for transfers.
	#[serde(default = "default_log_lookback")]
	pub log_lookback_blocks: u64,
}

/// Deployed contract addresses. Every entry is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractsConfig {
	#[serde(default, deserialize_with = "optional_address")]
	pub drt_v1: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub drt_v2: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub seth: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub weth: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub vault: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub drtrade: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub swap_router: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub universal_router: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub uniswap_v2_router: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub uniswap_v3_router: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub digitize: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub rebate_vault: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub liquidity_pool: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub autostation: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub ai_consciousness: Option<Address>,
	#[serde(default, deserialize_with = "optional_address")]
	pub auto_tweet: Option<Address>,
}

/// Pool entry used to build the routing graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
	pub address: Address,
	pub token_a: Address,
	pub token_b: Address,
	/// V3 fee tier in hundredths of a bip, when the pool has one.
	#[serde(default)]
	pub fee: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshConfig {
	#[serde(default = "default_max_hops")]
	pub max_hops: usize,
	/// Steps of the greedy long walk used by `/api/execute-swap`.
	#[serde(default = "default_long_walk_steps")]
	pub long_walk_steps: usize,
	#[serde(default = "default_swap_deadline")]
	pub deadline_secs: u64,
	#[serde(default = "default_approve_gas")]
	pub approve_gas_limit: u64,
	#[serde(default)]
	pub pools: Vec<PoolConfig>,
}

impl Default for MeshConfig {
	fn default() -> Self {
		Self {
			max_hops: default_max_hops(),
			long_walk_steps: default_long_walk_steps(),
			deadline_secs: default_swap_deadline(),
			approve_gas_limit: default_approve_gas(),
			pools: Vec::new(),
		}
	}
}

/// Pool between two emotional tokens, referenced by symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct EmotionPoolConfig {
	pub pair: [String; 2],
	pub address: Address,
}

impl EmotionPoolConfig {
	pub fn contains(&self, a: &str, b: &str) -> bool {
		self.pair.iter().any(|s| s == a) && self.pair.iter().any(|s| s == b)
	}
}

/// AliveAI contracts and its sixteen emotional tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct AliveAiConfig {
	/// Wallet whose balances form the affective state.
	pub wallet: Address,
	pub contract: Address,
	pub emotional_base: Address,
	pub router: Address,
	#[serde(default = "default_alive_deadline")]
	pub swap_deadline_secs: u64,
	#[serde(default = "default_reflection_history")]
	pub reflection_history: usize,
	/// Symbol to token address. Iteration order (sorted by symbol) is the
	/// argument order of `updateAffectiveState`.
	pub tokens: BTreeMap<String, Address>,
	#[serde(default)]
	pub pools: Vec<EmotionPoolConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
	pub api_key: SecretString,
	#[serde(default = "default_openai_url")]
	pub base_url: String,
	/// Model for tweets, summaries, sentiment and reflections.
	#[serde(default = "default_chat_model")]
	pub model: String,
	/// Model for resource valuation and liquidity prompts.
	#[serde(default = "default_evaluation_model")]
	pub evaluation_model: String,
	#[serde(default = "default_http_timeout")]
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
	/// OAuth 2.0 user-context access token with `tweet.write` scope.
	pub bearer_token: SecretString,
	#[serde(default = "default_twitter_url")]
	pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
	#[serde(default = "default_coingecko_url")]
	pub coingecko_url: String,
	#[serde(default = "default_coinmarketcap_url")]
	pub coinmarketcap_url: String,
	#[serde(default, deserialize_with = "optional_secret")]
	pub coinmarketcap_api_key: Option<SecretString>,
}

impl Default for PricesConfig {
	fn default() -> Self {
		Self {
			coingecko_url: default_coingecko_url(),
			coinmarketcap_url: default_coinmarketcap_url(),
			coinmarketcap_api_key: None,
		}
	}
}

/// Proof-of-resource submission settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
	#[serde(default = "default_ocr_command")]
	pub ocr_command: String,
	#[serde(default = "default_ocr_language")]
	pub ocr_language: String,
	#[serde(default = "default_upload_dir")]
	pub upload_dir: PathBuf,
	#[serde(default = "default_max_upload")]
	pub max_upload_bytes: usize,
	/// Tokens minted per estimated USD of contribution.
	#[serde(default = "default_tokens_per_usd")]
	pub tokens_per_usd: f64,
	#[serde(default = "default_max_mint_tokens")]
	pub max_mint_tokens: f64,
}

impl Default for ResourceConfig {
	fn default() -> Self {
		Self {
			ocr_command: default_ocr_command(),
			ocr_language: default_ocr_language(),
			upload_dir: default_upload_dir(),
			max_upload_bytes: default_max_upload(),
			tokens_per_usd: default_tokens_per_usd(),
			max_mint_tokens: default_max_mint_tokens(),
		}
	}
}

/// Generic settings for a polling background task.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_poll_interval")]
	pub interval_secs: u64,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			interval_secs: default_poll_interval(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletMonitorConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_poll_interval")]
	pub interval_secs: u64,
	#[serde(default, deserialize_with = "optional_address")]
	pub wallet: Option<Address>,
}

impl Default for WalletMonitorConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			interval_secs: default_poll_interval(),
			wallet: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwinCoreConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_twin_interval")]
	pub interval_secs: u64,
	#[serde(default = "default_memory_file")]
	pub memory_file: PathBuf,
	#[serde(default = "default_identity")]
	pub identity: String,
}

impl Default for TwinCoreConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			interval_secs: default_twin_interval(),
			memory_file: default_memory_file(),
			identity: default_identity(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcasterConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_broadcast_interval")]
	pub interval_secs: u64,
	#[serde(default = "default_broadcast_channel")]
	pub channel: String,
}

impl Default for BroadcasterConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			interval_secs: default_broadcast_interval(),
			channel: default_broadcast_channel(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorsConfig {
	#[serde(default = "default_liquidity_monitor")]
	pub liquidity: PollerConfig,
	#[serde(default)]
	pub transactions: WalletMonitorConfig,
	#[serde(default)]
	pub autostation_listener: PollerConfig,
	#[serde(default)]
	pub auto_tweet: PollerConfig,
	#[serde(default)]
	pub twin_core: TwinCoreConfig,
	#[serde(default)]
	pub station_broadcaster: BroadcasterConfig,
}

impl Default for MonitorsConfig {
	fn default() -> Self {
		Self {
			liquidity: default_liquidity_monitor(),
			transactions: WalletMonitorConfig::default(),
			autostation_listener: PollerConfig::default(),
			auto_tweet: PollerConfig::default(),
			twin_core: TwinCoreConfig::default(),
			station_broadcaster: BroadcasterConfig::default(),
		}
	}
}

impl Config {
	/// Reads, expands and validates a configuration file.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| ConfigError::Io(format!("{}: {}", path, e)))?;
		let config: Config = raw.parse()?;
		tracing::debug!(path, pools = config.mesh.pools.len(), "Loaded configuration");
		Ok(config)
	}

	/// Checks cross-field constraints that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.server.port == 0 {
			return Err(ConfigError::Validation("server.port must be non-zero".into()));
		}
		if self.network.rpc_url.trim().is_empty() {
			return Err(ConfigError::Validation("network.rpc_url cannot be empty".into()));
		}
		if self.network.confirmations == 0 {
			return Err(ConfigError::Validation(
				"network.confirmations must be at least 1".into(),
			));
		}
		if self.mesh.max_hops == 0 || self.mesh.max_hops > MAX_ROUTING_HOPS {
			return Err(ConfigError::Validation(format!(
				"mesh.max_hops must be between 1 and {}",
				MAX_ROUTING_HOPS
			)));
		}
		for pool in &self.mesh.pools {
			if pool.token_a == pool.token_b {
				return Err(ConfigError::Validation(format!(
					"pool {} pairs a token with itself",
					pool.address
				)));
			}
			if pool.fee.is_some_and(|fee| fee > MAX_FEE_TIER) {
				return Err(ConfigError::Validation(format!(
					"pool {} fee tier exceeds {}",
					pool.address, MAX_FEE_TIER
				)));
			}
		}

		if let Some(alive) = &self.alive_ai {
			if alive.tokens.len() != 16 {
				return Err(ConfigError::Validation(format!(
					"alive_ai.tokens must list the 16 emotional tokens, found {}",
					alive.tokens.len()
				)));
			}
			if let Some(symbol) = emotional_symbols().find(|s| !alive.tokens.contains_key(s)) {
				return Err(ConfigError::Validation(format!(
					"alive_ai.tokens is missing {}",
					symbol
				)));
			}
			if alive.reflection_history == 0 {
				return Err(ConfigError::Validation(
					"alive_ai.reflection_history must be at least 1".into(),
				));
			}
			for pool in &alive.pools {
				for symbol in &pool.pair {
					if !alive.tokens.contains_key(symbol) {
						return Err(ConfigError::Validation(format!(
							"alive_ai pool {} references unknown token {}",
							pool.address, symbol
						)));
					}
				}
			}
		}

		let intervals = [
			("monitors.liquidity", self.monitors.liquidity.interval_secs),
			("monitors.transactions", self.monitors.transactions.interval_secs),
			(
				"monitors.autostation_listener",
				self.monitors.autostation_listener.interval_secs,
			),
			("monitors.auto_tweet", self.monitors.auto_tweet.interval_secs),
			("monitors.twin_core", self.monitors.twin_core.interval_secs),
			(
				"monitors.station_broadcaster",
				self.monitors.station_broadcaster.interval_secs,
			),
		];
		for (name, secs) in intervals {
			if secs == 0 {
				return Err(ConfigError::Validation(format!(
					"{}.interval_secs must be at least 1",
					name
				)));
			}
		}

		let resource = &self.resource;
		if !resource.tokens_per_usd.is_finite() || !resource.max_mint_tokens.is_finite() {
			return Err(ConfigError::Validation(
				"resource mint parameters must be finite numbers".into(),
			));
		}
		if resource.tokens_per_usd < 0.0 || resource.max_mint_tokens < 0.0 {
			return Err(ConfigError::Validation(
				"resource mint parameters cannot be negative".into(),
			));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let expanded = expand_env_vars(s)?;
		let config: Config =
			toml::from_str(&expanded).map_err(|e| ConfigError::Parse(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}
}

fn env_pattern() -> Result<&'static Regex, ConfigError> {
	static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
	PATTERN
		.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}"))
		.as_ref()
		.map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Expands `${VAR}` and `${VAR:-default}` from the process environment.
pub fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
	expand_with(input, |name| std::env::var(name).ok())
}

/// Expands placeholders using `lookup` as the variable source.
pub fn expand_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let mut missing = None;
	let expanded = env_pattern()?.replace_all(input, |caps: &Captures| {
		let name = &caps[1];
		match (lookup(name), caps.get(2)) {
			(Some(value), _) => value,
			(None, Some(default)) => default.as_str().to_string(),
			(None, None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::MissingEnv(name)),
		None => Ok(expanded.into_owned()),
	}
}

fn optional_address<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<String>::deserialize(deserializer)?;
	match value.as_deref().map(str::trim) {
		None | Some("") => Ok(None),
		Some(s) => s.parse::<Address>().map(Some).map_err(serde::de::Error::custom),
	}
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<String>::deserialize(deserializer)?;
	Ok(value
		.filter(|s| !s.trim().is_empty())
		.map(SecretString::from))
}

fn default_host() -> String {
	"0.0.0.0".into()
}
fn default_port() -> u16 {
	3000
}
fn default_confirmations() -> u64 {
	1
}
fn default_log_lookback() -> u64 {
	2000
}
fn default_max_hops() -> usize {
	30
}
fn default_long_walk_steps() -> usize {
	28
}
fn default_swap_deadline() -> u64 {
	600
}
fn default_approve_gas() -> u64 {
	100_000
}
fn default_alive_deadline() -> u64 {
	60
}
fn default_reflection_history() -> usize {
	10
}
fn default_openai_url() -> String {
	"https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
	"gpt-4".into()
}
fn default_evaluation_model() -> String {
	"gpt-3.5-turbo".into()
}
fn default_http_timeout() -> u64 {
	30
}
fn default_twitter_url() -> String {
	"https://api.twitter.com".into()
}
fn default_coingecko_url() -> String {
	"https://api.coingecko.com/api/v3".into()
}
fn default_coinmarketcap_url() -> String {
	"https://pro-api.coinmarketcap.com".into()
}
fn default_ocr_command() -> String {
	"tesseract".into()
}
fn default_ocr_language() -> String {
	"eng".into()
}
fn default_upload_dir() -> PathBuf {
	PathBuf::from("uploads")
}
fn default_max_upload() -> usize {
	20 * 1024 * 1024
}
fn default_tokens_per_usd() -> f64 {
	10.0
}
fn default_max_mint_tokens() -> f64 {
	100.0
}
fn default_poll_interval() -> u64 {
	12
}
fn default_liquidity_monitor() -> PollerConfig {
	PollerConfig {
		enabled: true,
		interval_secs: 10,
	}
}
fn default_twin_interval() -> u64 {
	30
}
fn default_memory_file() -> PathBuf {
	PathBuf::from("memory.json")
}
fn default_identity() -> String {
	"DRTMind".into()
}
fn default_broadcast_interval() -> u64 {
	60
}
fn default_broadcast_channel() -> String {
	"ai-general".into()
}
