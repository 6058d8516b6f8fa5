//! Shared application state handed to every handler and monitor.

use crate::handlers::alive_ai::ReflectionHistory;
use crate::monitors::liquidity::LiquidityCache;
use crate::{ApiError, CoreError};
use alloy_primitives::Address;
use drt_delivery::{DeliveryInterface, DeliveryService};
use drt_dex::{MeshRouter, PoolGraph};
use drt_integrations::{
	Assistant, PriceClient, SocialPoster, TesseractOcr, TextExtractor, TwitterClient,
};
use drt_types::{AliveAiConfig, Config};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
	pub config: Arc<Config>,
	pub delivery: Arc<DeliveryService>,
	pub router: Arc<MeshRouter>,
	/// Prompt client, present when `[openai]` is configured
	pub assistant: Option<Assistant>,
	/// Tweet client, present when `[twitter]` is configured
	pub social: Option<Arc<dyn SocialPoster>>,
	pub prices: Arc<PriceClient>,
	pub ocr: Arc<dyn TextExtractor>,
	/// Pool balances kept fresh by the liquidity monitor
	pub liquidity: LiquidityCache,
	/// Recent AliveAI `E` values
	pub reflections: ReflectionHistory,
}

impl AppState {
	/// Builds the state from configuration and a chain access implementation.
	pub fn new(config: Config, chain: Arc<dyn DeliveryInterface>) -> Result<Self, CoreError> {
		let graph = PoolGraph::from_config(&config.mesh.pools);
		tracing::info!(
			pools = graph.pools().len(),
			tokens = graph.token_count(),
			max_hops = config.mesh.max_hops,
			"Loaded mesh pool graph"
		);
		let router = MeshRouter::new(graph, config.mesh.max_hops);

		let assistant = config
			.openai
			.as_ref()
			.map(Assistant::from_config)
			.transpose()
			.map_err(|e| CoreError::Config(e.to_string()))?;

		let social = config
			.twitter
			.as_ref()
			.map(TwitterClient::from_config)
			.transpose()
			.map_err(|e| CoreError::Config(e.to_string()))?
			.map(|client| Arc::new(client) as Arc<dyn SocialPoster>);

		let prices =
			PriceClient::from_config(&config.prices).map_err(|e| CoreError::Config(e.to_string()))?;
		let ocr = TesseractOcr::from_config(&config.resource);

		let history = config
			.alive_ai
			.as_ref()
			.map(|alive| alive.reflection_history)
			.unwrap_or(10);

		Ok(Self {
			delivery: Arc::new(DeliveryService::new(chain, config.network.confirmations)),
			router: Arc::new(router),
			assistant,
			social,
			prices: Arc::new(prices),
			ocr: Arc::new(ocr),
			liquidity: LiquidityCache::default(),
			reflections: ReflectionHistory::new(history),
			config: Arc::new(config),
		})
	}

	pub fn with_assistant(mut self, assistant: Assistant) -> Self {
		self.assistant = Some(assistant);
		self
	}

	pub fn with_social(mut self, social: Arc<dyn SocialPoster>) -> Self {
		self.social = Some(social);
		self
	}

	pub fn with_ocr(mut self, ocr: Arc<dyn TextExtractor>) -> Self {
		self.ocr = ocr;
		self
	}

	pub fn assistant(&self) -> Result<&Assistant, ApiError> {
		self.assistant
			.as_ref()
			.ok_or_else(|| ApiError::Unavailable("OpenAI integration is not configured".into()))
	}

	pub fn alive_ai(&self) -> Result<&AliveAiConfig, ApiError> {
		self.config
			.alive_ai
			.as_ref()
			.ok_or_else(|| ApiError::Unavailable("AliveAI is not configured".into()))
	}

	/// Address the backend signs with.
	pub fn signer(&self) -> Result<Address, ApiError> {
		self.delivery
			.signer_address()
			.ok_or_else(|| ApiError::from(drt_delivery::DeliveryError::NoSigner))
	}
}

/// Resolves an optional contract address or reports it as not configured.
pub fn require_contract(address: Option<Address>, name: &str) -> Result<Address, ApiError> {
	address.ok_or_else(|| ApiError::Unavailable(format!("contracts.{} is not configured", name)))
}
