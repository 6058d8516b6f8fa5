//! USD price lookups from CoinGecko and CoinMarketCap.

use crate::{http_client, IntegrationError};
use drt_types::{PricesConfig, SecretString};
use serde_json::Value;
use std::collections::BTreeMap;

/// USD price per requested id or symbol.
pub type PriceQuotes = BTreeMap<String, f64>;

const CMC_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

pub struct PriceClient {
	http: reqwest::Client,
	coingecko_url: String,
	coinmarketcap_url: String,
	coinmarketcap_api_key: Option<SecretString>,
}

/// Splits a comma-separated list, dropping blanks.
pub fn split_list(list: &str) -> Vec<String> {
	list.split(',')
		.map(str::trim)
		.filter(|item| !item.is_empty())
		.map(str::to_string)
		.collect()
}

impl PriceClient {
	pub fn from_config(config: &PricesConfig) -> Result<Self, IntegrationError> {
		Ok(Self {
			http: http_client(10)?,
			coingecko_url: config.coingecko_url.trim_end_matches('/').to_string(),
			coinmarketcap_url: config.coinmarketcap_url.trim_end_matches('/').to_string(),
			coinmarketcap_api_key: config
				.coinmarketcap_api_key
				.clone()
				.filter(|key| !key.is_empty()),
		})
	}

	/// Prices for CoinGecko coin ids such as `ethereum`.
	pub async fn coingecko(&self, ids: &[String]) -> Result<PriceQuotes, IntegrationError> {
		if ids.is_empty() {
			return Err(IntegrationError::InvalidInput("no coin ids given".into()));
		}

		let body: Value = self
			.http
			.get(format!("{}/simple/price", self.coingecko_url))
			.query(&[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())])
			.send()
			.await?
			.error_for_status()?
			.json()
			.await
			.map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

		let quotes = parse_coingecko(&body);
		tracing::debug!(requested = ids.len(), found = quotes.len(), "CoinGecko prices");
		Ok(quotes)
	}

	/// Prices for ticker symbols such as `ETH`. Requires an API key.
	pub async fn coinmarketcap(&self, symbols: &[String]) -> Result<PriceQuotes, IntegrationError> {
		let key = self.coinmarketcap_api_key.as_ref().ok_or_else(|| {
			IntegrationError::NotConfigured("prices.coinmarketcap_api_key is not set".into())
		})?;
		if symbols.is_empty() {
			return Err(IntegrationError::InvalidInput("no symbols given".into()));
		}

		let body: Value = self
			.http
			.get(format!(
				"{}/v1/cryptocurrency/quotes/latest",
				self.coinmarketcap_url
			))
			.query(&[("symbol", symbols.join(","))])
			.header(CMC_KEY_HEADER, key.expose_secret())
			.send()
			.await?
			.error_for_status()?
			.json()
			.await
			.map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

		parse_coinmarketcap(&body)
	}
}

/// `{"ethereum": {"usd": 3000.1}}` into `{ethereum: 3000.1}`.
pub fn parse_coingecko(body: &Value) -> PriceQuotes {
	body.as_object()
		.map(|coins| {
			coins
				.iter()
				.filter_map(|(id, quote)| quote.get("usd")?.as_f64().map(|usd| (id.clone(), usd)))
				.collect()
		})
		.unwrap_or_default()
}

/// `data.<SYMBOL>.quote.USD.price`, where `<SYMBOL>` may hold an object or
/// a list of matching listings (the first one wins).
pub fn parse_coinmarketcap(body: &Value) -> Result<PriceQuotes, IntegrationError> {
	let data = body
		.get("data")
		.and_then(Value::as_object)
		.ok_or_else(|| IntegrationError::InvalidResponse("missing data object".into()))?;

	Ok(data
		.iter()
		.filter_map(|(symbol, entry)| {
			let listing = match entry {
				Value::Array(listings) => listings.first()?,
				other => other,
			};
			let price = listing.pointer("/quote/USD/price")?.as_f64()?;
			Some((symbol.clone(), price))
		})
		.collect())
}
