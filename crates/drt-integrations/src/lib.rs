//! Off-chain integrations used by the DRT backend.
//!
//! Each external service sits behind a small trait so handlers and monitors
//! can be tested without network access:
//! - [`LanguageModel`] with the OpenAI chat-completions client
//! - [`SocialPoster`] with the Twitter v2 client
//! - [`TextExtractor`] with the Tesseract command-line OCR
//!
//! [`PriceClient`] wraps the CoinGecko and CoinMarketCap quote endpoints.

use thiserror::Error;

pub mod ocr;
pub mod openai;
pub mod prices;
pub mod twitter;

pub use ocr::{TesseractOcr, TextExtractor};
pub use openai::{Assistant, ChatMessage, ChatRequest, LanguageModel, OpenAiClient};
pub use prices::{split_list, PriceClient, PriceQuotes};
pub use twitter::{prepare_tweet, SocialPoster, TwitterClient, MAX_TWEET_CHARS};

/// Errors returned by the integration clients.
#[derive(Debug, Error)]
pub enum IntegrationError {
	/// Transport failure or non-success status from a remote API.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The remote API answered with a body we could not interpret.
	#[error("Unexpected response: {0}")]
	InvalidResponse(String),
	/// Integration is used without the settings it needs.
	#[error("Not configured: {0}")]
	NotConfigured(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	/// Local OCR process failed.
	#[error("OCR failed: {0}")]
	Ocr(String),
}

impl From<reqwest::Error> for IntegrationError {
	fn from(e: reqwest::Error) -> Self {
		IntegrationError::Http(e.to_string())
	}
}

/// Builds the shared HTTP client with a request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, IntegrationError> {
	reqwest::Client::builder()
		.timeout(std::time::Duration::from_secs(timeout_secs))
		.build()
		.map_err(|e| IntegrationError::Http(format!("Failed to build HTTP client: {}", e)))
}
