//! Posting to Twitter through the v2 API.

use crate::{http_client, IntegrationError};
use async_trait::async_trait;
use drt_types::{SecretString, TwitterConfig};
use serde::Deserialize;

/// Tweets are cut to this many characters.
pub const MAX_TWEET_CHARS: usize = 280;

/// Trims `text` and cuts it to [`MAX_TWEET_CHARS`] characters.
///
/// Returns `None` when nothing is left to post.
pub fn prepare_tweet(text: &str) -> Option<String> {
	let trimmed = text.trim();
	if trimmed.is_empty() {
		return None;
	}
	Some(trimmed.chars().take(MAX_TWEET_CHARS).collect())
}

/// Something that can publish a short text post.
#[async_trait]
pub trait SocialPoster: Send + Sync {
	/// Publishes `text` and returns the id of the created post.
	async fn post(&self, text: &str) -> Result<String, IntegrationError>;
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
	data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
	id: String,
}

pub struct TwitterClient {
	http: reqwest::Client,
	base_url: String,
	bearer_token: SecretString,
}

impl TwitterClient {
	pub fn from_config(config: &TwitterConfig) -> Result<Self, IntegrationError> {
		if config.bearer_token.is_empty() {
			return Err(IntegrationError::NotConfigured("twitter.bearer_token is empty".into()));
		}
		Ok(Self {
			http: http_client(15)?,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			bearer_token: config.bearer_token.clone(),
		})
	}
}

#[async_trait]
impl SocialPoster for TwitterClient {
	async fn post(&self, text: &str) -> Result<String, IntegrationError> {
		let tweet = prepare_tweet(text)
			.ok_or_else(|| IntegrationError::InvalidInput("tweet text is empty".into()))?;

		let response = self
			.http
			.post(format!("{}/2/tweets", self.base_url))
			.bearer_auth(self.bearer_token.expose_secret())
			.json(&serde_json::json!({ "text": tweet }))
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(IntegrationError::Http(format!("Twitter returned {}: {}", status, body)));
		}

		let created: CreateTweetResponse = response
			.json()
			.await
			.map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

		tracing::info!(tweet_id = %created.data.id, "Tweet posted");
		Ok(created.data.id)
	}
}
