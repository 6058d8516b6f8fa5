//! OpenAI chat completions and the prompts built on top of them.

use crate::{http_client, IntegrationError};
use async_trait::async_trait;
use drt_types::{OpenAiConfig, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// System prompt for resource valuation.
pub const RESOURCE_EVALUATOR_PROMPT: &str = "You are a strict financial evaluator for the DRTv1 protocol. \
Return only a single number (no words, no symbols, no commentary). \
The number must represent the estimated USD value of the submission. \
Do not include any explanation.";

/// System prompt for liquidity evaluation.
pub const LIQUIDITY_TRADER_PROMPT: &str = "You are a trader responsible for checking liquidity in the DRTv1/ETH pool. \
If liquidity is sufficient, execute the trade. \
If liquidity is insufficient, respond with 'Insufficient liquidity, please try again later.'";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: String,
	pub content: String,
}

impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self {
			role: "system".to_string(),
			content: content.into(),
		}
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: "user".to_string(),
			content: content.into(),
		}
	}
}

/// Body of a `/chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
	pub model: String,
	pub messages: Vec<ChatMessage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

/// A chat model that turns a request into the assistant's reply text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
	async fn complete(&self, request: &ChatRequest) -> Result<String, IntegrationError>;
}

/// HTTP client for the OpenAI chat completions API.
pub struct OpenAiClient {
	http: reqwest::Client,
	base_url: String,
	api_key: SecretString,
}

impl OpenAiClient {
	pub fn from_config(config: &OpenAiConfig) -> Result<Self, IntegrationError> {
		if config.api_key.is_empty() {
			return Err(IntegrationError::NotConfigured("openai.api_key is empty".into()));
		}
		Ok(Self {
			http: http_client(config.timeout_secs)?,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			api_key: config.api_key.clone(),
		})
	}
}

#[async_trait]
impl LanguageModel for OpenAiClient {
	async fn complete(&self, request: &ChatRequest) -> Result<String, IntegrationError> {
		let response = self
			.http
			.post(format!("{}/chat/completions", self.base_url))
			.bearer_auth(self.api_key.expose_secret())
			.json(request)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::warn!(status = %status, model = %request.model, "OpenAI request failed");
			return Err(IntegrationError::Http(format!("OpenAI returned {}: {}", status, body)));
		}

		let body: ChatResponse = response
			.json()
			.await
			.map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

		let content = body
			.choices
			.into_iter()
			.next()
			.map(|choice| choice.message.content.trim().to_string())
			.ok_or_else(|| IntegrationError::InvalidResponse("no choices returned".into()))?;

		tracing::debug!(model = %request.model, chars = content.len(), "OpenAI responded");
		Ok(content)
	}
}

/// The prompts the backend sends to the language model.
#[derive(Clone)]
pub struct Assistant {
	model: Arc<dyn LanguageModel>,
	/// Model for tweets, summaries, sentiment and reflections
	chat_model: String,
	/// Model for valuation and liquidity prompts
	evaluation_model: String,
}

impl Assistant {
	pub fn new(
		model: Arc<dyn LanguageModel>,
		chat_model: impl Into<String>,
		evaluation_model: impl Into<String>,
	) -> Self {
		Self {
			model,
			chat_model: chat_model.into(),
			evaluation_model: evaluation_model.into(),
		}
	}

	pub fn from_config(config: &OpenAiConfig) -> Result<Self, IntegrationError> {
		let client = OpenAiClient::from_config(config)?;
		Ok(Self::new(
			Arc::new(client),
			config.model.clone(),
			config.evaluation_model.clone(),
		))
	}

	fn chat(&self, prompt: String, max_tokens: Option<u32>) -> ChatRequest {
		ChatRequest {
			model: self.chat_model.clone(),
			messages: vec![ChatMessage::user(prompt)],
			temperature: None,
			max_tokens,
		}
	}

	fn evaluation(&self, system: &str, prompt: String) -> ChatRequest {
		ChatRequest {
			model: self.evaluation_model.clone(),
			messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
			temperature: Some(0.2),
			max_tokens: Some(50),
		}
	}

	/// Asks for the USD value of a contribution. The reply should be a bare number.
	pub async fn evaluate_resource(
		&self,
		description: &str,
		extracted_text: &str,
	) -> Result<String, IntegrationError> {
		let prompt = format!(
			"Estimate the real-world contribution value (USD) based on this description: {}\n\n{}",
			description, extracted_text
		);
		self.model
			.complete(&self.evaluation(RESOURCE_EVALUATOR_PROMPT, prompt))
			.await
	}

	pub async fn evaluate_liquidity(&self, prompt: &str) -> Result<String, IntegrationError> {
		self.model
			.complete(&self.evaluation(LIQUIDITY_TRADER_PROMPT, prompt.to_string()))
			.await
	}

	pub async fn generate_tweet(
		&self,
		transaction: &serde_json::Value,
	) -> Result<String, IntegrationError> {
		let prompt = format!(
			"Write an engaging tweet summarizing this Ethereum transaction: {}",
			transaction
		);
		self.model.complete(&self.chat(prompt, Some(50))).await
	}

	pub async fn summarize_channel(&self, messages: &[String]) -> Result<String, IntegrationError> {
		let prompt = format!("Summarize the following messages: \n{}", messages.join("\n"));
		self.model.complete(&self.chat(prompt, None)).await
	}

	pub async fn analyze_sentiment(&self, message: &str) -> Result<String, IntegrationError> {
		let prompt = format!("Analyze the sentiment of this message: \"{}\"", message);
		self.model.complete(&self.chat(prompt, None)).await
	}

	/// One hemisphere's reflection over recent thoughts and the self model.
	pub async fn reflect(
		&self,
		role: &str,
		short_term: &[String],
		self_model: &serde_json::Value,
	) -> Result<String, IntegrationError> {
		let prompt = format!(
			"You are the {} Hemisphere. Reflect on this:\n\nRecent thoughts:\n{}\n\nSelf Model:\n{}\n\nRespond with your new thought.",
			role,
			short_term.join("\n"),
			self_model
		);
		self.model.complete(&self.chat(prompt, None)).await
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use axum::{routing::post, Json, Router};
	use std::sync::Mutex;

	/// Records every request and answers with a fixed reply.
	pub struct RecordingModel {
		pub reply: String,
		pub requests: Mutex<Vec<ChatRequest>>,
	}

	impl RecordingModel {
		pub fn new(reply: &str) -> Arc<Self> {
			Arc::new(Self {
				reply: reply.to_string(),
				requests: Mutex::new(Vec::new()),
			})
		}

		fn last(&self) -> ChatRequest {
			self.requests.lock().unwrap().last().cloned().unwrap()
		}
	}

	#[async_trait]
	impl LanguageModel for RecordingModel {
		async fn complete(&self, request: &ChatRequest) -> Result<String, IntegrationError> {
			self.requests.lock().unwrap().push(request.clone());
			Ok(self.reply.clone())
		}
	}

	fn assistant(model: Arc<RecordingModel>) -> Assistant {
		Assistant::new(model, "gpt-4", "gpt-3.5-turbo")
	}

	#[tokio::test]
	async fn test_evaluate_resource_request_shape() {
		let model = RecordingModel::new("12.5");
		let reply = assistant(model.clone())
			.evaluate_resource("planted trees", "receipt: 40 saplings")
			.await
			.unwrap();
		assert_eq!(reply, "12.5");

		let request = model.last();
		assert_eq!(request.model, "gpt-3.5-turbo");
		assert_eq!(request.temperature, Some(0.2));
		assert_eq!(request.max_tokens, Some(50));
		assert_eq!(request.messages[0].role, "system");
		assert!(request.messages[1].content.contains("planted trees\n\nreceipt: 40 saplings"));
	}

	#[tokio::test]
	async fn test_chat_prompts_use_chat_model() {
		let model = RecordingModel::new("ok");
		let assistant = assistant(model.clone());

		assistant
			.generate_tweet(&serde_json::json!({"hash": "0x01"}))
			.await
			.unwrap();
		let request = model.last();
		assert_eq!(request.model, "gpt-4");
		assert_eq!(request.max_tokens, Some(50));
		assert_eq!(request.temperature, None);

		assistant.analyze_sentiment("gm").await.unwrap();
		assert_eq!(
			model.last().messages[0].content,
			"Analyze the sentiment of this message: \"gm\""
		);

		assistant
			.summarize_channel(&["a".to_string(), "b".to_string()])
			.await
			.unwrap();
		assert!(model.last().messages[0].content.ends_with("\na\nb"));

		assistant.evaluate_liquidity("buy 5 DRT").await.unwrap();
		assert_eq!(model.last().messages[0].content, LIQUIDITY_TRADER_PROMPT);
	}

	#[tokio::test]
	async fn test_reflect_prompt() {
		let model = RecordingModel::new("thought");
		assistant(model.clone())
			.reflect(
				"Left",
				&["one".to_string(), "two".to_string()],
				&serde_json::json!({"identity": "DRTMind", "evolution": 3}),
			)
			.await
			.unwrap();
		let prompt = model.last().messages[0].content.clone();
		assert!(prompt.starts_with("You are the Left Hemisphere."));
		assert!(prompt.contains("Recent thoughts:\none\ntwo"));
		assert!(prompt.contains("\"identity\":\"DRTMind\""));
	}

	pub(crate) async fn serve(router: Router) -> String {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}", addr)
	}

	fn config(base_url: String) -> OpenAiConfig {
		OpenAiConfig {
			api_key: SecretString::from("sk-test"),
			base_url,
			model: "gpt-4".into(),
			evaluation_model: "gpt-3.5-turbo".into(),
			timeout_secs: 5,
		}
	}

	#[tokio::test]
	async fn test_client_parses_first_choice() {
		let router = Router::new().route(
			"/chat/completions",
			post(|Json(body): Json<serde_json::Value>| async move {
				assert_eq!(body["model"], "gpt-4");
				Json(serde_json::json!({
					"choices": [{"message": {"role": "assistant", "content": "  hello  "}}]
				}))
			}),
		);
		let client = OpenAiClient::from_config(&config(serve(router).await)).unwrap();
		let reply = client
			.complete(&ChatRequest {
				model: "gpt-4".into(),
				messages: vec![ChatMessage::user("hi")],
				temperature: None,
				max_tokens: None,
			})
			.await
			.unwrap();
		assert_eq!(reply, "hello");
	}

	#[tokio::test]
	async fn test_client_rejects_empty_choices() {
		let router = Router::new().route(
			"/chat/completions",
			post(|| async { Json(serde_json::json!({"choices": []})) }),
		);
		let client = OpenAiClient::from_config(&config(serve(router).await)).unwrap();
		let result = client
			.complete(&ChatRequest {
				model: "gpt-4".into(),
				messages: vec![],
				temperature: None,
				max_tokens: None,
			})
			.await;
		assert!(matches!(result, Err(IntegrationError::InvalidResponse(_))));
	}

	#[test]
	fn test_empty_key_rejected() {
		let mut config = config("http://localhost".into());
		config.api_key = SecretString::from("");
		assert!(matches!(
			OpenAiClient::from_config(&config),
			Err(IntegrationError::NotConfigured(_))
		));
	}
}
