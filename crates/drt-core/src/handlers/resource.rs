//! Proof-of-resource submissions.
//!
//! A contributor uploads a proof document with a description. The document is
//! run through OCR, the language model estimates the contribution in USD and
//! DRTv1 is minted in proportion, capped per submission.

use super::parse_address;
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, TxHash, U256};
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use drt_delivery::contracts::IDRTToken;
use drt_types::{format_address, parse_amount, ResourceConfig, TOKEN_DECIMALS};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

const MISSING_FIELDS: &str = "Missing required fields or file";

/// Reads a USD value from the start of a model reply such as `"42.5"` or
/// `"12 USD"`. Anything unreadable, negative or non-finite counts as zero.
pub fn parse_valuation(reply: &str) -> f64 {
	let trimmed = reply.trim();
	let value = trimmed
		.char_indices()
		.map(|(i, c)| i + c.len_utf8())
		.rev()
		.find_map(|end| trimmed[..end].parse::<f64>().ok())
		.unwrap_or(0.0);
	if value.is_finite() && value > 0.0 {
		value
	} else {
		0.0
	}
}

/// Whole tokens to mint for a valuation: `value * tokens_per_usd`, capped.
pub fn tokens_for(value_usd: f64, config: &ResourceConfig) -> f64 {
	(value_usd * config.tokens_per_usd).min(config.max_mint_tokens).max(0.0)
}

/// Converts a token count to base units from its shortest decimal form, so
/// `1.2` mints exactly `1.2e18`. Digits past the token's precision are dropped.
pub fn mint_amount(tokens: f64) -> Result<U256, ApiError> {
	let text = tokens.to_string();
	let text = match text.split_once('.') {
		Some((whole, fraction)) if fraction.len() > usize::from(TOKEN_DECIMALS) => {
			format!("{}.{}", whole, &fraction[..usize::from(TOKEN_DECIMALS)])
		},
		_ => text,
	};
	Ok(parse_amount(&text, TOKEN_DECIMALS)?)
}

/// A parsed multipart submission.
struct Submission {
	wallet: Address,
	description: String,
	file_name: String,
	contents: Vec<u8>,
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
	let mut wallet = None;
	let mut description = None;
	let mut file = None;

	while let Some(field) = multipart.next_field().await? {
		match field.name() {
			Some("walletAddress") => wallet = Some(field.text().await?),
			Some("description") => description = Some(field.text().await?),
			Some("proofFile") => {
				let file_name = field.file_name().unwrap_or("proof").to_string();
				file = Some((file_name, field.bytes().await?.to_vec()));
			},
			_ => {},
		}
	}

	let wallet = wallet.filter(|s| !s.trim().is_empty());
	let description = description.filter(|s| !s.trim().is_empty());
	let (Some(wallet), Some(description), Some((file_name, contents))) = (wallet, description, file)
	else {
		return Err(ApiError::bad_request(MISSING_FIELDS));
	};
	if contents.is_empty() {
		return Err(ApiError::bad_request(MISSING_FIELDS));
	}

	Ok(Submission {
		wallet: parse_address(&wallet)?,
		description,
		file_name,
		contents,
	})
}

/// Unique path under `dir` keeping the upload's extension.
fn upload_path(dir: &Path, file_name: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_nanos())
		.unwrap_or(0);
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let extension = Path::new(file_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
		.map(|ext| format!(".{}", ext))
		.unwrap_or_default();
	dir.join(format!("proof-{}-{}{}", nanos, seq, extension))
}

/// Stores the upload, extracts its text and removes it again.
async fn extract_text(state: &AppState, submission: &Submission) -> Result<String, ApiError> {
	let dir = &state.config.resource.upload_dir;
	tokio::fs::create_dir_all(dir)
		.await
		.map_err(|e| ApiError::Internal(format!("Failed to create upload dir: {}", e)))?;

	let path = upload_path(dir, &submission.file_name);
	tokio::fs::write(&path, &submission.contents)
		.await
		.map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;

	let text = state.ocr.extract_text(&path).await;
	if let Err(e) = tokio::fs::remove_file(&path).await {
		tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
	}
	Ok(text?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
	pub message: String,
	pub tx_hash: Option<TxHash>,
	pub tokens: f64,
}

/// `POST /api/verify`: OCR, valuation and mint.
#[instrument(skip_all)]
pub async fn verify(
	State(state): State<AppState>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
	let submission = read_submission(multipart?).await?;
	let assistant = state.assistant()?;
	let token = require_contract(state.config.contracts.drt_v1, "drt_v1")?;

	let text = extract_text(&state, &submission).await?;
	tracing::debug!(chars = text.len(), "Extracted proof text");

	let reply = assistant
		.evaluate_resource(&submission.description, &text)
		.await?;
	let value = parse_valuation(&reply);
	let tokens = tokens_for(value, &state.config.resource);
	let wallet = format_address(&submission.wallet);
	tracing::info!(wallet = %wallet, value_usd = value, tokens, "Valued contribution");

	let amount = mint_amount(tokens)?;
	if amount == U256::ZERO {
		return Ok(Json(VerifyResponse {
			message: format!("No DRT minted to {}: contribution valued at 0 USD", wallet),
			tx_hash: None,
			tokens: 0.0,
		}));
	}

	let receipt = state
		.delivery
		.execute(
			token,
			&IDRTToken::mintCall {
				to: submission.wallet,
				amount,
			},
			U256::ZERO,
		)
		.await?;

	Ok(Json(VerifyResponse {
		message: format!("Minted {} DRT to {}", tokens, wallet),
		tx_hash: Some(receipt.hash),
		tokens,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::state_with;
	use alloy_sol_types::SolCall;
	use async_trait::async_trait;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use drt_delivery::testing::MockDelivery;
	use drt_integrations::{Assistant, ChatRequest, IntegrationError, LanguageModel, TextExtractor};
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};
	use http_body_util::BodyExt;
	use std::sync::{Arc, Mutex};
	use tower::ServiceExt;

	const BOUNDARY: &str = "drt-test-boundary";

	struct FixedModel(Result<String, String>);

	#[async_trait]
	impl LanguageModel for FixedModel {
		async fn complete(&self, _request: &ChatRequest) -> Result<String, IntegrationError> {
			self.0.clone().map_err(IntegrationError::Http)
		}
	}

	/// Records the paths it was asked to read and whether they existed.
	#[derive(Default)]
	struct FakeOcr {
		seen: Mutex<Vec<(PathBuf, bool)>>,
	}

	#[async_trait]
	impl TextExtractor for FakeOcr {
		async fn extract_text(&self, path: &Path) -> Result<String, IntegrationError> {
			self.seen.lock().unwrap().push((path.to_path_buf(), path.exists()));
			Ok("invoice total 12 USD".into())
		}
	}

	fn multipart_body(fields: &[(&str, &str)], file: Option<&[u8]>) -> Vec<u8> {
		let mut body = Vec::new();
		for (name, value) in fields {
			body.extend_from_slice(
				format!(
					"--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
					BOUNDARY, name, value
				)
				.as_bytes(),
			);
		}
		if let Some(file) = file {
			body.extend_from_slice(
				format!(
					"--{}\r\nContent-Disposition: form-data; name=\"proofFile\"; filename=\"proof.png\"\r\nContent-Type: image/png\r\n\r\n",
					BOUNDARY
				)
				.as_bytes(),
			);
			body.extend_from_slice(file);
			body.extend_from_slice(b"\r\n");
		}
		body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
		body
	}

	async fn post(state: AppState, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
		let request = Request::builder()
			.method("POST")
			.uri("/api/verify")
			.header(
				"content-type",
				format!("multipart/form-data; boundary={}", BOUNDARY),
			)
			.body(Body::from(body))
			.unwrap();
		let response = crate::api::router(state).oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		(status, serde_json::from_slice(&bytes).unwrap_or_default())
	}

	fn state(
		dir: &Path,
		reply: Result<&str, &str>,
		mock: Arc<MockDelivery>,
		ocr: Arc<FakeOcr>,
	) -> AppState {
		let config = ConfigBuilder::new()
			.with_contracts(|c| c.drt_v1 = Some(addr(0x01)))
			.with(|c| {
				c.resource.upload_dir = dir.to_path_buf();
				c.resource.max_upload_bytes = 1024;
			})
			.build();
		let model = FixedModel(reply.map(str::to_string).map_err(str::to_string));
		state_with(config, mock)
			.with_assistant(Assistant::new(Arc::new(model), "chat", "eval"))
			.with_ocr(ocr)
	}

	#[test]
	fn test_parse_valuation() {
		assert_eq!(parse_valuation("42.5"), 42.5);
		assert_eq!(parse_valuation("  12 USD"), 12.0);
		assert_eq!(parse_valuation("about 12"), 0.0);
		assert_eq!(parse_valuation("-5"), 0.0);
		assert_eq!(parse_valuation(""), 0.0);
	}

	#[test]
	fn test_tokens_for_caps() {
		let config = ResourceConfig::default();
		assert_eq!(tokens_for(1.5, &config), 15.0);
		assert_eq!(tokens_for(50.0, &config), 100.0);
		assert_eq!(tokens_for(0.0, &config), 0.0);
	}

	#[test]
	fn test_mint_amount_is_exact_for_fractional_tokens() {
		let config = ResourceConfig::default();
		let tokens = tokens_for(0.12, &config);
		assert_eq!(mint_amount(tokens).unwrap(), U256::from(1_200_000_000_000_000_000u128));
		assert_eq!(mint_amount(0.3).unwrap(), U256::from(300_000_000_000_000_000u128));
		assert_eq!(mint_amount(100.0).unwrap(), U256::from(100_000_000_000_000_000_000u128));
		assert_eq!(mint_amount(0.0).unwrap(), U256::ZERO);
		assert_eq!(mint_amount(1e-20).unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_verify_mints_fractional_amount() {
		let dir = tempfile::tempdir().unwrap();
		let mock = Arc::new(MockDelivery::new());
		let state = state(dir.path(), Ok("0.12"), mock.clone(), Arc::new(FakeOcr::default()));

		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "receipt")],
			Some(b"img"),
		);
		let (status, response) = post(state, body).await;
		assert_eq!(status, StatusCode::OK, "{}", response);

		let call = IDRTToken::mintCall::abi_decode(&mock.submitted()[0].data).unwrap();
		assert_eq!(call.amount, U256::from(1_200_000_000_000_000_000u128));
	}

	#[tokio::test]
	async fn test_verify_mints_and_removes_upload() {
		let dir = tempfile::tempdir().unwrap();
		let mock = Arc::new(MockDelivery::new());
		let ocr = Arc::new(FakeOcr::default());
		let state = state(dir.path(), Ok("2.5"), mock.clone(), ocr.clone());

		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "cleanup")],
			Some(b"fake image"),
		);
		let (status, response) = post(state, body).await;

		assert_eq!(status, StatusCode::OK, "{}", response);
		assert_eq!(response["tokens"], 25.0);
		assert!(response["txHash"].is_string());

		let call = IDRTToken::mintCall::abi_decode(&mock.submitted()[0].data).unwrap();
		assert_eq!(call.to, addr(0x77));
		assert_eq!(call.amount, U256::from(25_000_000_000_000_000_000u128));

		let seen = ocr.seen.lock().unwrap();
		assert_eq!(seen.len(), 1);
		assert!(seen[0].1, "upload existed during OCR");
		assert!(!seen[0].0.exists(), "upload removed afterwards");
	}

	#[tokio::test]
	async fn test_verify_zero_value_mints_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let mock = Arc::new(MockDelivery::new());
		let state = state(dir.path(), Ok("unknown"), mock.clone(), Arc::new(FakeOcr::default()));

		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "x")],
			Some(b"img"),
		);
		let (status, response) = post(state, body).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(response["txHash"], serde_json::Value::Null);
		assert!(mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_verify_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let state = state(dir.path(), Ok("1"), Arc::new(MockDelivery::new()), Arc::new(FakeOcr::default()));
		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "x")],
			None,
		);
		let (status, response) = post(state, body).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(response["error"], MISSING_FIELDS);
	}

	#[tokio::test]
	async fn test_verify_model_failure_is_bad_gateway() {
		let dir = tempfile::tempdir().unwrap();
		let mock = Arc::new(MockDelivery::new());
		let state = state(dir.path(), Err("rate limited"), mock.clone(), Arc::new(FakeOcr::default()));
		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "x")],
			Some(b"img"),
		);
		let (status, _) = post(state, body).await;
		assert_eq!(status, StatusCode::BAD_GATEWAY);
		assert!(mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_verify_rejects_oversized_upload() {
		let dir = tempfile::tempdir().unwrap();
		let state = state(dir.path(), Ok("1"), Arc::new(MockDelivery::new()), Arc::new(FakeOcr::default()));
		let body = multipart_body(
			&[("walletAddress", &format_address(&addr(0x77))), ("description", "x")],
			Some(&[0u8; 4096]),
		);
		let (status, _) = post(state, body).await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}
}
