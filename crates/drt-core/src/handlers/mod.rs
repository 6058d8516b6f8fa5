//! HTTP handlers, grouped by the contracts they drive.
//!
//! Handlers validate input, call one or two contracts through the
//! [`DeliveryService`](drt_delivery::DeliveryService), wait for confirmation
//! and answer with the transaction hash or the value read.

use crate::ApiError;
use alloy_primitives::{Address, TxHash, U256};
use axum::extract::{FromRequest, Request};
use axum::Json;
use drt_types::AmountInput;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod alive_ai;
pub mod market;
pub mod mesh;
pub mod resource;
pub mod token;
pub mod trade;

/// JSON body extractor whose rejection is rendered as an [`ApiError`].
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let Json(value) = Json::<T>::from_request(req, state).await?;
		Ok(Self(value))
	}
}

/// Response for handlers that send one transaction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxResponse {
	pub success: bool,
	pub tx_hash: TxHash,
}

impl TxResponse {
	pub fn new(tx_hash: TxHash) -> Self {
		Self {
			success: true,
			tx_hash,
		}
	}
}

/// Unwraps a required request field.
pub fn required<T>(value: Option<T>, message: &str) -> Result<T, ApiError> {
	value.ok_or_else(|| ApiError::bad_request(message))
}

/// Parses an address given in a path or query string.
pub fn parse_address(value: &str) -> Result<Address, ApiError> {
	value
		.trim()
		.parse()
		.map_err(|_| ApiError::bad_request(format!("Invalid address: {}", value)))
}

/// Parses a human-readable token amount (18 decimals) that must be above zero.
pub fn positive_amount(amount: Option<&AmountInput>, message: &str) -> Result<U256, ApiError> {
	let amount = amount
		.ok_or_else(|| ApiError::bad_request(message))?
		.to_units(drt_types::TOKEN_DECIMALS)
		.map_err(|_| ApiError::bad_request(message))?;
	if amount.is_zero() {
		return Err(ApiError::bad_request(message));
	}
	Ok(amount)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::AppState;
	use axum::body::Body;
	use axum::http::{Request as HttpRequest, StatusCode};
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::ConfigBuilder;
	use drt_types::Config;
	use http_body_util::BodyExt;
	use std::sync::Arc;
	use tower::ServiceExt;

	pub fn state_with(config: Config, mock: Arc<MockDelivery>) -> AppState {
		AppState::new(config, mock).unwrap()
	}

	pub fn default_state(mock: Arc<MockDelivery>) -> AppState {
		state_with(ConfigBuilder::new().build(), mock)
	}

	/// Sends a request through the full router and returns status and JSON body.
	pub async fn send(
		state: AppState,
		method: &str,
		uri: &str,
		body: Option<serde_json::Value>,
	) -> (StatusCode, serde_json::Value) {
		let request = HttpRequest::builder().method(method).uri(uri);
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};

		let response = crate::api::router(state).oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let json = serde_json::from_slice(&bytes)
			.unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
		(status, json)
	}

	#[test]
	fn test_positive_amount() {
		let msg = "Invalid amount";
		assert_eq!(
			positive_amount(Some(&AmountInput::from("1.5")), msg).unwrap(),
			U256::from(1_500_000_000_000_000_000u128)
		);
		assert!(positive_amount(Some(&AmountInput::from("0")), msg).is_err());
		assert!(positive_amount(Some(&AmountInput::from("-1")), msg).is_err());
		assert!(positive_amount(Some(&AmountInput::from("abc")), msg).is_err());
		assert!(positive_amount(None, msg).is_err());
	}
}
