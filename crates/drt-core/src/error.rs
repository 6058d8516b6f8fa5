//! Error type shared by every HTTP handler.
//!
//! Errors render as `{"success": false, "error": <message>, "details": <cause>}`
//! with the status code chosen by the variant.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drt_delivery::DeliveryError;
use drt_dex::DexError;
use drt_integrations::IntegrationError;
use drt_types::UnitsError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
	/// Missing or malformed request input.
	#[error("{0}")]
	BadRequest(String),
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	PayloadTooLarge(String),
	/// A contract or integration the handler needs is not configured.
	#[error("{0}")]
	Unavailable(String),
	/// An external API call failed.
	#[error("{message}")]
	Upstream { message: String, details: String },
	/// A chain read or transaction failed.
	#[error("{message}")]
	Chain { message: String, details: String },
	#[error("{0}")]
	Internal(String),
}

impl ApiError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		ApiError::BadRequest(message.into())
	}

	/// Chain failure with a handler-specific headline, e.g. "Swap failed".
	pub fn chain(message: &str, error: impl std::fmt::Display) -> Self {
		ApiError::Chain {
			message: message.to_string(),
			details: error.to_string(),
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
			ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
			ApiError::Chain { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn details(&self) -> Option<&str> {
		match self {
			ApiError::Upstream { details, .. } | ApiError::Chain { details, .. } => Some(details),
			_ => None,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			tracing::error!(status = %status, error = %self, details = ?self.details(), "Request failed");
		} else {
			tracing::debug!(status = %status, error = %self, "Request rejected");
		}

		let mut body = json!({ "success": false, "error": self.to_string() });
		if let Some(details) = self.details() {
			body["details"] = json!(details);
		}
		(status, Json(body)).into_response()
	}
}

impl From<DeliveryError> for ApiError {
	fn from(e: DeliveryError) -> Self {
		match e {
			DeliveryError::NoSigner => ApiError::Unavailable(e.to_string()),
			DeliveryError::Reverted(_) => ApiError::chain("Transaction reverted", e),
			_ => ApiError::chain("Blockchain request failed", e),
		}
	}
}

impl From<DexError> for ApiError {
	fn from(e: DexError) -> Self {
		match e {
			DexError::NoRouteFound(..) => ApiError::NotFound(e.to_string()),
			_ => ApiError::BadRequest(e.to_string()),
		}
	}
}

impl From<IntegrationError> for ApiError {
	fn from(e: IntegrationError) -> Self {
		match e {
			IntegrationError::NotConfigured(_) => ApiError::Unavailable(e.to_string()),
			IntegrationError::InvalidInput(_) => ApiError::BadRequest(e.to_string()),
			IntegrationError::Ocr(_) => ApiError::Internal(e.to_string()),
			_ => ApiError::Upstream {
				message: "External service request failed".to_string(),
				details: e.to_string(),
			},
		}
	}
}

impl From<UnitsError> for ApiError {
	fn from(e: UnitsError) -> Self {
		ApiError::BadRequest(e.to_string())
	}
}

impl From<JsonRejection> for ApiError {
	fn from(e: JsonRejection) -> Self {
		ApiError::BadRequest(e.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(e: QueryRejection) -> Self {
		ApiError::BadRequest(e.body_text())
	}
}

impl From<MultipartRejection> for ApiError {
	fn from(e: MultipartRejection) -> Self {
		ApiError::BadRequest(e.body_text())
	}
}

impl From<MultipartError> for ApiError {
	fn from(e: MultipartError) -> Self {
		if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
			ApiError::PayloadTooLarge(e.body_text())
		} else {
			ApiError::BadRequest(e.body_text())
		}
	}
}
