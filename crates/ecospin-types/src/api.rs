//! API types for the EcoSpin HTTP API.
//!
//! This module defines the request and response bodies for the order
//! endpoints along with the structured error type that maps failures onto
//! HTTP status codes.

use crate::{HealthSummary, MpesaInstructions, Order, OrderStatus, OrderSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest accepted price. Every backend must be able to store it as a
/// signed 64-bit integer.
pub const MAX_PRICE: u64 = i64::MAX as u64;

/// Price as submitted by a client.
///
/// Web forms post the price as a string while scripted clients send a
/// number, so both are accepted and normalized by [`PriceInput::to_amount`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
	Integer(i64),
	Float(f64),
	Text(String),
}

fn float_amount(value: f64) -> Option<u64> {
	// 2^63 is exactly representable; anything at or above it cannot fit.
	(value.is_finite() && value >= 0.0 && value < MAX_PRICE as f64).then(|| value.trunc() as u64)
}

impl PriceInput {
	/// Returns true when the client sent an empty string.
	pub fn is_blank(&self) -> bool {
		matches!(self, PriceInput::Text(s) if s.trim().is_empty())
	}

	/// Converts to a whole, non-negative amount no larger than [`MAX_PRICE`].
	///
	/// Fractional amounts are truncated. Returns `None` for negative,
	/// out-of-range, non-finite or non-numeric input.
	pub fn to_amount(&self) -> Option<u64> {
		match self {
			PriceInput::Integer(value) => u64::try_from(*value).ok(),
			PriceInput::Float(value) => float_amount(*value),
			PriceInput::Text(text) => {
				let text = text.trim();
				match text.parse::<u64>() {
					Ok(value) => (value <= MAX_PRICE).then_some(value),
					Err(_) => text.parse::<f64>().ok().and_then(float_amount),
				}
			}
		}
	}
}

/// Body of `POST /api/create-order`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	pub service: Option<String>,
	pub price: Option<PriceInput>,
	pub name: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub notes: Option<String>,
	/// Preferred pickup time, if the customer picked one.
	pub pickup_date: Option<DateTime<Utc>>,
}

/// Body of `POST /api/confirm-payment/{orderId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
	pub mpesa_code: Option<String>,
}

/// Body of `PUT /api/order/{orderId}/status`.
///
/// `status` is kept as a raw string so an unknown value is reported as an
/// invalid status rather than a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
	#[serde(default)]
	pub status: String,
	pub admin_notes: Option<String>,
	#[serde(default)]
	pub notify_customer: bool,
	pub pickup_date: Option<DateTime<Utc>>,
	pub delivery_date: Option<DateTime<Utc>>,
}

/// Subset of the order returned right after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
	pub id: String,
	pub service: String,
	pub price: u64,
	pub status: OrderStatus,
	pub created_at: DateTime<Utc>,
	pub mpesa_instructions: MpesaInstructions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
	pub success: bool,
	pub message: String,
	pub order: CreatedOrder,
}

/// Response carrying a full order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	pub success: bool,
	pub orders: Vec<Order>,
	pub summary: OrderSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOrderResponse {
	pub success: bool,
	pub message: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub timestamp: DateTime<Utc>,
	pub orders_summary: HealthSummary,
	pub mode: String,
	pub business_number: String,
	pub email_configured: bool,
	/// Description of the active storage backend.
	pub persistence: String,
	/// File directory or database location of the active backend.
	pub data_location: Option<String>,
}

/// Full data dump served by `GET /api/backup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
	pub timestamp: DateTime<Utc>,
	/// Next order number the allocator will issue.
	pub counter: u64,
	pub orders: BTreeMap<String, Order>,
	pub version: String,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub success: bool,
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest { error_type: String, message: String },
	/// Requested order or route does not exist (404)
	NotFound { error_type: String, message: String },
	/// Internal server error (500). The message must not carry backend detail.
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	pub fn not_found(error_type: &str, message: impl Into<String>) -> Self {
		APIError::NotFound {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	pub fn internal(error_type: &str, message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type, message),
		};
		ErrorResponse {
			success: false,
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			}
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = match self.status_code() {
			400 => StatusCode::BAD_REQUEST,
			404 => StatusCode::NOT_FOUND,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_price_input_accepts_numbers_and_strings() {
		let parsed: CreateOrderRequest =
			serde_json::from_str(r#"{"price": 249, "service": "Duvet"}"#).unwrap();
		assert_eq!(parsed.price.unwrap().to_amount(), Some(249));

		let parsed: CreateOrderRequest = serde_json::from_str(r#"{"price": "1500"}"#).unwrap();
		assert_eq!(parsed.price.unwrap().to_amount(), Some(1500));

		let parsed: CreateOrderRequest = serde_json::from_str(r#"{"price": 99.9}"#).unwrap();
		assert_eq!(parsed.price.unwrap().to_amount(), Some(99));
	}

	#[test]
	fn test_price_input_rejects_invalid_amounts() {
		assert_eq!(PriceInput::Integer(-5).to_amount(), None);
		assert_eq!(PriceInput::Text("abc".into()).to_amount(), None);
		assert_eq!(PriceInput::Text("-10".into()).to_amount(), None);
		assert!(PriceInput::Text("   ".into()).is_blank());
		assert!(!PriceInput::Integer(0).is_blank());
	}

	#[test]
	fn test_price_input_rejects_out_of_range_amounts() {
		assert_eq!(PriceInput::Text("1e30".into()).to_amount(), None);
		assert_eq!(PriceInput::Float(1e30).to_amount(), None);
		assert_eq!(PriceInput::Float(f64::INFINITY).to_amount(), None);
		assert_eq!(PriceInput::Text("18446744073709551615".into()).to_amount(), None);
		assert_eq!(
			PriceInput::Text("9223372036854775807".into()).to_amount(),
			Some(MAX_PRICE)
		);
		assert_eq!(PriceInput::Integer(i64::MAX).to_amount(), Some(MAX_PRICE));
		assert_eq!(PriceInput::Text("2.5e3".into()).to_amount(), Some(2500));
	}

	#[test]
	fn test_update_status_request_defaults() {
		let request: UpdateStatusRequest =
			serde_json::from_str(r#"{"status": "paid", "adminNotes": "Received"}"#).unwrap();
		assert_eq!(request.status, "paid");
		assert_eq!(request.admin_notes.as_deref(), Some("Received"));
		assert!(!request.notify_customer);
	}

	#[test]
	fn test_api_error_response_shape() {
		let err = APIError::not_found("ORDER_NOT_FOUND", "Order not found");
		assert_eq!(err.status_code(), 404);

		let body = serde_json::to_value(err.to_error_response()).unwrap();
		assert_eq!(body["success"], false);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");
		assert_eq!(body["message"], "Order not found");
	}
}
