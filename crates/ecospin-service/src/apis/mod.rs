//! HTTP handlers for the order API.

pub mod export;
pub mod health;
pub mod orders;

use axum::extract::rejection::JsonRejection;
use ecospin_core::OrderError;
use ecospin_types::APIError;

/// Maps an engine error onto the API error taxonomy.
///
/// Infrastructure failures are logged here and reported with the generic
/// `failure` message only.
pub(crate) fn order_error(err: OrderError, failure: &str) -> APIError {
	match err {
		OrderError::MissingFields(_) => APIError::bad_request("MISSING_FIELDS", err.to_string()),
		OrderError::InvalidPrice(_) => APIError::bad_request("INVALID_PRICE", err.to_string()),
		OrderError::InvalidStatus(_) => APIError::bad_request("INVALID_STATUS", "Invalid status"),
		OrderError::InvalidTransition { .. } => {
			APIError::bad_request("INVALID_TRANSITION", err.to_string())
		}
		OrderError::NotFound(_) => APIError::not_found("ORDER_NOT_FOUND", "Order not found"),
		OrderError::AlreadyPaid(_) => {
			APIError::bad_request("ALREADY_PAID", "Order is already marked as paid")
		}
		OrderError::DuplicateId(_) | OrderError::StorageUnavailable(_) => {
			tracing::error!(error = %err, "{}", failure);
			APIError::internal("INTERNAL_ERROR", failure)
		}
	}
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> APIError {
	APIError::bad_request("INVALID_REQUEST", rejection.body_text())
}
