//! Order endpoints: creation, payment confirmation, status updates,
//! retrieval and deletion.

use super::{json_rejection, order_error};
use crate::server::AppState;
use axum::{
	body::Bytes,
	extract::{rejection::JsonRejection, Path, State},
	response::Json,
};
use ecospin_types::{
	APIError, ConfirmPaymentRequest, CreateOrderRequest, CreateOrderResponse, CreatedOrder,
	DeleteOrderResponse, ListOrdersResponse, OrderResponse, UpdateStatusRequest,
};

/// Handles POST /api/create-order requests.
pub async fn create_order(
	State(state): State<AppState>,
	payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, APIError> {
	let Json(request) = payload.map_err(json_rejection)?;

	let order = state
		.engine
		.create_order(request)
		.await
		.map_err(|e| order_error(e, "Failed to create order"))?;

	let business_number = &state.engine.config().business.mpesa_number;
	Ok(Json(CreateOrderResponse {
		success: true,
		message: "Order created successfully".to_string(),
		order: CreatedOrder {
			mpesa_instructions: order.mpesa_instructions(business_number),
			id: order.id,
			service: order.service,
			price: order.price,
			status: order.status,
			created_at: order.created_at,
		},
	}))
}

/// Handles POST /api/confirm-payment/{order_id} requests.
///
/// The body is optional; an empty body confirms without an M-Pesa code.
pub async fn confirm_payment(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
	body: Bytes,
) -> Result<Json<OrderResponse>, APIError> {
	let request = if body.iter().all(u8::is_ascii_whitespace) {
		ConfirmPaymentRequest::default()
	} else {
		serde_json::from_slice::<ConfirmPaymentRequest>(&body)
			.map_err(|e| APIError::bad_request("INVALID_REQUEST", e.to_string()))?
	};

	let order = state
		.engine
		.confirm_payment(&order_id, request.mpesa_code)
		.await
		.map_err(|e| order_error(e, "Failed to confirm payment"))?;

	Ok(Json(OrderResponse {
		success: true,
		message: Some("Payment confirmed successfully".to_string()),
		order,
	}))
}

/// Handles GET /api/order/{order_id} requests.
pub async fn get_order(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, APIError> {
	let order = state
		.engine
		.get_order(&order_id)
		.await
		.map_err(|e| order_error(e, "Failed to fetch order"))?;

	Ok(Json(OrderResponse {
		success: true,
		message: None,
		order,
	}))
}

/// Handles GET /api/orders requests.
pub async fn list_orders(State(state): State<AppState>) -> Json<ListOrdersResponse> {
	let (orders, summary) = state.engine.list_orders().await;
	Json(ListOrdersResponse {
		success: true,
		orders,
		summary,
	})
}

/// Handles PUT /api/order/{order_id}/status requests.
pub async fn update_status(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
	payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, APIError> {
	let Json(request) = payload.map_err(json_rejection)?;

	let order = state
		.engine
		.update_status(&order_id, request)
		.await
		.map_err(|e| order_error(e, "Failed to update order status"))?;

	Ok(Json(OrderResponse {
		success: true,
		message: Some("Order status updated".to_string()),
		order,
	}))
}

/// Handles DELETE /api/order/{order_id} requests.
pub async fn delete_order(
	State(state): State<AppState>,
	Path(order_id): Path<String>,
) -> Result<Json<DeleteOrderResponse>, APIError> {
	state
		.engine
		.delete_order(&order_id)
		.await
		.map_err(|e| order_error(e, "Failed to delete order"))?;

	Ok(Json(DeleteOrderResponse {
		success: true,
		message: "Order deleted successfully".to_string(),
	}))
}
