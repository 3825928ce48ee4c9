//! Data export endpoints: CSV download and full JSON backup.

use super::order_error;
use crate::server::AppState;
use axum::{
	extract::State,
	http::header,
	response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use ecospin_types::{APIError, Order};

const CSV_HEADER: &str = "Order ID,Customer Name,Phone,Service,Amount,Status,Address,Notes,Admin Notes,Created At,Paid At,Updated At";

fn quoted(value: &str) -> String {
	format!("\"{}\"", value.replace('"', "\"\""))
}

fn timestamp(value: &DateTime<Utc>) -> String {
	value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders orders as CSV, one row per order in the given order.
pub fn render_csv(orders: &[Order]) -> String {
	let mut csv = String::from(CSV_HEADER);
	for order in orders {
		let row = [
			order.id.clone(),
			quoted(&order.customer_name),
			order.customer_phone.clone(),
			quoted(&order.service),
			order.price.to_string(),
			order.status.to_string(),
			quoted(&order.address),
			quoted(&order.notes),
			quoted(&order.admin_notes),
			timestamp(&order.created_at),
			order.paid_at.as_ref().map(timestamp).unwrap_or_default(),
			timestamp(&order.updated_at),
		];
		csv.push('\n');
		csv.push_str(&row.join(","));
	}
	csv
}

fn attachment(filename: String) -> String {
	format!("attachment; filename=\"{}\"", filename)
}

/// Handles GET /api/export/csv requests.
pub async fn export_csv(State(state): State<AppState>) -> Response {
	let (orders, _) = state.engine.list_orders().await;
	let filename = format!("ecospin_orders_{}.csv", Utc::now().format("%Y-%m-%d"));
	tracing::info!(orders = orders.len(), "Exporting orders as CSV");

	(
		[
			(header::CONTENT_TYPE, "text/csv".to_string()),
			(header::CONTENT_DISPOSITION, attachment(filename)),
		],
		render_csv(&orders),
	)
		.into_response()
}

/// Handles GET /api/backup requests.
pub async fn backup(State(state): State<AppState>) -> Result<Response, APIError> {
	let snapshot = state
		.engine
		.backup_snapshot()
		.await
		.map_err(|e| order_error(e, "Failed to create backup"))?;
	let filename = format!("ecospin_backup_{}.json", Utc::now().format("%Y-%m-%d"));

	Ok((
		[(header::CONTENT_DISPOSITION, attachment(filename))],
		Json(snapshot),
	)
		.into_response())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use ecospin_types::OrderStatus;

	#[test]
	fn test_render_csv_quotes_text_fields() {
		let created = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
		let order = Order {
			id: "ECOSPIN-0003".to_string(),
			service: "Curtains - \"Heavy\"".to_string(),
			price: 800,
			customer_name: "Mwangi, J.".to_string(),
			customer_phone: "0700000001".to_string(),
			address: "Kileleshwa".to_string(),
			notes: String::new(),
			status: OrderStatus::Paid,
			payment_method: "manual_mpesa".to_string(),
			mpesa_code: Some("QAB12CD34".to_string()),
			admin_notes: "Paid in full".to_string(),
			created_at: created,
			updated_at: created,
			paid_at: Some(created),
			pickup_scheduled: false,
			pickup_date: None,
			delivery_date: None,
		};

		let csv = render_csv(&[order]);
		let lines: Vec<&str> = csv.lines().collect();
		assert_eq!(lines[0], CSV_HEADER);
		assert_eq!(
			lines[1],
			"ECOSPIN-0003,\"Mwangi, J.\",0700000001,\"Curtains - \"\"Heavy\"\"\",800,paid,\"Kileleshwa\",\"\",\"Paid in full\",2025-06-02T08:00:00.000Z,2025-06-02T08:00:00.000Z,2025-06-02T08:00:00.000Z"
		);
	}

	#[test]
	fn test_render_csv_empty() {
		assert_eq!(render_csv(&[]), CSV_HEADER);
	}
}
