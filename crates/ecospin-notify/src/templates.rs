//! Plain-text message templates for order lifecycle events.

use chrono::{DateTime, Utc};
use ecospin_types::{Order, OrderStatus};

/// The lifecycle event a message is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
	/// A customer submitted a new order.
	NewOrderAdmin,
	/// An admin confirmed the M-Pesa payment.
	PaymentConfirmed,
	/// An admin moved the order to a different status.
	StatusUpdate,
}

impl NotificationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			NotificationKind::NewOrderAdmin => "new_order_admin",
			NotificationKind::PaymentConfirmed => "payment_confirmed",
			NotificationKind::StatusUpdate => "status_update",
		}
	}
}

/// Business details embedded in every message.
#[derive(Debug, Clone)]
pub struct BusinessDetails {
	pub name: String,
	pub mpesa_number: String,
}

/// Rendered subject and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
	pub subject: String,
	pub body: String,
}

fn format_time(value: &DateTime<Utc>) -> String {
	value.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Renders the message for `kind`.
///
/// `old_status` is only used by [`NotificationKind::StatusUpdate`]; when it
/// is absent the previous status is shown as unknown.
pub fn render(
	kind: NotificationKind,
	order: &Order,
	old_status: Option<OrderStatus>,
	business: &BusinessDetails,
) -> RenderedMessage {
	match kind {
		NotificationKind::NewOrderAdmin => new_order_admin(order, business),
		NotificationKind::PaymentConfirmed => payment_confirmed(order, business),
		NotificationKind::StatusUpdate => status_update(order, old_status, business),
	}
}

fn new_order_admin(order: &Order, business: &BusinessDetails) -> RenderedMessage {
	let instructions = order.mpesa_instructions(&business.mpesa_number);
	let mut lines = vec![
		"New order received!".to_string(),
		String::new(),
		format!("Order ID: {}", order.id),
		format!("Service: {}", order.service),
		format!("Amount: KSH {}", order.price),
		format!("Status: {}", order.status.label()),
		String::new(),
		format!("Customer: {}", order.customer_name),
		format!("Phone: {}", order.customer_phone),
		format!("Address: {}", order.address),
	];
	if !order.notes.is_empty() {
		lines.push(format!("Notes: {}", order.notes));
	}
	lines.extend([
		String::new(),
		"Payment instructions:".to_string(),
		format!("  Phone: {}", instructions.phone_number),
		format!("  Amount: KSH {}", instructions.amount),
		format!("  Reference: {}", instructions.reference),
		String::new(),
		"Next steps: wait for the M-Pesa payment, then mark the order as paid.".to_string(),
		format!("Order created at: {}", format_time(&order.created_at)),
	]);

	RenderedMessage {
		subject: format!("New Order #{} - {}", order.id, business.name),
		body: lines.join("\n"),
	}
}

fn payment_confirmed(order: &Order, business: &BusinessDetails) -> RenderedMessage {
	let paid_at = order.paid_at.as_ref().unwrap_or(&order.updated_at);
	let body = format!(
		"Payment received for order {id}.\n\n\
		 Service: {service}\n\
		 Amount paid: KSH {price}\n\
		 Payment time: {time}\n\
		 M-Pesa code: {code}\n\n\
		 Thank you for choosing {business}!",
		id = order.id,
		service = order.service,
		price = order.price,
		time = format_time(paid_at),
		code = order.mpesa_code.as_deref().unwrap_or("not provided"),
		business = business.name,
	);

	RenderedMessage {
		subject: format!("Payment Confirmed - Order #{}", order.id),
		body,
	}
}

fn status_update(
	order: &Order,
	old_status: Option<OrderStatus>,
	business: &BusinessDetails,
) -> RenderedMessage {
	let previous = old_status
		.map(|s| s.label())
		.unwrap_or_else(|| "UNKNOWN".to_string());
	let mut lines = vec![
		format!("Order {} has been updated.", order.id),
		String::new(),
		format!("Previous status: {}", previous),
		format!("New status: {}", order.status.label()),
		format!("Updated: {}", format_time(&order.updated_at)),
	];
	if !order.admin_notes.is_empty() {
		lines.push(format!("Note: {}", order.admin_notes));
	}
	lines.push(String::new());
	lines.push(format!("Thank you for choosing {}!", business.name));

	RenderedMessage {
		subject: format!("Order Update - {} - {}", order.id, order.status.label()),
		body: lines.join("\n"),
	}
}
