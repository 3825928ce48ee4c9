//! Order record types for the laundry order lifecycle.
//!
//! An order is created from a customer's web-form submission, reconciled by
//! an admin once the mobile-money payment arrives, and then moved through the
//! pickup and delivery stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single customer service request with its payment and fulfillment state.
///
/// Customer-supplied fields and `price` are fixed at creation. Only the
/// lifecycle fields (`status`, `mpesa_code`, `admin_notes`, timestamps and
/// scheduling metadata) change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Identifier in `PREFIX-NNNN` form, assigned by the allocator.
	pub id: String,
	/// Description of the purchased service.
	pub service: String,
	/// Price in whole currency units.
	pub price: u64,
	pub customer_name: String,
	pub customer_phone: String,
	pub address: String,
	#[serde(default)]
	pub notes: String,
	pub status: OrderStatus,
	/// Payment channel for this deployment (e.g. "manual_mpesa").
	pub payment_method: String,
	/// M-Pesa transaction code recorded on payment confirmation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mpesa_code: Option<String>,
	/// Admin-supplied note, replaced on every update that carries one.
	#[serde(default)]
	pub admin_notes: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(default)]
	pub paid_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub pickup_scheduled: bool,
	#[serde(default)]
	pub pickup_date: Option<DateTime<Utc>>,
	#[serde(default)]
	pub delivery_date: Option<DateTime<Utc>>,
}

impl Order {
	/// Payment instructions shown to the customer after submission.
	pub fn mpesa_instructions(&self, business_number: &str) -> MpesaInstructions {
		MpesaInstructions {
			amount: self.price,
			phone_number: business_number.to_string(),
			reference: self.id.clone(),
		}
	}

	/// Returns true once the order has been marked as paid at least once.
	pub fn has_been_paid(&self) -> bool {
		self.paid_at.is_some()
	}
}

/// Where and how much the customer should send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpesaInstructions {
	pub amount: u64,
	pub phone_number: String,
	pub reference: String,
}

/// Error returned when a status string is not one of the seven stages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle stage of an order.
///
/// The serialized form (`pending_payment`, `paid`, ...) is what gets
/// persisted and what the HTTP API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order submitted, waiting for the customer's payment.
	PendingPayment,
	/// Payment reconciled by an admin.
	Paid,
	PickupScheduled,
	PickedUp,
	InProgress,
	ReadyForDelivery,
	/// Returned to the customer.
	Delivered,
}

impl OrderStatus {
	/// Returns the persisted string form of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::PendingPayment => "pending_payment",
			OrderStatus::Paid => "paid",
			OrderStatus::PickupScheduled => "pickup_scheduled",
			OrderStatus::PickedUp => "picked_up",
			OrderStatus::InProgress => "in_progress",
			OrderStatus::ReadyForDelivery => "ready_for_delivery",
			OrderStatus::Delivered => "delivered",
		}
	}

	/// Returns an iterator over all statuses in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::PendingPayment,
			Self::Paid,
			Self::PickupScheduled,
			Self::PickedUp,
			Self::InProgress,
			Self::ReadyForDelivery,
			Self::Delivered,
		]
		.into_iter()
	}

	/// Position of the status in the nominal lifecycle, starting at 0.
	pub fn stage(&self) -> usize {
		*self as usize
	}

	/// Human-readable label used in notifications, e.g. "READY FOR DELIVERY".
	pub fn label(&self) -> String {
		self.as_str().replace('_', " ").to_uppercase()
	}

	/// Statuses whose price counts toward collected revenue.
	pub fn counts_as_revenue(&self) -> bool {
		matches!(self, OrderStatus::Paid | OrderStatus::Delivered)
	}

	/// Statuses grouped as "in progress" on the dashboard.
	pub fn is_in_progress(&self) -> bool {
		matches!(
			self,
			OrderStatus::PickupScheduled | OrderStatus::PickedUp | OrderStatus::InProgress
		)
	}
}

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| UnknownStatus(s.to_string()))
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Renders an order identifier from a prefix and counter value.
///
/// The number is zero-padded to four digits; larger values simply widen.
pub fn format_order_id(prefix: &str, value: u64) -> String {
	format!("{}-{:04}", prefix, value)
}
