//! Dashboard counters computed over a set of orders.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Counts and revenue totals shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
	pub total: usize,
	pub pending: usize,
	pub paid: usize,
	pub in_progress: usize,
	pub completed: usize,
	#[serde(rename = "totalRevenue")]
	pub total_revenue: u64,
	#[serde(rename = "pendingRevenue")]
	pub pending_revenue: u64,
}

impl OrderSummary {
	pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
		let mut summary = Self::default();
		for order in orders {
			summary.total += 1;
			match order.status {
				OrderStatus::PendingPayment => {
					summary.pending += 1;
					summary.pending_revenue = summary.pending_revenue.saturating_add(order.price);
				}
				OrderStatus::Paid => summary.paid += 1,
				OrderStatus::Delivered => summary.completed += 1,
				status if status.is_in_progress() => summary.in_progress += 1,
				_ => {}
			}
			if order.status.counts_as_revenue() {
				summary.total_revenue = summary.total_revenue.saturating_add(order.price);
			}
		}
		summary
	}
}

/// Counter subset reported by the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
	pub total: usize,
	pub pending: usize,
	pub paid: usize,
	pub in_progress: usize,
	pub completed: usize,
}

impl From<&OrderSummary> for HealthSummary {
	fn from(summary: &OrderSummary) -> Self {
		Self {
			total: summary.total,
			pending: summary.pending,
			paid: summary.paid,
			in_progress: summary.in_progress,
			completed: summary.completed,
		}
	}
}
