//! Common types module for the EcoSpin order backend.
//!
//! This module defines the core data types shared by every crate in the
//! workspace: the order record and its lifecycle status, the HTTP API
//! request/response shapes, and the configuration validation framework
//! used by pluggable implementations.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order record and lifecycle status.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secret string wrapper for credentials.
pub mod secret_string;
/// Aggregate counters over a set of orders.
pub mod summary;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support {
	use crate::{Order, OrderStatus};
	use chrono::{TimeZone, Utc};

	pub fn order(id: &str, price: u64, status: OrderStatus) -> Order {
		let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
		Order {
			id: id.to_string(),
			service: "Carpet Cleaning - 5 by 8".to_string(),
			price,
			customer_name: "Wanjiru".to_string(),
			customer_phone: "0712345678".to_string(),
			address: "Kilimani, Nairobi".to_string(),
			notes: String::new(),
			status,
			payment_method: "manual_mpesa".to_string(),
			mpesa_code: None,
			admin_notes: String::new(),
			created_at: created,
			updated_at: created,
			paid_at: None,
			pickup_scheduled: false,
			pickup_date: None,
			delivery_date: None,
		}
	}
}

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use summary::{HealthSummary, OrderSummary};
pub use validation::*;
