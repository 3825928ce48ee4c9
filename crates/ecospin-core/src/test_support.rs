//! Shared helpers for unit tests.

use crate::engine::OrderEngine;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ecospin_config::Config;
use ecospin_notify::implementations::log::LogNotifierSchema;
use ecospin_notify::{
	BusinessDetails, NotificationError, NotificationInterface, NotificationService,
	NotificationSettings, OutgoingMessage,
};
use ecospin_storage::implementations::memory::MemoryStorage;
use ecospin_storage::{OrderStoreInterface, StorageService};
use ecospin_types::{ConfigSchema, Order, OrderStatus};
use std::sync::{Arc, Mutex};

/// Transport that records messages and optionally fails.
#[derive(Default)]
pub struct RecordingTransport {
	pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
	pub fail: bool,
}

#[async_trait]
impl NotificationInterface for RecordingTransport {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn deliver(&self, message: &OutgoingMessage) -> Result<(), NotificationError> {
		if self.fail {
			return Err(NotificationError::Transport("relay unreachable".into()));
		}
		self.sent.lock().unwrap().push(message.clone());
		Ok(())
	}
}

fn business(config: &Config) -> BusinessDetails {
	BusinessDetails {
		name: config.business.name.clone(),
		mpesa_number: config.business.mpesa_number.clone(),
	}
}

/// Engine over a fresh in-memory store with notifications disabled.
pub fn engine(config: Config) -> OrderEngine {
	engine_with(config, None)
}

/// Engine over `backend` with notifications disabled.
pub fn engine_on(config: Config, backend: Box<dyn OrderStoreInterface>) -> OrderEngine {
	let notifications = NotificationService::disabled(business(&config));
	OrderEngine::new(
		config,
		Arc::new(StorageService::new(backend)),
		Arc::new(notifications),
	)
}

/// Engine over a fresh in-memory store using `transport` when given.
pub fn engine_with(config: Config, transport: Option<RecordingTransport>) -> OrderEngine {
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	let notifications = match transport {
		Some(transport) => NotificationService::new(
			Some(Box::new(transport)),
			NotificationSettings {
				admin_email: Some("admin@ecospin.co.ke".to_string()),
				from_address: "orders@ecospin.local".to_string(),
				business: business(&config),
			},
		),
		None => NotificationService::disabled(business(&config)),
	};
	OrderEngine::new(config, storage, Arc::new(notifications))
}

pub fn base_time() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
}

/// Builds an order created `minutes` after the base time.
pub fn order_at(id: &str, minutes: i64) -> Order {
	let created = base_time() + Duration::minutes(minutes);
	Order {
		id: id.to_string(),
		service: "Shirts - Wash and Iron".to_string(),
		price: 150,
		customer_name: "Kamau".to_string(),
		customer_phone: "0733444555".to_string(),
		address: "South B, Nairobi".to_string(),
		notes: String::new(),
		status: OrderStatus::PendingPayment,
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
