//! Order engine that drives the order lifecycle.
//!
//! The engine owns the store, the cache, the identifier allocator and the
//! notification service. Every public operation validates its input, applies
//! the change through the [`OrderStateMachine`] and, once the change is
//! durable, hands any notification off to a detached task.

pub mod lifecycle;

use crate::allocator::IdAllocator;
use crate::cache::OrderCache;
use crate::state::{OrderStateError, OrderStateMachine};
use chrono::Utc;
use ecospin_config::Config;
use ecospin_notify::{NotificationKind, NotificationService};
use ecospin_storage::{PersistenceInfo, StorageError, StorageService};
use ecospin_types::{
	BackupSnapshot, CreateOrderRequest, Order, OrderStatus, OrderSummary, PriceInput,
	UpdateStatusRequest,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

pub use lifecycle::BackgroundTasks;

/// Snapshot format version written by [`OrderEngine::backup_snapshot`].
pub const BACKUP_VERSION: &str = "1.0";

/// Errors surfaced by order operations.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Missing required fields: {}", .0.join(", "))]
	MissingFields(Vec<String>),
	#[error("Invalid price: {0}")]
	InvalidPrice(String),
	#[error("Invalid status: {0}")]
	InvalidStatus(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order {0} is already marked as paid")]
	AlreadyPaid(String),
	#[error("Duplicate order id: {0}")]
	DuplicateId(String),
	#[error("Storage unavailable: {0}")]
	StorageUnavailable(String),
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => OrderError::NotFound(id),
			StorageError::DuplicateId(id) => OrderError::DuplicateId(id),
			other => OrderError::StorageUnavailable(other.to_string()),
		}
	}
}

impl From<OrderStateError> for OrderError {
	fn from(err: OrderStateError) -> Self {
		match err {
			OrderStateError::Storage(e) => e.into(),
			OrderStateError::InvalidTransition { from, to } => {
				OrderError::InvalidTransition { from, to }
			}
			OrderStateError::OrderNotFound(id) => OrderError::NotFound(id),
			OrderStateError::AlreadyPaid(id) => OrderError::AlreadyPaid(id),
			OrderStateError::InvalidStatus(status) => OrderError::InvalidStatus(status),
		}
	}
}

/// Main engine coordinating order persistence, caching and notifications.
#[derive(Clone)]
pub struct OrderEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) cache: Arc<OrderCache>,
	pub(crate) allocator: Arc<IdAllocator>,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) notifications: Arc<NotificationService>,
}

fn blank(value: &Option<String>) -> bool {
	value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn price_text(price: &PriceInput) -> String {
	match price {
		PriceInput::Integer(value) => value.to_string(),
		PriceInput::Float(value) => value.to_string(),
		PriceInput::Text(text) => text.clone(),
	}
}

impl OrderEngine {
	/// Creates a new engine over the given services.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifications: Arc<NotificationService>,
	) -> Self {
		let cache = Arc::new(OrderCache::new());
		let allocator = Arc::new(IdAllocator::new(
			storage.clone(),
			config.business.order_prefix.clone(),
		));
		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			cache.clone(),
			config.lifecycle.transition_policy,
		));

		Self {
			config,
			storage,
			cache,
			allocator,
			state_machine,
			notifications,
		}
	}

	/// Validates a submission, allocates an id and persists a new order.
	#[instrument(skip_all, fields(order_id = tracing::field::Empty))]
	pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
		let mut missing = Vec::new();
		if blank(&request.service) {
			missing.push("service".to_string());
		}
		if request.price.as_ref().is_none_or(|p| p.is_blank()) {
			missing.push("price".to_string());
		}
		if blank(&request.name) {
			missing.push("name".to_string());
		}
		if blank(&request.phone) {
			missing.push("phone".to_string());
		}
		if blank(&request.address) {
			missing.push("address".to_string());
		}

		let (Some(service), Some(price), Some(name), Some(phone), Some(address)) = (
			request.service,
			request.price,
			request.name,
			request.phone,
			request.address,
		) else {
			return Err(OrderError::MissingFields(missing));
		};
		if !missing.is_empty() {
			return Err(OrderError::MissingFields(missing));
		}

		let price = price
			.to_amount()
			.ok_or_else(|| OrderError::InvalidPrice(price_text(&price)))?;

		let id = self.allocator.allocate().await?;
		tracing::Span::current().record("order_id", id.as_str());

		let now = Utc::now();
		let order = Order {
			id,
			service,
			price,
			customer_name: name,
			customer_phone: phone,
			address,
			notes: request.notes.unwrap_or_default(),
			status: OrderStatus::PendingPayment,
			payment_method: self.config.business.payment_method.clone(),
			mpesa_code: None,
			admin_notes: String::new(),
			created_at: now,
			updated_at: now,
			paid_at: None,
			pickup_scheduled: request.pickup_date.is_some(),
			pickup_date: request.pickup_date,
			delivery_date: None,
		};

		self.state_machine.create_order(&order).await?;
		tracing::info!(service = %order.service, price = order.price, "Order created");

		self.notifications
			.dispatch(NotificationKind::NewOrderAdmin, order.clone(), None);

		Ok(order)
	}

	/// Marks an order as paid, recording the M-Pesa code when one is given.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn confirm_payment(
		&self,
		order_id: &str,
		mpesa_code: Option<String>,
	) -> Result<Order, OrderError> {
		let mpesa_code = mpesa_code.filter(|code| !code.trim().is_empty());

		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				if order.status == OrderStatus::Paid {
					return Err(OrderStateError::AlreadyPaid(order.id.clone()));
				}
				self.state_machine
					.check_transition(order.status, OrderStatus::Paid)?;

				order.status = OrderStatus::Paid;
				if !order.has_been_paid() {
					order.paid_at = Some(Utc::now());
				}
				if let Some(code) = mpesa_code {
					order.mpesa_code = Some(code);
				}
				Ok(())
			})
			.await?;

		tracing::info!(mpesa_code = ?order.mpesa_code, "Payment confirmed");

		self.notifications
			.dispatch(NotificationKind::PaymentConfirmed, order.clone(), None);

		Ok(order)
	}

	/// Moves an order to a new lifecycle status.
	///
	/// Unknown orders are reported before unknown statuses.
	#[instrument(skip_all, fields(order_id = %order_id, status = %request.status))]
	pub async fn update_status(
		&self,
		order_id: &str,
		request: UpdateStatusRequest,
	) -> Result<Order, OrderError> {
		let target = request.status.parse::<OrderStatus>();
		let admin_notes = request.admin_notes.filter(|notes| !notes.is_empty());
		let mut previous = None;

		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				let target = target.map_err(|e| OrderStateError::InvalidStatus(e.0))?;
				self.state_machine.check_transition(order.status, target)?;

				previous = Some(order.status);
				if target == OrderStatus::Paid
					&& order.status != OrderStatus::Paid
					&& !order.has_been_paid()
				{
					order.paid_at = Some(Utc::now());
				}
				order.status = target;

				if let Some(notes) = admin_notes {
					order.admin_notes = notes;
				}
				if let Some(pickup_date) = request.pickup_date {
					order.pickup_date = Some(pickup_date);
					order.pickup_scheduled = true;
				}
				if let Some(delivery_date) = request.delivery_date {
					order.delivery_date = Some(delivery_date);
				}
				Ok(())
			})
			.await?;

		tracing::info!(previous = ?previous, "Order status updated");

		if let Some(old_status) = previous {
			if request.notify_customer && old_status != order.status {
				self.notifications.dispatch(
					NotificationKind::StatusUpdate,
					order.clone(),
					Some(old_status),
				);
			}
		}

		Ok(order)
	}

	/// Permanently removes an order from the store and the cache.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn delete_order(&self, order_id: &str) -> Result<(), OrderError> {
		self.state_machine.delete_order(order_id).await?;
		tracing::info!("Order deleted");
		Ok(())
	}

	/// Reads one order from the cache.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
		self.cache
			.get(order_id)
			.await
			.ok_or_else(|| OrderError::NotFound(order_id.to_string()))
	}

	/// Returns every cached order, newest first, together with the summary.
	pub async fn list_orders(&self) -> (Vec<Order>, OrderSummary) {
		let orders = self.cache.list_all().await;
		let summary = OrderSummary::from_orders(&orders);
		(orders, summary)
	}

	pub async fn summary(&self) -> OrderSummary {
		OrderSummary::from_orders(&self.cache.list_all().await)
	}

	/// Full dump of the cached orders and the persisted counter.
	pub async fn backup_snapshot(&self) -> Result<BackupSnapshot, OrderError> {
		let counter = self.storage.current_counter().await?;
		let orders = self
			.cache
			.list_all()
			.await
			.into_iter()
			.map(|order| (order.id.clone(), order))
			.collect();

		Ok(BackupSnapshot {
			timestamp: Utc::now(),
			counter,
			orders,
			version: BACKUP_VERSION.to_string(),
		})
	}

	pub fn persistence(&self) -> PersistenceInfo {
		self.storage.describe()
	}

	pub fn notifications_configured(&self) -> bool {
		self.notifications.is_configured()
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn cache(&self) -> &Arc<OrderCache> {
		&self.cache
	}
}
