//! Notification dispatch for the EcoSpin order backend.
//!
//! Lifecycle events (new order, payment confirmed, status change) produce a
//! plain-text message that is handed to the configured transport. Delivery
//! is best-effort: failures are logged and reported as `false`, never as an
//! error to the caller, and dispatch runs on a detached task so the order
//! mutation that triggered it never waits on the network.

use async_trait::async_trait;
use ecospin_types::{ConfigSchema, ImplementationRegistry, Order, OrderStatus};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

pub mod templates;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

pub use templates::{BusinessDetails, NotificationKind, RenderedMessage};

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
	/// Error that occurs while talking to the transport.
	#[error("Transport error: {0}")]
	Transport(String),
	/// Error that occurs when the transport refuses the message.
	#[error("Rejected by transport with status {status}: {message}")]
	Rejected { status: u16, message: String },
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// An outgoing message as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
	pub to: String,
	pub from: String,
	pub subject: String,
	pub text: String,
}

/// Trait defining the interface for notification transports.
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	/// Returns the configuration schema for this transport.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Delivers a single message.
	async fn deliver(&self, message: &OutgoingMessage) -> Result<(), NotificationError>;
}

/// Type alias for notification factory functions.
pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>;

/// Registry trait for notification implementations.
pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Get all registered notification implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Recipient and sender settings for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
	/// Inbox that receives every lifecycle message.
	pub admin_email: Option<String>,
	pub from_address: String,
	pub business: BusinessDetails,
}

/// Service that renders and dispatches lifecycle notifications.
pub struct NotificationService {
	transport: Option<Box<dyn NotificationInterface>>,
	settings: NotificationSettings,
}

impl NotificationService {
	pub fn new(
		transport: Option<Box<dyn NotificationInterface>>,
		settings: NotificationSettings,
	) -> Self {
		Self {
			transport,
			settings,
		}
	}

	/// A service with no transport. Every send is a no-op returning false.
	pub fn disabled(business: BusinessDetails) -> Self {
		Self::new(
			None,
			NotificationSettings {
				admin_email: None,
				from_address: String::new(),
				business,
			},
		)
	}

	/// Returns true when a transport and an admin recipient are both set.
	pub fn is_configured(&self) -> bool {
		self.transport.is_some() && self.admin_recipient().is_some()
	}

	pub fn admin_recipient(&self) -> Option<&str> {
		self.settings
			.admin_email
			.as_deref()
			.filter(|email| !email.trim().is_empty())
	}

	/// Renders and delivers one message, reporting success as a boolean.
	pub async fn send(
		&self,
		recipient: &str,
		kind: NotificationKind,
		order: &Order,
		old_status: Option<OrderStatus>,
	) -> bool {
		let Some(transport) = &self.transport else {
			tracing::debug!(kind = kind.as_str(), "No notification transport, skipping");
			return false;
		};

		let rendered = templates::render(kind, order, old_status, &self.settings.business);
		let message = OutgoingMessage {
			to: recipient.to_string(),
			from: self.settings.from_address.clone(),
			subject: rendered.subject,
			text: rendered.body,
		};

		match transport.deliver(&message).await {
			Ok(()) => {
				tracing::info!(
					order_id = %order.id,
					kind = kind.as_str(),
					to = %recipient,
					"Notification sent"
				);
				true
			}
			Err(e) => {
				tracing::warn!(
					order_id = %order.id,
					kind = kind.as_str(),
					error = %e,
					"Notification failed"
				);
				false
			}
		}
	}

	/// Sends to the admin recipient on a detached task.
	///
	/// Returns `None` without spawning when notifications are not configured.
	/// The returned handle may be dropped; the task keeps running.
	pub fn dispatch(
		self: &Arc<Self>,
		kind: NotificationKind,
		order: Order,
		old_status: Option<OrderStatus>,
	) -> Option<JoinHandle<bool>> {
		if !self.is_configured() {
			return None;
		}
		let service = Arc::clone(self);
		Some(tokio::spawn(async move {
			match service.admin_recipient() {
				Some(recipient) => {
					let recipient = recipient.to_string();
					service.send(&recipient, kind, &order, old_status).await
				}
				None => false,
			}
		}))
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use chrono::{TimeZone, Utc};
	use ecospin_types::{ConfigSchema, Schema, ValidationError};
	use std::sync::Mutex;

	/// Transport that records messages and optionally fails.
	#[derive(Default)]
	pub struct RecordingTransport {
		pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
		pub fail: bool,
	}

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[async_trait]
	impl NotificationInterface for RecordingTransport {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn deliver(&self, message: &OutgoingMessage) -> Result<(), NotificationError> {
			if self.fail {
				return Err(NotificationError::Transport("connection refused".into()));
			}
			self.sent.lock().unwrap().push(message.clone());
			Ok(())
		}
	}

	pub fn business() -> BusinessDetails {
		BusinessDetails {
			name: "EcoSpin Laundry".to_string(),
			mpesa_number: "0700111222".to_string(),
		}
	}

	pub fn order() -> Order {
		let created = Utc.with_ymd_and_hms(2025, 4, 10, 14, 5, 0).unwrap();
		Order {
			id: "ECOSPIN-0042".to_string(),
			service: "Duvet Cleaning - Size 3 by 4".to_string(),
			price: 249,
			customer_name: "Kamau".to_string(),
			customer_phone: "0733444555".to_string(),
			address: "South B".to_string(),
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
}

#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;

	fn service(transport: RecordingTransport, admin: Option<&str>) -> NotificationService {
		NotificationService::new(
			Some(Box::new(transport)),
			NotificationSettings {
				admin_email: admin.map(str::to_string),
				from_address: "orders@ecospin.test".to_string(),
				business: business(),
			},
		)
	}

	#[tokio::test]
	async fn test_send_renders_and_delivers() {
		let transport = RecordingTransport::default();
		let sent = transport.sent.clone();
		let service = service(transport, Some("admin@ecospin.test"));

		assert!(
			service
				.send("admin@ecospin.test", NotificationKind::NewOrderAdmin, &order(), None)
				.await
		);

		let sent = sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].to, "admin@ecospin.test");
		assert_eq!(sent[0].from, "orders@ecospin.test");
		assert_eq!(sent[0].subject, "New Order #ECOSPIN-0042 - EcoSpin Laundry");
	}

	#[tokio::test]
	async fn test_transport_failure_returns_false() {
		let transport = RecordingTransport {
			fail: true,
			..Default::default()
		};
		let service = service(transport, Some("admin@ecospin.test"));
		assert!(
			!service
				.send("admin@ecospin.test", NotificationKind::StatusUpdate, &order(), None)
				.await
		);
	}

	#[tokio::test]
	async fn test_unconfigured_service_is_silent_noop() {
		let service = Arc::new(NotificationService::disabled(business()));
		assert!(!service.is_configured());
		assert!(
			!service
				.send("admin@ecospin.test", NotificationKind::NewOrderAdmin, &order(), None)
				.await
		);
		assert!(service
			.dispatch(NotificationKind::NewOrderAdmin, order(), None)
			.is_none());

		// A transport without an admin recipient is not enough.
		let service = Arc::new(service_without_admin());
		assert!(service
			.dispatch(NotificationKind::NewOrderAdmin, order(), None)
			.is_none());
	}

	fn service_without_admin() -> NotificationService {
		service(RecordingTransport::default(), Some("  "))
	}

	#[tokio::test]
	async fn test_dispatch_runs_detached() {
		let transport = RecordingTransport::default();
		let sent = transport.sent.clone();
		let service = Arc::new(service(transport, Some("admin@ecospin.test")));

		let handle = service
			.dispatch(
				NotificationKind::StatusUpdate,
				order(),
				Some(OrderStatus::PendingPayment),
			)
			.unwrap();
		assert!(handle.await.unwrap());
		assert!(sent.lock().unwrap()[0]
			.text
			.contains("Previous status: PENDING PAYMENT"));
	}
}
