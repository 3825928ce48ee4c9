//! Transport that writes notifications to the log instead of sending them.
//!
//! Useful in development, and in deployments that only want an audit trail
//! of lifecycle events.

use crate::{NotificationError, NotificationInterface, OutgoingMessage};
use async_trait::async_trait;
use ecospin_types::{ConfigSchema, Schema, ValidationError};

/// Logs every message at info level.
pub struct LogNotifier;

#[async_trait]
impl NotificationInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn deliver(&self, message: &OutgoingMessage) -> Result<(), NotificationError> {
		let preview: String = message.text.chars().take(80).collect();
		tracing::info!(
			to = %message.to,
			from = %message.from,
			subject = %message.subject,
			preview = %preview,
			"Notification logged"
		);
		Ok(())
	}
}

/// Configuration schema for LogNotifier.
pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a log transport.
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;
	Ok(Box::new(LogNotifier))
}

/// Registry for the log transport.
pub struct Registry;

impl ecospin_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = crate::NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotificationRegistry for Registry {}
