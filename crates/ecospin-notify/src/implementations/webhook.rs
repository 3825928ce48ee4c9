//! Transport that posts notifications to an HTTP mail relay.
//!
//! Each message is sent as a JSON body `{to, from, subject, text}` to the
//! configured URL. An optional API key is sent as a bearer token.

use crate::{NotificationError, NotificationInterface, OutgoingMessage};
use async_trait::async_trait;
use ecospin_types::{ConfigSchema, Field, FieldType, Schema, SecretString, ValidationError};
use std::time::Duration;

/// Default request timeout for the relay.
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Posts messages to an HTTP relay.
pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	api_key: Option<SecretString>,
}

impl WebhookNotifier {
	pub fn new(
		url: String,
		api_key: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, NotificationError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotificationError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			url,
			api_key,
		})
	}
}

#[async_trait]
impl NotificationInterface for WebhookNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}

	async fn deliver(&self, message: &OutgoingMessage) -> Result<(), NotificationError> {
		let mut request = self.client.post(&self.url).json(message);
		if let Some(api_key) = &self.api_key {
			request = request.bearer_auth(api_key.expose_secret());
		}

		let response = request
			.send()
			.await
			.map_err(|e| NotificationError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(NotificationError::Rejected {
				status: status.as_u16(),
				message,
			});
		}
		Ok(())
	}
}

/// Configuration schema for WebhookNotifier.
pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					}
					_ => Err("url must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new("api_key", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a webhook transport.
///
/// Configuration parameters:
/// - `url`: relay endpoint (required)
/// - `api_key`: bearer token (optional)
/// - `timeout_seconds`: request timeout (default: 10)
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	WebhookNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotificationError::Configuration("url is required".to_string()))?
		.to_string();
	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.filter(|key| !key.is_empty());
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(WebhookNotifier::new(
		url,
		api_key,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the webhook transport.
pub struct Registry;

impl ecospin_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = crate::NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotificationRegistry for Registry {}
