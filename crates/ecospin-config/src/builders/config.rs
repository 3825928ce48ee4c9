//! Configuration builder for tests and local development.
//!
//! Produces a `Config` backed by the in-memory store unless told otherwise.

use crate::{
	ApiConfig, BusinessConfig, CacheConfig, Config, LifecycleConfig, NotificationsConfig,
	StorageConfig, TransitionPolicy,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	business_name: String,
	order_prefix: String,
	mpesa_number: String,
	storage_primary: String,
	storage_table: toml::Value,
	autosave_interval_seconds: u64,
	refresh_interval_seconds: u64,
	transition_policy: TransitionPolicy,
	notifications: Option<NotificationsConfig>,
	api: ApiConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a builder with an in-memory store and no notifications.
	pub fn new() -> Self {
		Self {
			business_name: "EcoSpin Laundry".to_string(),
			order_prefix: "ECOSPIN".to_string(),
			mpesa_number: "0700111222".to_string(),
			storage_primary: "memory".to_string(),
			storage_table: toml::Value::Table(toml::map::Map::new()),
			autosave_interval_seconds: 300,
			refresh_interval_seconds: 60,
			transition_policy: TransitionPolicy::Permissive,
			notifications: None,
			api: ApiConfig::default(),
		}
	}

	pub fn order_prefix(mut self, prefix: &str) -> Self {
		self.order_prefix = prefix.to_string();
		self
	}

	pub fn mpesa_number(mut self, number: &str) -> Self {
		self.mpesa_number = number.to_string();
		self
	}

	/// Selects the primary storage implementation and its TOML table.
	pub fn storage(mut self, primary: &str, table: toml::Value) -> Self {
		self.storage_primary = primary.to_string();
		self.storage_table = table;
		self
	}

	pub fn autosave_interval_seconds(mut self, interval: u64) -> Self {
		self.autosave_interval_seconds = interval;
		self
	}

	pub fn refresh_interval_seconds(mut self, interval: u64) -> Self {
		self.refresh_interval_seconds = interval;
		self
	}

	pub fn transition_policy(mut self, policy: TransitionPolicy) -> Self {
		self.transition_policy = policy;
		self
	}

	/// Enables the `log` transport with the given admin recipient.
	pub fn log_notifications(mut self, admin_email: &str) -> Self {
		let mut implementations = HashMap::new();
		implementations.insert(
			"log".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);
		self.notifications = Some(NotificationsConfig {
			primary: "log".to_string(),
			admin_email: Some(admin_email.to_string()),
			from_address: "orders@ecospin.local".to_string(),
			implementations,
		});
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config`.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_table);

		Config {
			business: BusinessConfig {
				name: self.business_name,
				order_prefix: self.order_prefix,
				mpesa_number: self.mpesa_number,
				payment_method: "manual_mpesa".to_string(),
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
				autosave_interval_seconds: self.autosave_interval_seconds,
			},
			cache: CacheConfig {
				refresh_interval_seconds: self.refresh_interval_seconds,
			},
			lifecycle: LifecycleConfig {
				transition_policy: self.transition_policy,
			},
			notifications: self.notifications,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_passes_validation() {
		let config = ConfigBuilder::new()
			.order_prefix("ECOW")
			.transition_policy(TransitionPolicy::ForwardOnly)
			.log_notifications("admin@ecospin.test")
			.build();
		config.validate().unwrap();
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.notifications.as_ref().unwrap().primary, "log");
	}
}
