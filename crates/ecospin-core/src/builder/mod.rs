//! Builder pattern for constructing order engines.
//!
//! Resolves the configured storage and notification implementation names to
//! factory functions, constructs the primary of each and wires them into an
//! [`OrderEngine`].

use crate::engine::OrderEngine;
use ecospin_config::Config;
use ecospin_notify::{
	BusinessDetails, NotificationError, NotificationInterface, NotificationService,
	NotificationSettings,
};
use ecospin_storage::{OrderStoreInterface, StorageError, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build an OrderEngine.
pub struct EngineFactories<SF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub notification_factories: HashMap<String, NF>,
}

/// Constructs the storage implementation registered under `name`.
///
/// Used by the builder for the primary backend and by the migration command
/// for the source and target backends.
pub fn build_storage<SF>(
	config: &Config,
	name: &str,
	factories: &HashMap<String, SF>,
) -> Result<StorageService, BuilderError>
where
	SF: Fn(&toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError>,
{
	let table = config.storage.implementations.get(name).ok_or_else(|| {
		BuilderError::Config(format!("Storage implementation '{}' is not configured", name))
	})?;
	let factory = factories.get(name).ok_or_else(|| {
		BuilderError::MissingComponent(format!("storage implementation '{}'", name))
	})?;

	match factory(table) {
		Ok(implementation) => {
			let is_primary = config.storage.primary == name;
			tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
			Ok(StorageService::new(implementation))
		}
		Err(e) => {
			tracing::error!(
				component = "storage",
				implementation = %name,
				error = %e,
				"Failed to create storage implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				name, e
			)))
		}
	}
}

/// Builder for constructing an OrderEngine with pluggable implementations.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	/// Creates a new EngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the OrderEngine using factories for each component type.
	pub fn build<SF, NF>(self, factories: EngineFactories<SF, NF>) -> Result<OrderEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>,
	{
		let storage = build_storage(
			&self.config,
			&self.config.storage.primary,
			&factories.storage_factories,
		)?;

		let notifications = self.build_notifications(&factories.notification_factories)?;

		Ok(OrderEngine::new(
			self.config,
			Arc::new(storage),
			Arc::new(notifications),
		))
	}

	fn build_notifications<NF>(
		&self,
		factories: &HashMap<String, NF>,
	) -> Result<NotificationService, BuilderError>
	where
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>,
	{
		let business = BusinessDetails {
			name: self.config.business.name.clone(),
			mpesa_number: self.config.business.mpesa_number.clone(),
		};

		let Some(notifications) = &self.config.notifications else {
			tracing::info!(component = "notifications", "No transport configured, notifications disabled");
			return Ok(NotificationService::disabled(business));
		};

		let mut transports = HashMap::new();
		for (name, config) in &notifications.implementations {
			if let Some(factory) = factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						transports.insert(name.clone(), implementation);
						let is_primary = &notifications.primary == name;
						tracing::info!(component = "notifications", implementation = %name, enabled = %is_primary, "Loaded");
					}
					Err(e) => {
						tracing::error!(
							component = "notifications",
							implementation = %name,
							error = %e,
							"Failed to create notification implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create notification implementation '{}': {}",
							name, e
						)));
					}
				}
			}
		}

		let transport = transports.remove(&notifications.primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary notification transport '{}' failed to load or has invalid configuration",
				notifications.primary
			))
		})?;

		let service = NotificationService::new(
			Some(transport),
			NotificationSettings {
				admin_email: notifications.admin_email.clone(),
				from_address: notifications.from_address.clone(),
				business,
			},
		);
		if !service.is_configured() {
			tracing::warn!(
				component = "notifications",
				"No admin_email configured, notifications disabled"
			);
		}
		Ok(service)
	}
}
