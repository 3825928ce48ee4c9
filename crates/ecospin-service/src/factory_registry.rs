//! Factory registry for storage and notification implementations.
//!
//! Every implementation the crates export is registered once under its
//! configuration name, so the builder can resolve `[storage]` and
//! `[notifications]` tables to constructors.

use ecospin_config::Config;
use ecospin_core::{build_storage, EngineBuilder, EngineFactories, OrderEngine};
use ecospin_notify::NotificationFactory;
use ecospin_storage::{StorageFactory, StorageService};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub notification: HashMap<String, NotificationFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			notification: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a notification transport
	pub fn register_notification(&mut self, name: impl Into<String>, factory: NotificationFactory) {
		self.notification.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in ecospin_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in ecospin_notify::get_all_implementations() {
			tracing::debug!("Registering notification implementation: {}", name);
			registry.register_notification(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the order engine using the registry and config
pub fn build_engine_from_config(config: Config) -> Result<OrderEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let notification_factories = match &config.notifications {
		Some(notifications) => build_factories!(
			registry,
			notifications.implementations,
			notification,
			"notification"
		),
		None => HashMap::new(),
	};

	let factories = EngineFactories {
		storage_factories,
		notification_factories,
	};

	Ok(EngineBuilder::new(config).build(factories)?)
}

/// Build one configured storage implementation by name.
pub fn build_storage_from_config(
	config: &Config,
	name: &str,
) -> Result<StorageService, Box<dyn std::error::Error>> {
	Ok(build_storage(config, name, &get_registry().storage)?)
}
