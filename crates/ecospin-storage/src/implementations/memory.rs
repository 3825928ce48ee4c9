//! In-memory order store.
//!
//! Useful for tests and development where persistence is not required.
//! Everything is lost when the process exits.

use crate::{sort_newest_first, OrderStoreInterface, PersistenceInfo, StorageError};
use async_trait::async_trait;
use ecospin_types::{ConfigSchema, Order, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct MemoryState {
	orders: HashMap<String, Order>,
	counter: u64,
}

/// In-memory storage implementation.
pub struct MemoryStorage {
	state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			state: Arc::new(RwLock::new(MemoryState {
				orders: HashMap::new(),
				counter: 1,
			})),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStoreInterface for MemoryStorage {
	async fn init(&self) -> Result<(), StorageError> {
		Ok(())
	}

	async fn create(&self, order: &Order) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		if state.orders.contains_key(&order.id) {
			return Err(StorageError::DuplicateId(order.id.clone()));
		}
		state.orders.insert(order.id.clone(), order.clone());
		Ok(())
	}

	async fn get(&self, id: &str) -> Result<Order, StorageError> {
		let state = self.state.read().await;
		state
			.orders
			.get(id)
			.cloned()
			.ok_or_else(|| StorageError::NotFound(id.to_string()))
	}

	async fn list_all(&self) -> Result<Vec<Order>, StorageError> {
		let state = self.state.read().await;
		let mut orders: Vec<Order> = state.orders.values().cloned().collect();
		sort_newest_first(&mut orders);
		Ok(orders)
	}

	async fn update(&self, order: &Order) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		match state.orders.get_mut(&order.id) {
			Some(existing) => {
				*existing = order.clone();
				Ok(())
			}
			None => Err(StorageError::NotFound(order.id.clone())),
		}
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		state
			.orders
			.remove(id)
			.map(|_| ())
			.ok_or_else(|| StorageError::NotFound(id.to_string()))
	}

	async fn next_counter(&self) -> Result<u64, StorageError> {
		let mut state = self.state.write().await;
		let value = state.counter;
		state.counter += 1;
		Ok(value)
	}

	async fn current_counter(&self) -> Result<u64, StorageError> {
		Ok(self.state.read().await.counter)
	}

	async fn set_counter(&self, value: u64) -> Result<(), StorageError> {
		self.state.write().await.counter = value.max(1);
		Ok(())
	}

	fn describe(&self) -> PersistenceInfo {
		PersistenceInfo {
			mode: "memory",
			location: None,
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ecospin_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
