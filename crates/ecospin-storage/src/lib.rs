//! Order storage for the EcoSpin order backend.
//!
//! This module defines the order store contract shared by every backend
//! together with the concrete implementations: a flat JSON file store, a
//! relational SQLite store and an in-memory store for tests and development.
//! Exactly one backend is selected at process start.

use async_trait::async_trait;
use ecospin_types::{ConfigSchema, ImplementationRegistry, Order};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested order is not found.
	#[error("Order not found: {0}")]
	NotFound(String),
	/// Error that occurs when creating an order whose id already exists.
	#[error("Duplicate order id: {0}")]
	DuplicateId(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl From<serde_json::Error> for StorageError {
	fn from(err: serde_json::Error) -> Self {
		StorageError::Serialization(err.to_string())
	}
}

impl From<sqlx::Error> for StorageError {
	fn from(err: sqlx::Error) -> Self {
		StorageError::Backend(err.to_string())
	}
}

/// Describes where the active backend keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceInfo {
	/// Short backend label, e.g. "file" or "sqlite".
	pub mode: &'static str,
	/// Data directory or database location, if the backend has one.
	pub location: Option<String>,
}

/// Trait defining the interface for order storage backends.
///
/// Every backend must behave identically under this contract:
/// - `list_all` returns orders newest-created first.
/// - `update` replaces the whole record; concurrent updates to one order
///   race and the later write wins.
/// - `next_counter` is an atomic increment-and-read of the persisted counter.
#[async_trait]
pub trait OrderStoreInterface: Send + Sync {
	/// Prepares the backend: creates schema or directories and loads state.
	async fn init(&self) -> Result<(), StorageError>;

	/// Inserts a new order, failing with `DuplicateId` if the id exists.
	async fn create(&self, order: &Order) -> Result<(), StorageError>;

	async fn get(&self, id: &str) -> Result<Order, StorageError>;

	/// Returns every order, newest first.
	async fn list_all(&self) -> Result<Vec<Order>, StorageError>;

	/// Replaces an existing order record.
	async fn update(&self, order: &Order) -> Result<(), StorageError>;

	async fn delete(&self, id: &str) -> Result<(), StorageError>;

	/// Returns the current counter value and persists value + 1.
	async fn next_counter(&self) -> Result<u64, StorageError>;

	/// Returns the next counter value that will be issued.
	async fn current_counter(&self) -> Result<u64, StorageError>;

	/// Overwrites the counter. Used when copying data between backends.
	async fn set_counter(&self, value: u64) -> Result<(), StorageError>;

	/// Persists any buffered state (optional operation).
	/// Backends that write through on every mutation can return Ok(()).
	async fn flush(&self) -> Result<(), StorageError> {
		Ok(())
	}

	fn describe(&self) -> PersistenceInfo;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory, sqlite};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(sqlite::Registry::NAME, sqlite::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Sorts orders newest-created first, breaking ties by descending id.
pub fn sort_newest_first(orders: &mut [Order]) {
	orders.sort_by(|a, b| {
		b.created_at
			.cmp(&a.created_at)
			.then_with(|| b.id.cmp(&a.id))
	});
}

/// High-level storage service used by the order engine.
///
/// Wraps the selected backend and adds tracing around each call.
pub struct StorageService {
	backend: Box<dyn OrderStoreInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn OrderStoreInterface>) -> Self {
		Self { backend }
	}

	pub async fn init(&self) -> Result<(), StorageError> {
		let info = self.backend.describe();
		self.backend.init().await?;
		tracing::info!(
			mode = info.mode,
			location = info.location.as_deref().unwrap_or("-"),
			"Order store ready"
		);
		Ok(())
	}

	pub async fn create(&self, order: &Order) -> Result<(), StorageError> {
		tracing::debug!(order_id = %order.id, "Storing new order");
		self.backend.create(order).await
	}

	pub async fn get(&self, id: &str) -> Result<Order, StorageError> {
		self.backend.get(id).await
	}

	pub async fn list_all(&self) -> Result<Vec<Order>, StorageError> {
		self.backend.list_all().await
	}

	pub async fn update(&self, order: &Order) -> Result<(), StorageError> {
		tracing::debug!(order_id = %order.id, status = %order.status, "Replacing order");
		self.backend.update(order).await
	}

	pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
		tracing::debug!(order_id = %id, "Deleting order");
		self.backend.delete(id).await
	}

	pub async fn next_counter(&self) -> Result<u64, StorageError> {
		self.backend.next_counter().await
	}

	pub async fn current_counter(&self) -> Result<u64, StorageError> {
		self.backend.current_counter().await
	}

	pub async fn set_counter(&self, value: u64) -> Result<(), StorageError> {
		self.backend.set_counter(value).await
	}

	pub async fn flush(&self) -> Result<(), StorageError> {
		self.backend.flush().await
	}

	pub fn describe(&self) -> PersistenceInfo {
		self.backend.describe()
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use test_support::order_at;

	#[test]
	fn test_sort_newest_first() {
		let mut orders = vec![
			order_at("ECOSPIN-0001", 1),
			order_at("ECOSPIN-0003", 3),
			order_at("ECOSPIN-0002", 2),
		];
		sort_newest_first(&mut orders);
		let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
		assert_eq!(ids, vec!["ECOSPIN-0003", "ECOSPIN-0002", "ECOSPIN-0001"]);
	}

	#[test]
	fn test_sort_breaks_ties_by_id() {
		let mut orders = vec![order_at("ECOSPIN-0001", 0), order_at("ECOSPIN-0002", 0)];
		sort_newest_first(&mut orders);
		assert_eq!(orders[0].id, "ECOSPIN-0002");
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<&str> = get_all_implementations().iter().map(|(n, _)| *n).collect();
		assert_eq!(names, vec!["file", "sqlite", "memory"]);
	}
}
