//! Flat-file order store.
//!
//! The whole order set lives in `orders.json` (an object mapping order id to
//! order record) and the counter in `counter.json` (`{"counter": N}`). Both
//! files are rewritten on every mutation by writing a temp file and renaming
//! it over the original, and they are reloaded when the store initializes.
//!
//! The counter is only process-local, so the data directory is guarded by an
//! exclusive lock file and a second process pointed at it fails to start.

use crate::{sort_newest_first, OrderStoreInterface, PersistenceInfo, StorageError};
use async_trait::async_trait;
use ecospin_types::{ConfigSchema, Field, FieldType, Order, Schema, ValidationError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};

const ORDERS_FILE: &str = "orders.json";
const COUNTER_FILE: &str = "counter.json";
const LOCK_FILE: &str = ".ecospin.lock";

#[derive(Debug, Serialize, Deserialize)]
struct CounterFile {
	#[serde(default)]
	counter: u64,
}

#[derive(Debug, Default)]
struct FileState {
	loaded: bool,
	orders: BTreeMap<String, Order>,
	counter: u64,
	/// Held for the lifetime of the store; dropping it releases the lock.
	lock: Option<std::fs::File>,
}

/// File-based order store.
pub struct FileStorage {
	base_path: PathBuf,
	state: Mutex<FileState>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			state: Mutex::new(FileState::default()),
		}
	}

	pub fn orders_path(&self) -> PathBuf {
		self.base_path.join(ORDERS_FILE)
	}

	pub fn counter_path(&self) -> PathBuf {
		self.base_path.join(COUNTER_FILE)
	}

	/// Locks the in-memory state, loading it from disk on first use.
	async fn state(&self) -> Result<MutexGuard<'_, FileState>, StorageError> {
		let mut state = self.state.lock().await;
		if !state.loaded {
			self.load(&mut state).await?;
		}
		Ok(state)
	}

	async fn load(&self, state: &mut FileState) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		if state.lock.is_none() {
			state.lock = Some(self.acquire_lock().await?);
		}

		state.orders = match read_optional(&self.orders_path()).await? {
			Some(bytes) => parse_orders(&bytes)?,
			None => {
				tracing::info!(path = ?self.orders_path(), "No existing orders file, starting fresh");
				BTreeMap::new()
			}
		};

		state.counter = match read_optional(&self.counter_path()).await? {
			Some(bytes) => {
				let parsed: CounterFile = serde_json::from_slice(&bytes).map_err(|e| {
					StorageError::Serialization(format!("{}: {}", COUNTER_FILE, e))
				})?;
				parsed.counter.max(1)
			}
			None => 1,
		};

		state.loaded = true;
		tracing::info!(
			orders = state.orders.len(),
			counter = state.counter,
			"Loaded order data from disk"
		);
		Ok(())
	}

	async fn acquire_lock(&self) -> Result<std::fs::File, StorageError> {
		let path = self.base_path.join(LOCK_FILE);
		let file = fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
			.into_std()
			.await;

		file.try_lock_exclusive().map_err(|_| {
			StorageError::Backend(format!(
				"data directory {} is in use by another process",
				self.base_path.display()
			))
		})?;
		Ok(file)
	}

	async fn save_orders(&self, state: &FileState) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec_pretty(&state.orders)?;
		write_atomic(&self.orders_path(), bytes).await
	}

	async fn save_counter(&self, state: &FileState) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec_pretty(&CounterFile {
			counter: state.counter,
		})?;
		write_atomic(&self.counter_path(), bytes).await
	}
}

/// Parses the orders file, naming the first record that does not decode.
fn parse_orders(bytes: &[u8]) -> Result<BTreeMap<String, Order>, StorageError> {
	let records: BTreeMap<String, serde_json::Value> = serde_json::from_slice(bytes)
		.map_err(|e| StorageError::Serialization(format!("{}: {}", ORDERS_FILE, e)))?;

	let mut orders = BTreeMap::new();
	for (id, record) in records {
		match serde_json::from_value::<Order>(record) {
			Ok(order) => {
				orders.insert(id, order);
			}
			Err(e) => {
				return Err(StorageError::Serialization(format!(
					"{}: record {}: {}",
					ORDERS_FILE, id, e
				)));
			}
		}
	}
	Ok(orders)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
	match fs::read(path).await {
		Ok(data) => Ok(Some(data)),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(StorageError::Backend(e.to_string())),
	}
}

/// Writes atomically by writing to a temp file then renaming.
async fn write_atomic(path: &Path, data: Vec<u8>) -> Result<(), StorageError> {
	let temp_path = path.with_extension("tmp");
	fs::write(&temp_path, data)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	fs::rename(&temp_path, path)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))
}

#[async_trait]
impl OrderStoreInterface for FileStorage {
	async fn init(&self) -> Result<(), StorageError> {
		self.state().await.map(|_| ())
	}

	async fn create(&self, order: &Order) -> Result<(), StorageError> {
		let mut state = self.state().await?;
		if state.orders.contains_key(&order.id) {
			return Err(StorageError::DuplicateId(order.id.clone()));
		}
		state.orders.insert(order.id.clone(), order.clone());
		if let Err(e) = self.save_orders(&state).await {
			state.orders.remove(&order.id);
			return Err(e);
		}
		Ok(())
	}

	async fn get(&self, id: &str) -> Result<Order, StorageError> {
		let state = self.state().await?;
		state
			.orders
			.get(id)
			.cloned()
			.ok_or_else(|| StorageError::NotFound(id.to_string()))
	}

	async fn list_all(&self) -> Result<Vec<Order>, StorageError> {
		let state = self.state().await?;
		let mut orders: Vec<Order> = state.orders.values().cloned().collect();
		sort_newest_first(&mut orders);
		Ok(orders)
	}

	async fn update(&self, order: &Order) -> Result<(), StorageError> {
		let mut state = self.state().await?;
		let previous = match state.orders.get_mut(&order.id) {
			Some(existing) => std::mem::replace(existing, order.clone()),
			None => return Err(StorageError::NotFound(order.id.clone())),
		};
		if let Err(e) = self.save_orders(&state).await {
			state.orders.insert(order.id.clone(), previous);
			return Err(e);
		}
		Ok(())
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		let mut state = self.state().await?;
		let removed = state
			.orders
			.remove(id)
			.ok_or_else(|| StorageError::NotFound(id.to_string()))?;
		if let Err(e) = self.save_orders(&state).await {
			state.orders.insert(id.to_string(), removed);
			return Err(e);
		}
		Ok(())
	}

	async fn next_counter(&self) -> Result<u64, StorageError> {
		let mut state = self.state().await?;
		let value = state.counter;
		state.counter = value + 1;
		if let Err(e) = self.save_counter(&state).await {
			state.counter = value;
			return Err(e);
		}
		Ok(value)
	}

	async fn current_counter(&self) -> Result<u64, StorageError> {
		Ok(self.state().await?.counter)
	}

	async fn set_counter(&self, value: u64) -> Result<(), StorageError> {
		let mut state = self.state().await?;
		state.counter = value.max(1);
		self.save_counter(&state).await
	}

	async fn flush(&self) -> Result<(), StorageError> {
		let state = self.state().await?;
		self.save_orders(&state).await?;
		self.save_counter(&state).await?;
		tracing::debug!(orders = state.orders.len(), "Flushed order data to disk");
		Ok(())
	}

	fn describe(&self) -> PersistenceInfo {
		PersistenceInfo {
			mode: "file",
			location: Some(self.base_path.display().to_string()),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path cannot be empty".to_string()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Directory holding `orders.json` and `counter.json` (default: "./data")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ecospin_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
