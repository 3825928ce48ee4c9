//! Order identifier allocation.
//!
//! Identifiers are minted from the store's persisted counter with a single
//! atomic increment-and-read, so concurrent callers never receive the same
//! number. A failed increment is reported to the caller; no identifier is
//! ever fabricated locally.

use ecospin_storage::{StorageError, StorageService};
use ecospin_types::format_order_id;
use std::sync::Arc;

/// Mints `PREFIX-NNNN` identifiers.
pub struct IdAllocator {
	storage: Arc<StorageService>,
	prefix: String,
}

impl IdAllocator {
	pub fn new(storage: Arc<StorageService>, prefix: impl Into<String>) -> Self {
		Self {
			storage,
			prefix: prefix.into(),
		}
	}

	pub async fn allocate(&self) -> Result<String, StorageError> {
		let value = self.storage.next_counter().await?;
		Ok(format_order_id(&self.prefix, value))
	}
}
