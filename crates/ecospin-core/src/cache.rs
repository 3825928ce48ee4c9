//! In-process copy of the order set.
//!
//! Every read path is served from here. The cache is patched after each
//! successful store write and rebuilt wholesale on a timer; it is never the
//! source of truth and can be reloaded from the store at any time. Only the
//! order engine and its refresher write to it.

use ecospin_storage::{sort_newest_first, StorageError, StorageService};
use ecospin_types::Order;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct CacheState {
	orders: HashMap<String, Order>,
	/// Bumped on every incremental write.
	generation: u64,
}

/// Order cache keyed by order id.
#[derive(Default)]
pub struct OrderCache {
	state: RwLock<CacheState>,
}

impl OrderCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn get(&self, id: &str) -> Option<Order> {
		self.state.read().await.orders.get(id).cloned()
	}

	/// Returns every cached order, newest first.
	pub async fn list_all(&self) -> Vec<Order> {
		let mut orders: Vec<Order> = self.state.read().await.orders.values().cloned().collect();
		sort_newest_first(&mut orders);
		orders
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.orders.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub(crate) async fn upsert(&self, order: Order) {
		let mut state = self.state.write().await;
		state.orders.insert(order.id.clone(), order);
		state.generation += 1;
	}

	pub(crate) async fn remove(&self, id: &str) {
		let mut state = self.state.write().await;
		state.orders.remove(id);
		state.generation += 1;
	}

	/// Reloads every order from the store.
	///
	/// Returns `Ok(None)` when an incremental write landed while the store
	/// was being read; the stale snapshot is discarded and the next refresh
	/// picks the change up.
	pub(crate) async fn refresh_all(
		&self,
		storage: &StorageService,
	) -> Result<Option<usize>, StorageError> {
		let generation = self.state.read().await.generation;
		let orders = storage.list_all().await?;

		let mut state = self.state.write().await;
		if state.generation != generation {
			return Ok(None);
		}
		state.orders = orders
			.into_iter()
			.map(|order| (order.id.clone(), order))
			.collect();
		Ok(Some(state.orders.len()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::order_at;
	use async_trait::async_trait;
	use ecospin_storage::implementations::memory::MemoryStorage;
	use ecospin_storage::{OrderStoreInterface, PersistenceInfo};
	use ecospin_types::ConfigSchema;
	use std::sync::Arc;
	use tokio::sync::Notify;

	/// Memory store whose `list_all` pauses until released.
	struct GatedStorage {
		inner: MemoryStorage,
		listing: Arc<Notify>,
		release: Arc<Notify>,
	}

	#[async_trait]
	impl OrderStoreInterface for GatedStorage {
		async fn init(&self) -> Result<(), StorageError> {
			self.inner.init().await
		}

		async fn create(&self, order: &Order) -> Result<(), StorageError> {
			self.inner.create(order).await
		}

		async fn get(&self, id: &str) -> Result<Order, StorageError> {
			self.inner.get(id).await
		}

		async fn list_all(&self) -> Result<Vec<Order>, StorageError> {
			self.listing.notify_one();
			self.release.notified().await;
			self.inner.list_all().await
		}

		async fn update(&self, order: &Order) -> Result<(), StorageError> {
			self.inner.update(order).await
		}

		async fn delete(&self, id: &str) -> Result<(), StorageError> {
			self.inner.delete(id).await
		}

		async fn next_counter(&self) -> Result<u64, StorageError> {
			self.inner.next_counter().await
		}

		async fn current_counter(&self) -> Result<u64, StorageError> {
			self.inner.current_counter().await
		}

		async fn set_counter(&self, value: u64) -> Result<(), StorageError> {
			self.inner.set_counter(value).await
		}

		fn describe(&self) -> PersistenceInfo {
			self.inner.describe()
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	#[tokio::test]
	async fn test_upsert_get_remove() {
		let cache = OrderCache::new();
		cache.upsert(order_at("ECOSPIN-0001", 0)).await;
		assert!(cache.get("ECOSPIN-0001").await.is_some());

		cache.remove("ECOSPIN-0001").await;
		assert!(cache.get("ECOSPIN-0001").await.is_none());
		assert!(cache.is_empty().await);
	}

	#[tokio::test]
	async fn test_list_newest_first() {
		let cache = OrderCache::new();
		cache.upsert(order_at("A", 1)).await;
		cache.upsert(order_at("C", 3)).await;
		cache.upsert(order_at("B", 2)).await;
		let ids: Vec<String> = cache.list_all().await.into_iter().map(|o| o.id).collect();
		assert_eq!(ids, vec!["C", "B", "A"]);
	}

	#[tokio::test]
	async fn test_refresh_replaces_contents() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		storage.create(&order_at("ECOSPIN-0001", 0)).await.unwrap();
		storage.create(&order_at("ECOSPIN-0002", 1)).await.unwrap();

		let cache = OrderCache::new();
		cache.upsert(order_at("STALE-0001", 0)).await;

		assert_eq!(cache.refresh_all(&storage).await.unwrap(), Some(2));
		assert!(cache.get("STALE-0001").await.is_none());
		assert_eq!(cache.len().await, 2);
	}

	#[tokio::test]
	async fn test_refresh_discarded_when_write_lands_mid_reload() {
		let listing = Arc::new(Notify::new());
		let release = Arc::new(Notify::new());
		let storage = StorageService::new(Box::new(GatedStorage {
			inner: MemoryStorage::new(),
			listing: listing.clone(),
			release: release.clone(),
		}));
		storage.create(&order_at("ECOSPIN-0001", 0)).await.unwrap();

		let cache = OrderCache::new();
		let write = async {
			listing.notified().await;
			// Written to the cache only, so the store snapshot cannot contain it.
			cache.upsert(order_at("ECOSPIN-0002", 1)).await;
			release.notify_one();
		};
		let (refreshed, ()) = tokio::join!(cache.refresh_all(&storage), write);

		assert_eq!(refreshed.unwrap(), None);
		assert!(cache.get("ECOSPIN-0002").await.is_some());
		assert!(cache.get("ECOSPIN-0001").await.is_none());
		assert_eq!(cache.len().await, 1);
	}
}
