//! Order state machine implementation.
//!
//! Every mutation follows the same write-through path: read the authoritative
//! record from the store, apply the change, write it back, then upsert the
//! cache. The cache is only touched once the store has accepted the write.

use crate::cache::OrderCache;
use chrono::Utc;
use ecospin_config::TransitionPolicy;
use ecospin_storage::{StorageError, StorageService};
use ecospin_types::{Order, OrderStatus};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(StorageError),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Order {0} is already marked as paid")]
	AlreadyPaid(String),
	#[error("Invalid status: {0}")]
	InvalidStatus(String),
}

impl From<StorageError> for OrderStateError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => OrderStateError::OrderNotFound(id),
			other => OrderStateError::Storage(other),
		}
	}
}

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	cache: Arc<OrderCache>,
	policy: TransitionPolicy,
}

impl OrderStateMachine {
	pub fn new(
		storage: Arc<StorageService>,
		cache: Arc<OrderCache>,
		policy: TransitionPolicy,
	) -> Self {
		Self {
			storage,
			cache,
			policy,
		}
	}

	/// Persists a new order and adds it to the cache.
	pub async fn create_order(&self, order: &Order) -> Result<(), OrderStateError> {
		self.storage.create(order).await?;
		self.cache.upsert(order.clone()).await;
		Ok(())
	}

	/// Updates an order with a closure and persists it.
	///
	/// The closure runs against the stored record; returning an error aborts
	/// the update and leaves both store and cache untouched.
	pub async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<Order, OrderStateError>
	where
		F: FnOnce(&mut Order) -> Result<(), OrderStateError>,
	{
		let mut order = self.storage.get(order_id).await?;

		updater(&mut order)?;

		// Automatically set updated_at timestamp
		order.updated_at = Utc::now();

		self.storage.update(&order).await?;
		self.cache.upsert(order.clone()).await;

		Ok(order)
	}

	/// Removes an order from the store, then from the cache.
	pub async fn delete_order(&self, order_id: &str) -> Result<(), OrderStateError> {
		self.storage.delete(order_id).await?;
		self.cache.remove(order_id).await;
		Ok(())
	}

	/// Checks a status change against the configured transition policy.
	pub fn check_transition(
		&self,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<(), OrderStateError> {
		if Self::is_valid_transition(self.policy, from, to) {
			Ok(())
		} else {
			Err(OrderStateError::InvalidTransition { from, to })
		}
	}

	fn is_valid_transition(policy: TransitionPolicy, from: OrderStatus, to: OrderStatus) -> bool {
		match policy {
			TransitionPolicy::Permissive => true,
			TransitionPolicy::ForwardOnly => to.stage() >= from.stage(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::order_at;
	use ecospin_storage::implementations::memory::MemoryStorage;

	fn machine(policy: TransitionPolicy) -> (OrderStateMachine, Arc<StorageService>, Arc<OrderCache>) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let cache = Arc::new(OrderCache::new());
		(
			OrderStateMachine::new(storage.clone(), cache.clone(), policy),
			storage,
			cache,
		)
	}

	#[tokio::test]
	async fn test_update_writes_store_then_cache() {
		let (machine, storage, cache) = machine(TransitionPolicy::Permissive);
		let order = order_at("ECOSPIN-0001", 0);
		machine.create_order(&order).await.unwrap();

		let updated = machine
			.update_order_with("ECOSPIN-0001", |o| {
				o.status = OrderStatus::PickedUp;
				Ok(())
			})
			.await
			.unwrap();

		assert!(updated.updated_at > order.updated_at);
		assert_eq!(storage.get("ECOSPIN-0001").await.unwrap().status, OrderStatus::PickedUp);
		assert_eq!(cache.get("ECOSPIN-0001").await.unwrap(), updated);
	}

	#[tokio::test]
	async fn test_failed_updater_leaves_order_unchanged() {
		let (machine, storage, cache) = machine(TransitionPolicy::Permissive);
		let order = order_at("ECOSPIN-0001", 0);
		machine.create_order(&order).await.unwrap();

		let result = machine
			.update_order_with("ECOSPIN-0001", |o| {
				o.status = OrderStatus::Delivered;
				Err(OrderStateError::InvalidStatus("cancelled".into()))
			})
			.await;

		assert!(matches!(result, Err(OrderStateError::InvalidStatus(_))));
		assert_eq!(storage.get("ECOSPIN-0001").await.unwrap(), order);
		assert_eq!(cache.get("ECOSPIN-0001").await.unwrap(), order);
	}

	#[tokio::test]
	async fn test_missing_order_maps_to_not_found() {
		let (machine, _, _) = machine(TransitionPolicy::Permissive);
		let result = machine.update_order_with("ECOSPIN-0404", |_| Ok(())).await;
		assert!(matches!(result, Err(OrderStateError::OrderNotFound(id)) if id == "ECOSPIN-0404"));

		let result = machine.delete_order("ECOSPIN-0404").await;
		assert!(matches!(result, Err(OrderStateError::OrderNotFound(_))));
	}

	#[tokio::test]
	async fn test_delete_removes_from_cache() {
		let (machine, storage, cache) = machine(TransitionPolicy::Permissive);
		machine.create_order(&order_at("ECOSPIN-0001", 0)).await.unwrap();

		machine.delete_order("ECOSPIN-0001").await.unwrap();

		assert!(cache.get("ECOSPIN-0001").await.is_none());
		assert!(matches!(
			storage.get("ECOSPIN-0001").await,
			Err(StorageError::NotFound(_))
		));
	}

	#[test]
	fn test_transition_policies() {
		use OrderStatus::*;

		for from in OrderStatus::all() {
			for to in OrderStatus::all() {
				assert!(OrderStateMachine::is_valid_transition(
					TransitionPolicy::Permissive,
					from,
					to
				));
			}
		}

		let forward = TransitionPolicy::ForwardOnly;
		assert!(OrderStateMachine::is_valid_transition(forward, PendingPayment, Delivered));
		assert!(OrderStateMachine::is_valid_transition(forward, Paid, Paid));
		assert!(!OrderStateMachine::is_valid_transition(forward, Delivered, Paid));
		assert!(!OrderStateMachine::is_valid_transition(forward, PickedUp, PickupScheduled));
	}
}
