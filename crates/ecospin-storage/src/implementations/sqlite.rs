//! Relational order store backed by SQLite.
//!
//! One row per order in `orders` and one row per named counter in
//! `counters`. Timestamps are stored as RFC 3339 text with nanosecond
//! precision so they sort lexicographically and round-trip exactly.

use crate::{OrderStoreInterface, PersistenceInfo, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ecospin_types::{ConfigSchema, Field, FieldType, Order, OrderStatus, Schema, ValidationError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

const ORDER_COUNTER: &str = "order_counter";

const ORDER_COLUMNS: &str = "id, service, price, customer_name, customer_phone, address, notes, \
	status, payment_method, mpesa_code, admin_notes, created_at, updated_at, paid_at, \
	pickup_scheduled, pickup_date, delivery_date";

/// SQLite-backed order store.
pub struct SqliteStorage {
	pool: SqlitePool,
	location: String,
}

impl SqliteStorage {
	pub fn new(pool: SqlitePool, location: impl Into<String>) -> Self {
		Self {
			pool,
			location: location.into(),
		}
	}
}

fn encode_time(value: &DateTime<Utc>) -> String {
	value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(column: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| StorageError::Serialization(format!("{}: {}", column, e)))
}

fn decode_optional_time(
	column: &str,
	value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
	value.map(|v| decode_time(column, &v)).transpose()
}

fn row_to_order(row: &SqliteRow) -> Result<Order, StorageError> {
	let price: i64 = row.try_get("price")?;
	let status: String = row.try_get("status")?;
	let created_at: String = row.try_get("created_at")?;
	let updated_at: String = row.try_get("updated_at")?;

	Ok(Order {
		id: row.try_get("id")?,
		service: row.try_get("service")?,
		price: u64::try_from(price)
			.map_err(|_| StorageError::Serialization(format!("negative price {}", price)))?,
		customer_name: row.try_get("customer_name")?,
		customer_phone: row.try_get("customer_phone")?,
		address: row.try_get("address")?,
		notes: row.try_get("notes")?,
		status: OrderStatus::from_str(&status)
			.map_err(|e| StorageError::Serialization(e.to_string()))?,
		payment_method: row.try_get("payment_method")?,
		mpesa_code: row.try_get("mpesa_code")?,
		admin_notes: row.try_get("admin_notes")?,
		created_at: decode_time("created_at", &created_at)?,
		updated_at: decode_time("updated_at", &updated_at)?,
		paid_at: decode_optional_time("paid_at", row.try_get("paid_at")?)?,
		pickup_scheduled: row.try_get("pickup_scheduled")?,
		pickup_date: decode_optional_time("pickup_date", row.try_get("pickup_date")?)?,
		delivery_date: decode_optional_time("delivery_date", row.try_get("delivery_date")?)?,
	})
}

fn price_to_db(order: &Order) -> Result<i64, StorageError> {
	i64::try_from(order.price)
		.map_err(|_| StorageError::Serialization(format!("price {} out of range", order.price)))
}

#[async_trait]
impl OrderStoreInterface for SqliteStorage {
	async fn init(&self) -> Result<(), StorageError> {
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS orders (
				id TEXT PRIMARY KEY,
				service TEXT NOT NULL,
				price INTEGER NOT NULL CHECK (price >= 0),
				customer_name TEXT NOT NULL,
				customer_phone TEXT NOT NULL,
				address TEXT NOT NULL,
				notes TEXT NOT NULL DEFAULT '',
				status TEXT NOT NULL,
				payment_method TEXT NOT NULL,
				mpesa_code TEXT,
				admin_notes TEXT NOT NULL DEFAULT '',
				created_at TEXT NOT NULL,
				updated_at TEXT NOT NULL,
				paid_at TEXT,
				pickup_scheduled INTEGER NOT NULL DEFAULT 0,
				pickup_date TEXT,
				delivery_date TEXT
			)",
		)
		.execute(&self.pool)
		.await?;

		sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at)")
			.execute(&self.pool)
			.await?;

		sqlx::query(
			"CREATE TABLE IF NOT EXISTS counters (
				name TEXT PRIMARY KEY,
				value INTEGER NOT NULL
			)",
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn create(&self, order: &Order) -> Result<(), StorageError> {
		let sql = format!(
			"INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
			ORDER_COLUMNS
		);
		let result = sqlx::query(&sql)
			.bind(&order.id)
			.bind(&order.service)
			.bind(price_to_db(order)?)
			.bind(&order.customer_name)
			.bind(&order.customer_phone)
			.bind(&order.address)
			.bind(&order.notes)
			.bind(order.status.as_str())
			.bind(&order.payment_method)
			.bind(&order.mpesa_code)
			.bind(&order.admin_notes)
			.bind(encode_time(&order.created_at))
			.bind(encode_time(&order.updated_at))
			.bind(order.paid_at.as_ref().map(encode_time))
			.bind(order.pickup_scheduled)
			.bind(order.pickup_date.as_ref().map(encode_time))
			.bind(order.delivery_date.as_ref().map(encode_time))
			.execute(&self.pool)
			.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
				Err(StorageError::DuplicateId(order.id.clone()))
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn get(&self, id: &str) -> Result<Order, StorageError> {
		let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
		let row = sqlx::query(&sql)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| StorageError::NotFound(id.to_string()))?;
		row_to_order(&row)
	}

	async fn list_all(&self) -> Result<Vec<Order>, StorageError> {
		let sql = format!(
			"SELECT {} FROM orders ORDER BY created_at DESC, id DESC",
			ORDER_COLUMNS
		);
		let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
		rows.iter().map(row_to_order).collect()
	}

	async fn update(&self, order: &Order) -> Result<(), StorageError> {
		let result = sqlx::query(
			"UPDATE orders SET service = ?, price = ?, customer_name = ?, customer_phone = ?,
				address = ?, notes = ?, status = ?, payment_method = ?, mpesa_code = ?,
				admin_notes = ?, created_at = ?, updated_at = ?, paid_at = ?,
				pickup_scheduled = ?, pickup_date = ?, delivery_date = ?
			WHERE id = ?",
		)
		.bind(&order.service)
		.bind(price_to_db(order)?)
		.bind(&order.customer_name)
		.bind(&order.customer_phone)
		.bind(&order.address)
		.bind(&order.notes)
		.bind(order.status.as_str())
		.bind(&order.payment_method)
		.bind(&order.mpesa_code)
		.bind(&order.admin_notes)
		.bind(encode_time(&order.created_at))
		.bind(encode_time(&order.updated_at))
		.bind(order.paid_at.as_ref().map(encode_time))
		.bind(order.pickup_scheduled)
		.bind(order.pickup_date.as_ref().map(encode_time))
		.bind(order.delivery_date.as_ref().map(encode_time))
		.bind(&order.id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StorageError::NotFound(order.id.clone()));
		}
		Ok(())
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		let result = sqlx::query("DELETE FROM orders WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(StorageError::NotFound(id.to_string()));
		}
		Ok(())
	}

	async fn next_counter(&self) -> Result<u64, StorageError> {
		// Single statement: the first allocation inserts 2 and returns 1.
		let row = sqlx::query(
			"INSERT INTO counters (name, value) VALUES (?, 2)
			ON CONFLICT (name) DO UPDATE SET value = value + 1
			RETURNING value - 1 AS issued",
		)
		.bind(ORDER_COUNTER)
		.fetch_one(&self.pool)
		.await?;

		let issued: i64 = row.try_get("issued")?;
		u64::try_from(issued)
			.map_err(|_| StorageError::Serialization(format!("invalid counter {}", issued)))
	}

	async fn current_counter(&self) -> Result<u64, StorageError> {
		let value: Option<i64> = sqlx::query("SELECT value FROM counters WHERE name = ?")
			.bind(ORDER_COUNTER)
			.fetch_optional(&self.pool)
			.await?
			.map(|row| row.try_get("value"))
			.transpose()?;

		Ok(value.and_then(|v| u64::try_from(v).ok()).unwrap_or(1).max(1))
	}

	async fn set_counter(&self, value: u64) -> Result<(), StorageError> {
		let value = i64::try_from(value.max(1))
			.map_err(|_| StorageError::Serialization(format!("counter {} out of range", value)))?;
		sqlx::query(
			"INSERT INTO counters (name, value) VALUES (?, ?)
			ON CONFLICT (name) DO UPDATE SET value = excluded.value",
		)
		.bind(ORDER_COUNTER)
		.bind(value)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	fn describe(&self) -> PersistenceInfo {
		PersistenceInfo {
			mode: "sqlite",
			location: Some(self.location.clone()),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SqliteStorageSchema)
	}
}

/// Configuration schema for SqliteStorage.
pub struct SqliteStorageSchema;

impl ConfigSchema for SqliteStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("database_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("sqlite:") => Ok(()),
					_ => Err("database_url must start with 'sqlite:'".to_string()),
				}
			})],
			vec![Field::new(
				"max_connections",
				FieldType::Integer {
					min: Some(1),
					max: Some(64),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a SQLite storage backend from configuration.
///
/// Configuration parameters:
/// - `database_url`: e.g. "sqlite://./data/ecospin.db" or "sqlite::memory:"
/// - `max_connections`: pool size (default: 5, forced to 1 for in-memory databases)
///
/// The pool connects lazily; the schema is created by `init`.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn OrderStoreInterface>, StorageError> {
	SqliteStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let database_url = config
		.get("database_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("database_url is required".to_string()))?;

	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StorageError::Configuration(format!("Invalid database_url: {}", e)))?
		.create_if_missing(true);

	let in_memory = database_url.contains(":memory:");
	let max_connections = if in_memory {
		1
	} else {
		config
			.get("max_connections")
			.and_then(|v| v.as_integer())
			.unwrap_or(5) as u32
	};

	let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
	if in_memory {
		// Every new connection would open a fresh empty database.
		pool_options = pool_options
			.idle_timeout(None::<Duration>)
			.max_lifetime(None::<Duration>);
	}
	let pool = pool_options.connect_lazy_with(options);

	Ok(Box::new(SqliteStorage::new(pool, database_url)))
}

/// Registry for the SQLite storage implementation.
pub struct Registry;

impl ecospin_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "sqlite";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::order_at;
	use chrono::Duration;
	use std::sync::Arc;

	async fn memory_store() -> SqliteStorage {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None::<std::time::Duration>)
			.max_lifetime(None::<std::time::Duration>)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		let store = SqliteStorage::new(pool, "sqlite::memory:");
		store.init().await.unwrap();
		store
	}

	#[tokio::test]
	async fn test_create_get_round_trip() {
		let store = memory_store().await;
		let mut order = order_at("ECOSPIN-0001", 0);
		order.created_at += Duration::nanoseconds(123_456_789);
		order.mpesa_code = Some("QAB12CD34".to_string());
		order.paid_at = Some(order.created_at + Duration::minutes(5));
		order.pickup_scheduled = true;
		order.pickup_date = Some(order.created_at + Duration::days(1));

		store.create(&order).await.unwrap();
		assert_eq!(store.get(&order.id).await.unwrap(), order);
	}

	#[tokio::test]
	async fn test_duplicate_id_rejected() {
		let store = memory_store().await;
		let order = order_at("ECOSPIN-0001", 0);
		store.create(&order).await.unwrap();
		assert!(matches!(
			store.create(&order).await,
			Err(StorageError::DuplicateId(_))
		));
	}

	#[tokio::test]
	async fn test_update_and_delete() {
		let store = memory_store().await;
		let mut order = order_at("ECOSPIN-0001", 0);
		store.create(&order).await.unwrap();

		order.status = OrderStatus::PickedUp;
		order.admin_notes = "Collected at 10am".to_string();
		store.update(&order).await.unwrap();
		assert_eq!(store.get(&order.id).await.unwrap(), order);

		store.delete(&order.id).await.unwrap();
		assert!(matches!(
			store.get(&order.id).await,
			Err(StorageError::NotFound(_))
		));
		assert!(matches!(
			store.delete(&order.id).await,
			Err(StorageError::NotFound(_))
		));
		assert!(matches!(
			store.update(&order).await,
			Err(StorageError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_list_newest_first() {
		let store = memory_store().await;
		store.create(&order_at("ECOSPIN-0001", 1)).await.unwrap();
		store.create(&order_at("ECOSPIN-0003", 3)).await.unwrap();
		store.create(&order_at("ECOSPIN-0002", 2)).await.unwrap();

		let ids: Vec<String> = store
			.list_all()
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id)
			.collect();
		assert_eq!(ids, vec!["ECOSPIN-0003", "ECOSPIN-0002", "ECOSPIN-0001"]);
	}

	#[tokio::test]
	async fn test_counter_increment_is_atomic() {
		let store = Arc::new(memory_store().await);
		assert_eq!(store.current_counter().await.unwrap(), 1);

		let mut handles = Vec::new();
		for _ in 0..10 {
			let store = store.clone();
			handles.push(tokio::spawn(async move { store.next_counter().await.unwrap() }));
		}
		let mut values = Vec::new();
		for handle in handles {
			values.push(handle.await.unwrap());
		}
		values.sort_unstable();
		assert_eq!(values, (1..=10).collect::<Vec<u64>>());
		assert_eq!(store.current_counter().await.unwrap(), 11);

		store.set_counter(40).await.unwrap();
		assert_eq!(store.next_counter().await.unwrap(), 40);
	}

	#[tokio::test]
	async fn test_factory_with_memory_url() {
		let config: toml::Value = toml::from_str("database_url = \"sqlite::memory:\"").unwrap();
		let store = create_storage(&config).unwrap();
		store.init().await.unwrap();
		store.create(&order_at("ECOSPIN-0001", 0)).await.unwrap();
		assert_eq!(store.list_all().await.unwrap().len(), 1);
		assert_eq!(store.describe().mode, "sqlite");
	}

	#[test]
	fn test_schema_requires_sqlite_url() {
		let config: toml::Value =
			toml::from_str("database_url = \"postgres://localhost/db\"").unwrap();
		assert!(SqliteStorageSchema.validate(&config).is_err());
		let config: toml::Value = toml::from_str("max_connections = 2").unwrap();
		assert!(SqliteStorageSchema.validate(&config).is_err());
	}
}
