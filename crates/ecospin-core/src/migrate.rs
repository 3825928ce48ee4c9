//! One-shot copy of every order and the counter between two backends.
//!
//! Typically used to move a file-backed deployment onto SQLite. The copy is
//! skipped entirely when the target already holds orders, and a failure to
//! copy one order is logged and counted rather than aborting the run.

use chrono::Utc;
use ecospin_storage::{StorageError, StorageService};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
	/// True when the target was not empty and nothing was copied.
	pub skipped: bool,
	pub migrated: usize,
	pub failed: usize,
	pub counter: u64,
	/// Snapshot files written next to the source data.
	pub backups: Vec<PathBuf>,
}

/// Copies `source` into `target`.
pub async fn migrate(
	source: &StorageService,
	target: &StorageService,
) -> Result<MigrationReport, StorageError> {
	source.init().await?;
	target.init().await?;

	let orders = source.list_all().await?;
	let counter = source.current_counter().await?;
	tracing::info!(orders = orders.len(), counter, "Source loaded");

	let existing = target.list_all().await?.len();
	if existing > 0 {
		tracing::warn!(
			existing,
			"Target already contains orders, migration skipped to prevent duplicates"
		);
		return Ok(MigrationReport {
			skipped: true,
			counter,
			..Default::default()
		});
	}

	target.set_counter(counter).await?;
	tracing::info!(counter, "Counter migrated");

	let mut report = MigrationReport {
		counter,
		..Default::default()
	};
	for order in &orders {
		match target.create(order).await {
			Ok(()) => report.migrated += 1,
			Err(e) => {
				tracing::error!(order_id = %order.id, error = %e, "Failed to migrate order");
				report.failed += 1;
			}
		}
	}
	target.flush().await?;
	tracing::info!(migrated = report.migrated, failed = report.failed, "Migration completed");

	let info = source.describe();
	if let Some(location) = info.location.filter(|_| info.mode == "file") {
		let snapshot: BTreeMap<&str, _> = orders.iter().map(|o| (o.id.as_str(), o)).collect();
		match write_backups(Path::new(&location), &snapshot, counter).await {
			Ok(paths) => {
				for path in &paths {
					tracing::info!(path = %path.display(), "Backup written");
				}
				report.backups = paths;
			}
			Err(e) => tracing::warn!(error = %e, "Could not write backup of source files"),
		}
	}

	Ok(report)
}

async fn write_backups<T: serde::Serialize>(
	location: &Path,
	orders: &T,
	counter: u64,
) -> Result<Vec<PathBuf>, StorageError> {
	let dir = location.join("backup");
	tokio::fs::create_dir_all(&dir)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;

	let date = Utc::now().format("%Y-%m-%d");
	let orders_path = dir.join(format!("orders_backup_{}.json", date));
	let counter_path = dir.join(format!("counter_backup_{}.json", date));

	tokio::fs::write(&orders_path, serde_json::to_vec_pretty(orders)?)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	tokio::fs::write(
		&counter_path,
		serde_json::to_vec_pretty(&json!({ "counter": counter }))?,
	)
	.await
	.map_err(|e| StorageError::Backend(e.to_string()))?;

	Ok(vec![orders_path, counter_path])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::order_at;
	use ecospin_storage::implementations::{file::FileStorage, memory::MemoryStorage};

	#[tokio::test]
	async fn test_migrate_file_to_memory() {
		let dir = tempfile::tempdir().unwrap();
		let source = StorageService::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
		source.init().await.unwrap();
		for i in 1..=3 {
			let id = source.next_counter().await.unwrap();
			source
				.create(&order_at(&format!("ECOSPIN-{:04}", id), i))
				.await
				.unwrap();
		}

		let target = StorageService::new(Box::new(MemoryStorage::new()));
		let report = migrate(&source, &target).await.unwrap();

		assert!(!report.skipped);
		assert_eq!(report.migrated, 3);
		assert_eq!(report.failed, 0);
		assert_eq!(report.counter, 4);
		assert_eq!(target.current_counter().await.unwrap(), 4);
		assert_eq!(target.list_all().await.unwrap(), source.list_all().await.unwrap());

		assert_eq!(report.backups.len(), 2);
		for path in &report.backups {
			assert!(path.starts_with(dir.path().join("backup")));
			assert!(path.exists());
		}
		let counter: serde_json::Value =
			serde_json::from_slice(&std::fs::read(&report.backups[1]).unwrap()).unwrap();
		assert_eq!(counter["counter"], 4);
	}

	#[tokio::test]
	async fn test_migrate_skips_non_empty_target() {
		let source = StorageService::new(Box::new(MemoryStorage::new()));
		source.create(&order_at("ECOSPIN-0001", 0)).await.unwrap();

		let target = StorageService::new(Box::new(MemoryStorage::new()));
		target.create(&order_at("ECOSPIN-0100", 0)).await.unwrap();

		let report = migrate(&source, &target).await.unwrap();
		assert!(report.skipped);
		assert_eq!(report.migrated, 0);
		assert_eq!(target.list_all().await.unwrap().len(), 1);
		assert!(report.backups.is_empty());
	}
}
