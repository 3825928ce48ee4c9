//! Lifecycle management for the order engine.
//!
//! Handles startup loading, the background refresh and autosave timers, and
//! the final flush on shutdown.

use super::{OrderEngine, OrderError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handles of the background timers started by
/// [`OrderEngine::spawn_background_tasks`].
pub struct BackgroundTasks {
	refresh: JoinHandle<()>,
	autosave: JoinHandle<()>,
}

impl BackgroundTasks {
	pub fn abort(&self) {
		self.refresh.abort();
		self.autosave.abort();
	}
}

fn ticker(seconds: u64) -> tokio::time::Interval {
	let period = Duration::from_secs(seconds);
	let mut interval = interval_at(Instant::now() + period, period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	interval
}

impl OrderEngine {
	/// Prepares the store and loads every order into the cache.
	pub async fn initialize(&self) -> Result<(), OrderError> {
		tracing::info!("Initializing order engine");

		self.storage.init().await?;
		let loaded = self.cache.refresh_all(&self.storage).await?.unwrap_or(0);
		let counter = self.storage.current_counter().await?;

		tracing::info!(orders = loaded, next_counter = counter, "Orders loaded");
		Ok(())
	}

	/// Starts the cache refresh and store autosave timers.
	///
	/// The two loops are independent tasks and never wait on request
	/// handling; a failed tick is logged and retried on the next one.
	pub fn spawn_background_tasks(&self) -> BackgroundTasks {
		let storage = self.storage.clone();
		let cache = self.cache.clone();
		let mut refresh_interval = ticker(self.config.cache.refresh_interval_seconds);
		let refresh = tokio::spawn(async move {
			loop {
				refresh_interval.tick().await;
				match cache.refresh_all(&storage).await {
					Ok(Some(count)) => {
						tracing::debug!(orders = count, "Cache refreshed");
					}
					Ok(None) => {
						tracing::debug!("Cache refresh skipped, concurrent write");
					}
					Err(e) => {
						tracing::warn!(error = %e, "Cache refresh failed");
					}
				}
			}
		});

		let storage = self.storage.clone();
		let mut autosave_interval = ticker(self.config.storage.autosave_interval_seconds);
		let autosave = tokio::spawn(async move {
			loop {
				autosave_interval.tick().await;
				match storage.flush().await {
					Ok(()) => tracing::debug!("Autosave complete"),
					Err(e) => tracing::warn!(error = %e, "Autosave failed"),
				}
			}
		});

		BackgroundTasks { refresh, autosave }
	}

	/// Stops the timers and performs a final flush of the store.
	pub async fn shutdown(&self, tasks: Option<BackgroundTasks>) -> Result<(), OrderError> {
		tracing::info!("Shutting down order engine");

		if let Some(tasks) = tasks {
			tasks.abort();
		}

		self.storage.flush().await?;
		Ok(())
	}
}
