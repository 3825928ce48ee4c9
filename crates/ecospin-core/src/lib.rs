//! Core order engine for the EcoSpin backend.
//!
//! This crate ties the order store, the in-process cache, the identifier
//! allocator and the notification service together behind [`OrderEngine`],
//! which implements the order lifecycle. The [`builder`] module wires the
//! engine from configuration and [`migrate`] copies data between backends.

pub mod allocator;
pub mod builder;
pub mod cache;
pub mod engine;
pub mod migrate;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{build_storage, BuilderError, EngineBuilder, EngineFactories};
pub use engine::{BackgroundTasks, OrderEngine, OrderError};
pub use migrate::{migrate, MigrationReport};
