//! State management for orders.
//!
//! This module provides the state machine that applies lifecycle changes to
//! order records, persisting each change to the store and then patching the
//! cache in the same operation.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
