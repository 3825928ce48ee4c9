//! Registry trait for self-registering implementations.
//!
//! Storage backends and notification transports each expose a `Registry`
//! struct so the builder can map the names used in configuration files to
//! factory functions.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "file" for `[storage.implementations.file]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
