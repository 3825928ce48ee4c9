//! Configuration for the EcoSpin order backend.
//!
//! Configuration is read from a TOML file. `${VAR}` and `${VAR:-default}`
//! placeholders are replaced from the environment before parsing, and the
//! parsed result is validated before it is handed to the engine builder.
//!
//! ## Modular Configuration Support
//!
//! A file may pull in others with `include = ["storage.toml"]`. Every
//! top-level section must be defined in exactly one file.

mod loader;

pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Business identity and payment details.
	pub business: BusinessConfig,
	/// Order store backends.
	pub storage: StorageConfig,
	#[serde(default)]
	pub cache: CacheConfig,
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
	/// Notification transport. Absent means notifications are disabled.
	pub notifications: Option<NotificationsConfig>,
	#[serde(default)]
	pub api: ApiConfig,
}

/// Business identity shown to customers and used for order ids.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusinessConfig {
	#[serde(default = "default_business_name")]
	pub name: String,
	/// Prefix of every order id, e.g. "ECOSPIN" in `ECOSPIN-0001`.
	#[serde(default = "default_order_prefix")]
	pub order_prefix: String,
	/// M-Pesa number customers pay to.
	pub mpesa_number: String,
	#[serde(default = "default_payment_method")]
	pub payment_method: String,
}

/// Returns the default business name.
fn default_business_name() -> String {
	"EcoSpin Laundry".to_string()
}

/// Returns the default order id prefix.
fn default_order_prefix() -> String {
	"ECOSPIN".to_string()
}

/// Returns the default payment method recorded on new orders.
fn default_payment_method() -> String {
	"manual_mpesa".to_string()
}

/// Configuration for the order store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds between background flushes of the store.
	#[serde(default = "default_autosave_interval")]
	pub autosave_interval_seconds: u64,
}

/// Returns the default autosave interval.
///
/// Five minutes, matching how often the flat files were historically saved.
fn default_autosave_interval() -> u64 {
	300
}

/// Configuration for the in-memory order cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
	/// Interval in seconds between full reloads of the cache from the store.
	#[serde(default = "default_refresh_interval")]
	pub refresh_interval_seconds: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: default_refresh_interval(),
		}
	}
}

/// Returns the default cache refresh interval.
fn default_refresh_interval() -> u64 {
	60
}

/// How status transitions other than payment confirmation are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
	/// Any of the seven statuses may be set from any other.
	#[default]
	Permissive,
	/// Moving to an earlier lifecycle stage is rejected.
	ForwardOnly,
}

/// Configuration for the order lifecycle.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LifecycleConfig {
	#[serde(default)]
	pub transition_policy: TransitionPolicy,
}

/// Configuration for lifecycle notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Recipient of every lifecycle message. Absent disables sending.
	pub admin_email: Option<String>,
	#[serde(default = "default_from_address")]
	pub from_address: String,
	/// Map of transport names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Returns the default sender address.
fn default_from_address() -> String {
	"orders@ecospin.local".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
		}
	}
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Returns the default API timeout in seconds.
fn default_api_timeout() -> u64 {
	30
}

/// Returns the default maximum request size in bytes (1MB).
fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of VAR_NAME, or with `default` for
/// `${VAR_NAME:-default}` when the variable is unset. A placeholder without a
/// default whose variable is unset is an error.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last_end = 0;
	for caps in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			}
		};
		output.push_str(&input[last_end..whole.start()]);
		output.push_str(&value);
		last_end = whole.end();
	}
	output.push_str(&input[last_end..]);

	Ok(output)
}

fn check_interval(name: &str, value: u64) -> Result<(), ConfigError> {
	if value == 0 {
		return Err(ConfigError::Validation(format!(
			"{} must be greater than 0",
			name
		)));
	}
	if value > 86400 {
		return Err(ConfigError::Validation(format!(
			"{} cannot exceed 86400 (24 hours)",
			name
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		loader::ConfigLoader::new(base_dir).load_config(file_name).await
	}

	/// Builds a validated config from an already env-resolved TOML value.
	pub(crate) fn from_value(value: toml::Value) -> Result<Self, ConfigError> {
		let config: Config = value.try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the configuration.
	///
	/// - Business name, order prefix and M-Pesa number are non-empty
	/// - The primary storage implementation is configured
	/// - Background intervals are within 1..=86400 seconds
	/// - The primary notification transport, if any, is configured
	fn validate(&self) -> Result<(), ConfigError> {
		if self.business.name.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Business name cannot be empty".into(),
			));
		}
		let prefix = &self.business.order_prefix;
		if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
			return Err(ConfigError::Validation(format!(
				"Order prefix '{}' must be non-empty and alphanumeric",
				prefix
			)));
		}
		if self.business.mpesa_number.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Business mpesa_number cannot be empty".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		check_interval(
			"storage.autosave_interval_seconds",
			self.storage.autosave_interval_seconds,
		)?;
		check_interval(
			"cache.refresh_interval_seconds",
			self.cache.refresh_interval_seconds,
		)?;

		if let Some(notifications) = &self.notifications {
			if !notifications
				.implementations
				.contains_key(&notifications.primary)
			{
				return Err(ConfigError::Validation(format!(
					"Primary notification transport '{}' not found in implementations",
					notifications.primary
				)));
			}
			if let Some(email) = &notifications.admin_email {
				if !email.trim().is_empty() && !email.contains('@') {
					return Err(ConfigError::Validation(format!(
						"admin_email '{}' is not an email address",
						email
					)));
				}
			}
		}

		if self.api.max_request_size == 0 {
			return Err(ConfigError::Validation(
				"api.max_request_size must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses TOML after resolving environment variables, then validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let value: toml::Value = toml::from_str(&resolved)?;
		Config::from_value(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[business]
mpesa_number = "0700111222"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ECOSPIN_TEST_HOST", "0.0.0.0");
		std::env::set_var("ECOSPIN_TEST_PORT", "8080");

		let input = "bind = \"${ECOSPIN_TEST_HOST}:${ECOSPIN_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "bind = \"0.0.0.0:8080\"");

		std::env::remove_var("ECOSPIN_TEST_HOST");
		std::env::remove_var("ECOSPIN_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "path = \"${ECOSPIN_MISSING_DIR:-./data}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "path = \"./data\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("key = \"${ECOSPIN_MISSING_KEY}\"");
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("ECOSPIN_MISSING_KEY"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.business.name, "EcoSpin Laundry");
		assert_eq!(config.business.order_prefix, "ECOSPIN");
		assert_eq!(config.business.payment_method, "manual_mpesa");
		assert_eq!(config.storage.autosave_interval_seconds, 300);
		assert_eq!(config.cache.refresh_interval_seconds, 60);
		assert_eq!(
			config.lifecycle.transition_policy,
			TransitionPolicy::Permissive
		);
		assert!(config.notifications.is_none());
		assert_eq!(config.api.port, 3000);
	}

	#[test]
	fn test_full_config() {
		std::env::set_var("ECOSPIN_TEST_RELAY_KEY", "secret");
		let config: Config = r#"
[business]
name = "EcoSpin Westlands"
order_prefix = "ECOW"
mpesa_number = "0711000000"

[storage]
primary = "sqlite"
autosave_interval_seconds = 120
[storage.implementations.sqlite]
database_url = "sqlite://./data/ecospin.db"

[cache]
refresh_interval_seconds = 15

[lifecycle]
transition_policy = "forward_only"

[notifications]
primary = "webhook"
admin_email = "admin@ecospin.test"
[notifications.implementations.webhook]
url = "https://relay.ecospin.test/send"
api_key = "${ECOSPIN_TEST_RELAY_KEY}"

[api]
host = "0.0.0.0"
port = 8080
"#
		.parse()
		.unwrap();
		std::env::remove_var("ECOSPIN_TEST_RELAY_KEY");

		assert_eq!(config.business.order_prefix, "ECOW");
		assert_eq!(
			config.lifecycle.transition_policy,
			TransitionPolicy::ForwardOnly
		);
		let notifications = config.notifications.as_ref().unwrap();
		assert_eq!(notifications.primary, "webhook");
		let table = &notifications.implementations["webhook"];
		assert_eq!(table.get("api_key").unwrap().as_str(), Some("secret"));
		assert_eq!(config.api.port, 8080);
	}

	#[test]
	fn test_validation_errors() {
		let missing_primary = MINIMAL.replace("primary = \"memory\"", "primary = \"file\"");
		let err = missing_primary.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));

		let bad_prefix = format!("{}\n", MINIMAL).replace(
			"[business]\n",
			"[business]\norder_prefix = \"ECO SPIN\"\n",
		);
		assert!(bad_prefix.parse::<Config>().is_err());

		let zero_refresh = format!("{}\n[cache]\nrefresh_interval_seconds = 0\n", MINIMAL);
		assert!(zero_refresh
			.parse::<Config>()
			.unwrap_err()
			.to_string()
			.contains("refresh_interval_seconds"));

		let bad_transport = format!(
			"{}\n[notifications]\nprimary = \"smtp\"\n[notifications.implementations.log]\n",
			MINIMAL
		);
		assert!(bad_transport.parse::<Config>().is_err());

		let bad_policy = format!("{}\n[lifecycle]\ntransition_policy = \"strict\"\n", MINIMAL);
		assert!(matches!(
			bad_policy.parse::<Config>(),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn test_missing_business_number() {
		let config = MINIMAL.replace("mpesa_number = \"0700111222\"", "");
		assert!(config.parse::<Config>().is_err());
	}
}
