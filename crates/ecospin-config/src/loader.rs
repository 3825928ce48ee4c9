//! Loader for configurations split across several files.
//!
//! The entry file may name other files in an `include` directive. Included
//! files are merged section by section into the entry file; a top-level
//! section defined twice, or a file included twice, is rejected.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that follows `include` directives.
pub struct ConfigLoader {
	/// Directory that relative paths are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, to detect include cycles.
	visited: HashSet<PathBuf>,
	/// File that defined each top-level section, for error messages.
	section_owner: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			visited: HashSet::new(),
			section_owner: HashMap::new(),
		}
	}

	/// Loads the entry file and every file it includes, then validates.
	pub async fn load_config(&mut self, entry: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let entry_path = self.resolve_path(entry)?;
		let mut root = self.read_toml(&entry_path).await?;
		let includes = take_includes(&mut root)?;

		if let Some(table) = root.as_table() {
			for key in table.keys() {
				self.section_owner.insert(key.clone(), entry_path.clone());
			}
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let included = self.read_toml(&include_path).await?;
			self.merge(&mut root, included, &include_path)?;
		}

		Config::from_value(root)
	}

	/// Reads a file, resolves environment variables and parses it as TOML.
	async fn read_toml(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	fn merge(
		&mut self,
		root: &mut toml::Value,
		included: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let toml::Value::Table(sections) = included else {
			return Ok(());
		};
		if sections.contains_key("include") {
			return Err(ConfigError::Validation(format!(
				"Nested include in {} is not supported",
				source.display()
			)));
		}
		let Some(root_table) = root.as_table_mut() else {
			return Ok(());
		};

		for (key, value) in sections {
			if let Some(owner) = self.section_owner.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					owner.display(),
					source.display()
				)));
			}
			self.section_owner.insert(key.clone(), source.to_path_buf());
			root_table.insert(key, value);
		}
		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Removes the `include` directive from the root table and returns its paths.
fn take_includes(root: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let Some(value) = root.as_table_mut().and_then(|t| t.remove("include")) else {
		return Ok(Vec::new());
	};

	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const BUSINESS: &str = r#"
[business]
mpesa_number = "0700111222"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "file"
[storage.implementations.file]
storage_path = "./data"
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("config.toml"),
			format!("{}{}", BUSINESS, STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("config.toml").await.unwrap();
		assert_eq!(config.storage.primary, "file");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = [\"storage.toml\", \"notify.toml\"]\n{}", BUSINESS),
		)
		.unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();
		fs::write(
			temp_dir.path().join("notify.toml"),
			"[notifications]\nprimary = \"log\"\nadmin_email = \"admin@ecospin.test\"\n[notifications.implementations.log]\n",
		)
		.unwrap();

		let config = Config::from_file(temp_dir.path().join("main.toml").to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.business.mpesa_number, "0700111222");
		assert_eq!(config.notifications.as_ref().unwrap().primary, "log");
	}

	#[tokio::test]
	async fn test_duplicate_section_rejected() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = \"storage.toml\"\n{}{}", BUSINESS, STORAGE),
		)
		.unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'storage'"));
	}

	#[tokio::test]
	async fn test_self_include_detected() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = [\"main.toml\"]\n{}{}", BUSINESS, STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Circular include"));
	}

	#[tokio::test]
	async fn test_missing_include_file() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = [\"absent.toml\"]\n{}{}", BUSINESS, STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Io(_))
		));
	}
}
