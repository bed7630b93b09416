//! TOML service configuration.
//!
//! Every field is optional. A missing section or key takes its default, so
//! an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use herald_delivery::{CONSOLE_NAME, QueueOptions};
use herald_markup::ParserOptions;
use herald_worker::{DEFAULT_ASYNC_WORKERS, DEFAULT_REGIONS, DispatchOptions, StrategyPreference};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
	/// `auto`, `unified`, `partitioned` or `async-pool`.
	pub strategy: String,
	pub regions: usize,
	pub async_workers: usize,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			strategy: "auto".to_string(),
			regions: DEFAULT_REGIONS,
			async_workers: DEFAULT_ASYNC_WORKERS,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
	pub cache_ttl_secs: u64,
	pub extra_sounds: Vec<String>,
}

impl Default for MarkupConfig {
	fn default() -> Self {
		Self {
			cache_ttl_secs: 300,
			extra_sounds: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
	pub tick_millis: u64,
	pub substitution_timeout_ms: u64,
	pub idle_reap_secs: u64,
	pub stall_warning_secs: u64,
	pub maintenance_interval_secs: u64,
	pub console_name: String,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			tick_millis: 50,
			substitution_timeout_ms: 100,
			idle_reap_secs: 30,
			stall_warning_secs: 10,
			maintenance_interval_secs: 60,
			console_name: CONSOLE_NAME.to_string(),
		}
	}
}

/// Parsed and validated service configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeraldConfig {
	pub dispatch: DispatchConfig,
	pub markup: MarkupConfig,
	pub delivery: DeliveryConfig,
	/// Named raw messages; nested tables are flattened to dotted keys.
	pub messages: BTreeMap<String, String>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
	dispatch: DispatchConfig,
	markup: MarkupConfig,
	delivery: DeliveryConfig,
	messages: toml::Table,
}

impl HeraldConfig {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let raw: RawConfig = toml::from_str(input)?;
		let mut messages = BTreeMap::new();
		flatten_messages("", raw.messages, &mut messages)?;

		let config = Self {
			dispatch: raw.dispatch,
			markup: raw.markup,
			delivery: raw.delivery,
			messages,
		};
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&input)?;
		tracing::debug!(path = %path.display(), messages = config.messages.len(), "config.load");
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.preference()?;
		if self.dispatch.regions == 0 {
			return Err(ConfigError::invalid("dispatch.regions", "must be at least 1"));
		}
		if self.delivery.tick_millis == 0 {
			return Err(ConfigError::invalid("delivery.tick_millis", "must be at least 1"));
		}
		if self.delivery.maintenance_interval_secs == 0 {
			return Err(ConfigError::invalid("delivery.maintenance_interval_secs", "must be at least 1"));
		}
		if self.delivery.console_name.trim().is_empty() {
			return Err(ConfigError::invalid("delivery.console_name", "cannot be empty"));
		}
		Ok(())
	}

	pub fn preference(&self) -> Result<StrategyPreference, ConfigError> {
		self.dispatch.strategy.parse().map_err(|reason| ConfigError::invalid("dispatch.strategy", reason))
	}

	pub fn dispatch_options(&self) -> Result<DispatchOptions, ConfigError> {
		Ok(DispatchOptions {
			preference: self.preference()?,
			regions: self.dispatch.regions,
			async_workers: self.dispatch.async_workers,
		})
	}

	pub fn parser_options(&self) -> ParserOptions {
		ParserOptions {
			cache_ttl: Duration::from_secs(self.markup.cache_ttl_secs),
			extra_sounds: self.markup.extra_sounds.clone(),
		}
	}

	pub fn queue_options(&self) -> QueueOptions {
		QueueOptions {
			idle_reap: Duration::from_secs(self.delivery.idle_reap_secs),
			stall_warning: Duration::from_secs(self.delivery.stall_warning_secs),
		}
	}

	pub fn tick(&self) -> Duration {
		Duration::from_millis(self.delivery.tick_millis)
	}

	pub fn substitution_timeout(&self) -> Duration {
		Duration::from_millis(self.delivery.substitution_timeout_ms)
	}

	pub fn maintenance_interval(&self) -> Duration {
		Duration::from_secs(self.delivery.maintenance_interval_secs)
	}
}

fn flatten_messages(prefix: &str, table: toml::Table, out: &mut BTreeMap<String, String>) -> Result<(), ConfigError> {
	for (key, value) in table {
		let key = if prefix.is_empty() { key } else { format!("{prefix}.{key}") };
		match value {
			toml::Value::String(raw) => {
				out.insert(key, raw);
			}
			toml::Value::Table(nested) => flatten_messages(&key, nested, out)?,
			other => {
				return Err(ConfigError::invalid(
					format!("messages.{key}"),
					format!("expected a string or table, found {}", other.type_str()),
				));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_input_yields_defaults() {
		let config = HeraldConfig::from_toml_str("").unwrap();
		assert_eq!(config, HeraldConfig::default());
		assert_eq!(config.preference().unwrap(), StrategyPreference::Auto);
		assert_eq!(config.tick(), Duration::from_millis(50));
		assert_eq!(config.substitution_timeout(), Duration::from_millis(100));
		assert_eq!(config.parser_options().cache_ttl, Duration::from_secs(300));
	}

	#[test]
	fn partial_sections_keep_remaining_defaults() {
		let config = HeraldConfig::from_toml_str(
			r#"
			[dispatch]
			strategy = "async-pool"

			[delivery]
			idle_reap_secs = 5
			"#,
		)
		.unwrap();
		assert_eq!(config.preference().unwrap(), StrategyPreference::AsyncPool);
		assert_eq!(config.dispatch.regions, DEFAULT_REGIONS);
		assert_eq!(config.queue_options().idle_reap, Duration::from_secs(5));
		assert_eq!(config.queue_options().stall_warning, Duration::from_secs(10));
	}

	#[test]
	fn nested_messages_flatten_to_dotted_keys() {
		let config = HeraldConfig::from_toml_str(
			r#"
			[messages]
			welcome = "<title>Welcome|{player}</title>"

			[messages.errors]
			no_permission = "You cannot do that."
			"#,
		)
		.unwrap();
		let keys: Vec<_> = config.messages.keys().map(String::as_str).collect();
		assert_eq!(keys, vec!["errors.no_permission", "welcome"]);
	}

	#[test]
	fn invalid_values_are_rejected() {
		let err = HeraldConfig::from_toml_str("[dispatch]\nstrategy = \"sharded\"").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "dispatch.strategy"), "{err}");

		let err = HeraldConfig::from_toml_str("[dispatch]\nregions = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "dispatch.regions"));

		let err = HeraldConfig::from_toml_str("[messages]\ncount = 3").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "messages.count"));
	}

	#[test]
	fn unknown_keys_and_bad_types_are_toml_errors() {
		assert!(matches!(HeraldConfig::from_toml_str("[markup]\nttl = 3"), Err(ConfigError::Toml(_))));
		assert!(matches!(HeraldConfig::from_toml_str("[delivery]\ntick_millis = \"fast\""), Err(ConfigError::Toml(_))));
	}
}
