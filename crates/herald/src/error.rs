//! Error types for the herald service and its configuration.

use std::path::PathBuf;

use herald_worker::DispatchError;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A value parsed but is not acceptable.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		/// Dotted path of the offending field.
		field: String,
		reason: String,
	},
}

impl ConfigError {
	pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::Invalid {
			field: field.into(),
			reason: reason.into(),
		}
	}
}

/// Errors crossing the [`Herald`](crate::Herald) boundary.
#[derive(Debug, Error)]
pub enum HeraldError {
	/// The service was shut down.
	#[error("herald is not running")]
	NotRunning,

	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The dispatcher could not start its global context.
	#[error("dispatcher failed to start: {0}")]
	Dispatch(#[from] DispatchError),

	#[error("message key cannot be empty")]
	EmptyKey,
}

pub type Result<T> = std::result::Result<T, HeraldError>;
