//! Error taxonomy.
//!
//! [`ConfigError`] is fatal at load time. [`Error`] covers control operations;
//! every variant except `Config` and `ShutdownTimeout` names the process it
//! concerns, and failures of one process never affect its siblings.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", .path.display())]
	Read { path: PathBuf, source: io::Error },
	#[error("unsupported config format '{0}' (expected .toml or .json)")]
	UnsupportedFormat(String),
	#[error("failed to parse {format} config: {message}")]
	Parse { format: &'static str, message: String },
	#[error("app #{index}: missing required field '{field}'")]
	MissingField { index: usize, field: &'static str },
	#[error("{name}: invalid value for '{field}': {reason}")]
	InvalidField { name: String, field: &'static str, reason: String },
	#[error("{name}: invalid env entry '{key}': {reason}")]
	InvalidEnv { name: String, key: String, reason: String },
	#[error("duplicate process name '{0}'")]
	DuplicateName(String),
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("{name}: unknown process")]
	UnknownProcess { name: String },
	#[error("{name}: failed to spawn {program}: {source}")]
	Spawn { name: String, program: String, source: io::Error },
	#[error("{name}: did not exit within {timeout:?} of SIGTERM, killed")]
	Timeout { name: String, timeout: Duration },
	#[error("{name}: gave up after {retries} consecutive failures")]
	ExhaustedRetries { name: String, retries: u32 },
	#[error("shutdown grace {grace:?} exceeded; forced: {stuck:?}")]
	ShutdownTimeout { grace: Duration, stuck: Vec<String> },
	#[error("{name}: controller is no longer running")]
	ControllerGone { name: String },
}

/// Serializable error category, carried across the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Config,
	UnknownName,
	Spawn,
	Timeout,
	ExhaustedRetries,
	Internal,
}

impl ErrorKind {
	/// Process exit code for the control CLI.
	pub fn exit_code(&self) -> i32 {
		match self {
			ErrorKind::UnknownName => 1,
			ErrorKind::Config => 2,
			ErrorKind::Timeout => 3,
			ErrorKind::Spawn | ErrorKind::ExhaustedRetries | ErrorKind::Internal => 4,
		}
	}

	pub fn as_label(&self) -> &'static str {
		match self {
			ErrorKind::Config => "config_error",
			ErrorKind::UnknownName => "unknown_name",
			ErrorKind::Spawn => "spawn_error",
			ErrorKind::Timeout => "timeout",
			ErrorKind::ExhaustedRetries => "exhausted_retries",
			ErrorKind::Internal => "internal",
		}
	}
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Config(_) => ErrorKind::Config,
			Error::UnknownProcess { .. } => ErrorKind::UnknownName,
			Error::Spawn { .. } => ErrorKind::Spawn,
			Error::Timeout { .. } | Error::ShutdownTimeout { .. } => ErrorKind::Timeout,
			Error::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
			Error::ControllerGone { .. } => ErrorKind::Internal,
		}
	}

	/// The process this error concerns, if it concerns exactly one.
	pub fn process(&self) -> Option<&str> {
		match self {
			Error::UnknownProcess { name }
			| Error::Spawn { name, .. }
			| Error::Timeout { name, .. }
			| Error::ExhaustedRetries { name, .. }
			| Error::ControllerGone { name } => Some(name),
			Error::Config(_) | Error::ShutdownTimeout { .. } => None,
		}
	}
}
