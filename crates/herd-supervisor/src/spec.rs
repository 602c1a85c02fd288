use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::BackoffPolicy;

/// How a controller reacts when its process exits without being asked to.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
	pub autorestart: bool,
	pub backoff: BackoffPolicy,
	/// Consecutive failures tolerated before giving up. `None` retries forever.
	pub max_retries: Option<u32>,
	/// A run lasting at least this long clears the consecutive failure count.
	pub reset_after: Duration,
}

impl Default for RestartPolicy {
	fn default() -> Self {
		Self {
			autorestart: true,
			backoff: BackoffPolicy::default(),
			max_retries: None,
			reset_after: Duration::from_secs(30),
		}
	}
}

/// Declarative description of one supervised process.
///
/// Built by the [`registry`](crate::registry) and never mutated afterwards.
/// Paths are already resolved: `cwd` is absolute, and `script`/`interpreter`
/// are either absolute or bare names left to `PATH` lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
	pub name: String,
	pub script: String,
	/// Program that runs `script`. `None` executes `script` directly.
	pub interpreter: Option<String>,
	pub args: Vec<String>,
	pub cwd: PathBuf,
	/// Merged over the supervisor's own environment at spawn time.
	pub env: BTreeMap<String, String>,
	pub restart: RestartPolicy,
	/// Parsed for compatibility; file watching is not implemented.
	pub watch: bool,
	pub autostart: bool,
	pub stop_timeout: Duration,
}

impl ProcessSpec {
	/// A spec running `script` directly with default policies.
	pub fn new(name: impl Into<String>, script: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
		Self {
			name: name.into(),
			script: script.into(),
			interpreter: None,
			args: Vec::new(),
			cwd: cwd.into(),
			env: BTreeMap::new(),
			restart: RestartPolicy::default(),
			watch: false,
			autostart: true,
			stop_timeout: Duration::from_secs(5),
		}
	}

	pub fn program(&self) -> &str {
		self.interpreter.as_deref().unwrap_or(&self.script)
	}

	pub fn argv(&self) -> Vec<String> {
		let mut argv = Vec::with_capacity(self.args.len() + 1);
		if self.interpreter.is_some() {
			argv.push(self.script.clone());
		}
		argv.extend(self.args.iter().cloned());
		argv
	}

	pub fn command_line(&self) -> String {
		std::iter::once(self.program().to_string())
			.chain(self.argv())
			.collect::<Vec<_>>()
			.join(" ")
	}
}
