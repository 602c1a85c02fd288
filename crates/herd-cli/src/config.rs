use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use herd_ipc::DaemonPaths;
use herd_supervisor::registry::Defaults;
use herd_supervisor::{BackoffPolicy, RestartPolicy};
use serde::Deserialize;

// ── Global config (~/.config/herd/config.toml) ──────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GlobalConfig {
	#[serde(default)]
	pub daemon: DaemonConfig,
	#[serde(default)]
	pub logs: LogsConfig,
	#[serde(default)]
	pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
	#[serde(default = "default_port")]
	pub port: u16,
	/// Per-process grace period used when the daemon shuts down.
	#[serde(default = "default_stop_timeout_ms")]
	pub stop_timeout_ms: u64,
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self { port: default_port(), stop_timeout_ms: default_stop_timeout_ms() }
	}
}

impl DaemonConfig {
	pub fn stop_timeout(&self) -> Duration {
		Duration::from_millis(self.stop_timeout_ms)
	}
}

fn default_port() -> u16 { 13370 }
fn default_stop_timeout_ms() -> u64 { 5000 }

#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
	#[serde(default = "default_max_size")]
	pub max_size_bytes: u64,
	#[serde(default = "default_max_age_days")]
	pub max_age_days: u32,
	#[serde(default = "default_max_files")]
	pub max_files: u32,
}

impl Default for LogsConfig {
	fn default() -> Self {
		Self {
			max_size_bytes: default_max_size(),
			max_age_days: default_max_age_days(),
			max_files: default_max_files(),
		}
	}
}

fn default_max_size() -> u64 { 10 * 1024 * 1024 }
fn default_max_age_days() -> u32 { 7 }
fn default_max_files() -> u32 { 5 }

/// Fallbacks for fields an app entry leaves out.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
	#[serde(default = "default_true")]
	pub autorestart: bool,
	#[serde(default)]
	pub max_retries: Option<u32>,
	#[serde(default = "default_restart_delay_ms")]
	pub restart_delay_ms: u64,
	#[serde(default = "default_max_restart_delay_ms")]
	pub max_restart_delay_ms: u64,
	#[serde(default = "default_stop_timeout_ms")]
	pub stop_timeout_ms: u64,
	#[serde(default = "default_env")]
	pub env: BTreeMap<String, String>,
}

impl Default for DefaultsConfig {
	fn default() -> Self {
		Self {
			autorestart: true,
			max_retries: None,
			restart_delay_ms: default_restart_delay_ms(),
			max_restart_delay_ms: default_max_restart_delay_ms(),
			stop_timeout_ms: default_stop_timeout_ms(),
			env: default_env(),
		}
	}
}

fn default_true() -> bool { true }
fn default_restart_delay_ms() -> u64 { 1000 }
fn default_max_restart_delay_ms() -> u64 { 60_000 }
fn default_env() -> BTreeMap<String, String> {
	let mut env = BTreeMap::new();
	env.insert("FORCE_COLOR".into(), "1".into());
	env
}

impl DefaultsConfig {
	pub fn to_defaults(&self) -> Defaults {
		Defaults {
			restart: RestartPolicy {
				autorestart: self.autorestart,
				backoff: BackoffPolicy {
					first: Duration::from_millis(self.restart_delay_ms),
					max: Duration::from_millis(self.max_restart_delay_ms.max(self.restart_delay_ms)),
					..BackoffPolicy::default()
				},
				max_retries: self.max_retries,
				..RestartPolicy::default()
			},
			stop_timeout: Duration::from_millis(self.stop_timeout_ms),
			env: self.env.clone(),
		}
	}
}

pub fn parse_global_config(content: &str) -> Result<GlobalConfig, toml::de::Error> {
	toml::from_str(content)
}

pub fn load_global_config(paths: &DaemonPaths) -> GlobalConfig {
	let path = paths.config_dir().join("config.toml");
	if path.exists() {
		match std::fs::read_to_string(&path) {
			Ok(content) => match parse_global_config(&content) {
				Ok(config) => return config,
				Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
			},
			Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
		}
	}
	GlobalConfig::default()
}

// ── App definitions ──────────────────────────────────────────────────────────

/// The app definitions file: `--config` if given, else `apps.toml` (or
/// `apps.json`) in the config directory. Always absolute, since the daemon
/// is started from wherever the CLI happened to run.
pub fn apps_path(explicit: Option<&Path>, paths: &DaemonPaths) -> PathBuf {
	let path = match explicit {
		Some(p) => p.to_path_buf(),
		None => {
			let dir = paths.config_dir();
			let json = dir.join("apps.json");
			if !dir.join("apps.toml").exists() && json.exists() {
				json
			} else {
				dir.join("apps.toml")
			}
		}
	};
	if path.is_absolute() {
		return path;
	}
	std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
}
