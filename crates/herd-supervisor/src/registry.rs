//! ProcessSpec registry: parse an `apps` document into an ordered list of
//! immutable [`ProcessSpec`]s.
//!
//! Loading is pure. Nothing is spawned and, apart from [`load_file`] reading
//! its input, the filesystem is not touched; relative paths are resolved
//! against the directory the document came from.
//!
//! ```toml
//! [[apps]]
//! name = "tg-sender"
//! script = "./sender.py"
//! interpreter = "./venv/bin/python"
//! args = "--loop"
//! env = { PYTHONUNBUFFERED = "1" }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;
use crate::spec::{ProcessSpec, RestartPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Toml,
	Json,
}

impl Format {
	pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
		match path.extension().and_then(|e| e.to_str()) {
			Some("toml") => Ok(Format::Toml),
			Some("json") => Ok(Format::Json),
			other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string())),
		}
	}

	fn name(&self) -> &'static str {
		match self {
			Format::Toml => "toml",
			Format::Json => "json",
		}
	}
}

/// Values applied to every app that does not set them itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
	pub restart: RestartPolicy,
	pub stop_timeout: Duration,
	/// Merged under each app's own `env`.
	pub env: BTreeMap<String, String>,
}

impl Default for Defaults {
	fn default() -> Self {
		Self {
			restart: RestartPolicy::default(),
			stop_timeout: Duration::from_secs(5),
			env: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Deserialize)]
struct Document {
	#[serde(default)]
	apps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawApp {
	name: Option<String>,
	#[serde(alias = "command")]
	script: Option<String>,
	interpreter: Option<String>,
	args: Option<RawArgs>,
	cwd: Option<String>,
	env: Option<Value>,
	autorestart: Option<bool>,
	watch: Option<Value>,
	autostart: Option<bool>,
	#[serde(alias = "max_restarts")]
	max_retries: Option<u32>,
	#[serde(alias = "exp_backoff_restart_delay")]
	restart_delay_ms: Option<u64>,
	max_restart_delay_ms: Option<u64>,
	#[serde(alias = "kill_timeout")]
	stop_timeout_ms: Option<u64>,
	#[serde(alias = "min_uptime")]
	reset_after_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArgs {
	Line(String),
	List(Vec<String>),
}

/// Read and parse a config file. The format follows the extension and
/// relative paths resolve against the file's directory.
pub fn load_file(path: &Path, defaults: &Defaults) -> Result<Vec<ProcessSpec>, ConfigError> {
	let read_err = |source| ConfigError::Read { path: path.to_path_buf(), source };
	let format = Format::from_path(path)?;
	let source = std::fs::read_to_string(path).map_err(read_err)?;
	let path = path.canonicalize().map_err(read_err)?;
	let base_dir = path.parent().unwrap_or(Path::new("/"));
	load(&source, format, base_dir, defaults)
}

pub fn load(
	source: &str,
	format: Format,
	base_dir: &Path,
	defaults: &Defaults,
) -> Result<Vec<ProcessSpec>, ConfigError> {
	let parse_err = |message: String| ConfigError::Parse { format: format.name(), message };
	let doc: Document = match format {
		Format::Toml => toml::from_str(source).map_err(|e| parse_err(e.to_string()))?,
		Format::Json => serde_json::from_str(source).map_err(|e| parse_err(e.to_string()))?,
	};

	let specs = doc
		.apps
		.into_iter()
		.enumerate()
		.map(|(index, value)| build_spec(index, value, base_dir, defaults))
		.collect::<Result<Vec<_>, _>>()?;

	ensure_unique(&specs)?;
	Ok(specs)
}

pub fn ensure_unique(specs: &[ProcessSpec]) -> Result<(), ConfigError> {
	let mut seen = HashSet::new();
	for spec in specs {
		if !seen.insert(spec.name.as_str()) {
			return Err(ConfigError::DuplicateName(spec.name.clone()));
		}
	}
	Ok(())
}

fn build_spec(
	index: usize,
	value: Value,
	base_dir: &Path,
	defaults: &Defaults,
) -> Result<ProcessSpec, ConfigError> {
	let label = value
		.get("name")
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| format!("app #{}", index));
	if !value.is_object() {
		return Err(ConfigError::InvalidField {
			name: label,
			field: "apps",
			reason: "expected a table".to_string(),
		});
	}
	let raw: RawApp = serde_json::from_value(value).map_err(|e| ConfigError::InvalidField {
		name: label,
		field: "apps",
		reason: e.to_string(),
	})?;

	let name = raw
		.name
		.map(|n| n.trim().to_string())
		.filter(|n| !n.is_empty())
		.ok_or(ConfigError::MissingField { index, field: "name" })?;
	validate_name(&name)?;

	let script = raw
		.script
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.ok_or(ConfigError::MissingField { index, field: "script" })?;

	let cwd = resolve_cwd(base_dir, raw.cwd.as_deref());
	let interpreter = resolve_interpreter(raw.interpreter.as_deref(), &script)
		.map(|i| resolve_program(&cwd, &i));
	let script = resolve_program(&cwd, &script);

	let args = match raw.args {
		None => Vec::new(),
		Some(RawArgs::List(list)) => list,
		Some(RawArgs::Line(line)) => split_args(&line).ok_or_else(|| ConfigError::InvalidField {
			name: name.clone(),
			field: "args",
			reason: "unbalanced quote".to_string(),
		})?,
	};

	let mut env = defaults.env.clone();
	env.extend(parse_env(&name, raw.env)?);

	let watch = match raw.watch {
		None => false,
		Some(Value::Bool(b)) => b,
		Some(Value::Array(paths)) => !paths.is_empty(),
		Some(_) => {
			return Err(ConfigError::InvalidField {
				name,
				field: "watch",
				reason: "expected a boolean or a list of paths".to_string(),
			})
		}
	};

	let base = &defaults.restart;
	let restart = RestartPolicy {
		autorestart: raw.autorestart.unwrap_or(base.autorestart),
		backoff: BackoffPolicy {
			first: raw.restart_delay_ms.map(Duration::from_millis).unwrap_or(base.backoff.first),
			max: raw.max_restart_delay_ms.map(Duration::from_millis).unwrap_or(base.backoff.max),
			factor: base.backoff.factor,
		},
		max_retries: raw.max_retries.or(base.max_retries),
		reset_after: raw.reset_after_ms.map(Duration::from_millis).unwrap_or(base.reset_after),
	};

	Ok(ProcessSpec {
		name,
		script,
		interpreter,
		args,
		cwd,
		env,
		restart,
		watch,
		autostart: raw.autostart.unwrap_or(true),
		stop_timeout: raw.stop_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.stop_timeout),
	})
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
	let bad = name == "."
		|| name == ".."
		|| name.chars().any(|c| c == '/' || c == '\0' || c.is_whitespace());
	if bad {
		return Err(ConfigError::InvalidField {
			name: name.to_string(),
			field: "name",
			reason: "must not contain '/', whitespace or NUL".to_string(),
		});
	}
	Ok(())
}

fn parse_env(name: &str, env: Option<Value>) -> Result<BTreeMap<String, String>, ConfigError> {
	let invalid = |key: &str, reason: &str| ConfigError::InvalidEnv {
		name: name.to_string(),
		key: key.to_string(),
		reason: reason.to_string(),
	};

	let map = match env {
		None => return Ok(BTreeMap::new()),
		Some(Value::Object(map)) => map,
		Some(_) => return Err(invalid("env", "expected a table of KEY = value")),
	};

	let mut out = BTreeMap::new();
	for (key, value) in map {
		if key.is_empty() {
			return Err(invalid(&key, "empty variable name"));
		}
		if key.contains('=') || key.contains('\0') {
			return Err(invalid(&key, "name must not contain '=' or NUL"));
		}
		let value = match value {
			Value::String(s) => s,
			Value::Number(n) => n.to_string(),
			Value::Bool(b) => b.to_string(),
			Value::Null | Value::Array(_) | Value::Object(_) => {
				return Err(invalid(&key, "expected a string, number or boolean"))
			}
		};
		if value.contains('\0') {
			return Err(invalid(&key, "value must not contain NUL"));
		}
		out.insert(key, value);
	}
	Ok(out)
}

/// `none` runs the script directly; an absent interpreter is inferred from
/// the script's extension.
fn resolve_interpreter(explicit: Option<&str>, script: &str) -> Option<String> {
	match explicit.map(str::trim) {
		Some(i) if i.eq_ignore_ascii_case("none") || i.is_empty() => None,
		Some(i) => Some(i.to_string()),
		None => {
			let ext = Path::new(script).extension().and_then(|e| e.to_str())?;
			let inferred = match ext {
				"py" => "python3",
				"js" | "mjs" | "cjs" => "node",
				"sh" => "sh",
				_ => return None,
			};
			Some(inferred.to_string())
		}
	}
}

fn resolve_cwd(base_dir: &Path, cwd: Option<&str>) -> PathBuf {
	match cwd {
		Some(dir) => base_dir.join(expand_tilde(dir)),
		None => base_dir.to_path_buf(),
	}
}

/// Paths with a separator resolve against `cwd`; bare names stay for `PATH`.
fn resolve_program(cwd: &Path, program: &str) -> String {
	if !program.contains('/') && !program.starts_with('~') {
		return program.to_string();
	}
	cwd.join(expand_tilde(program)).to_string_lossy().to_string()
}

fn expand_tilde(path: &str) -> PathBuf {
	if let Some(rest) = path.strip_prefix("~/") {
		if let Ok(home) = std::env::var("HOME") {
			return PathBuf::from(home).join(rest);
		}
	}
	PathBuf::from(path)
}

/// Whitespace split honouring single and double quotes. `None` on an
/// unbalanced quote.
fn split_args(line: &str) -> Option<Vec<String>> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut in_word = false;
	let mut quote: Option<char> = None;

	for c in line.chars() {
		match quote {
			Some(q) if c == q => quote = None,
			Some(_) => current.push(c),
			None if c == '"' || c == '\'' => {
				quote = Some(c);
				in_word = true;
			}
			None if c.is_whitespace() => {
				if in_word {
					args.push(std::mem::take(&mut current));
					in_word = false;
				}
			}
			None => {
				current.push(c);
				in_word = true;
			}
		}
	}

	if quote.is_some() {
		return None;
	}
	if in_word {
		args.push(current);
	}
	Some(args)
}
