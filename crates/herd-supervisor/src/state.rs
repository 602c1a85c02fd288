use std::fmt;
use std::process::ExitStatus;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
	Stopped,
	Starting,
	Running,
	Stopping,
	Crashed,
}

impl fmt::Display for ProcessStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ProcessStatus::Stopped => "stopped",
			ProcessStatus::Starting => "starting",
			ProcessStatus::Running => "running",
			ProcessStatus::Stopping => "stopping",
			ProcessStatus::Crashed => "crashed",
		};
		f.write_str(s)
	}
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
	pub code: Option<i32>,
	pub signal: Option<i32>,
}

impl ExitInfo {
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

impl From<ExitStatus> for ExitInfo {
	fn from(status: ExitStatus) -> Self {
		use std::os::unix::process::ExitStatusExt;
		Self {
			code: status.code(),
			signal: status.signal(),
		}
	}
}

impl fmt::Display for ExitInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.code, self.signal) {
			(Some(code), _) => write!(f, "exit {}", code),
			(None, Some(signal)) => write!(f, "signal {}", signal),
			(None, None) => f.write_str("exit unknown"),
		}
	}
}

/// The last error a controller hit outside of a direct control call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
	pub kind: ErrorKind,
	pub message: String,
}

impl From<&Error> for Fault {
	fn from(err: &Error) -> Self {
		Self {
			kind: err.kind(),
			message: err.to_string(),
		}
	}
}

/// Snapshot of one controller's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
	pub name: String,
	pub status: ProcessStatus,
	pub pid: Option<u32>,
	/// Unix time in milliseconds of the current run's spawn.
	pub started_at_ms: Option<u64>,
	pub restart_count: u32,
	pub last_exit: Option<ExitInfo>,
	/// Set while a crash restart is waiting out its backoff delay.
	pub next_restart_ms: Option<u64>,
	pub fault: Option<Fault>,
}

impl ProcessState {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			status: ProcessStatus::Stopped,
			pid: None,
			started_at_ms: None,
			restart_count: 0,
			last_exit: None,
			next_restart_ms: None,
			fault: None,
		}
	}

	pub fn is_running(&self) -> bool {
		self.status == ProcessStatus::Running
	}

	/// Crashed, with an automatic restart scheduled.
	pub fn restart_pending(&self) -> bool {
		self.status == ProcessStatus::Crashed && self.next_restart_ms.is_some()
	}

	pub fn uptime_secs(&self) -> Option<u64> {
		let started = self.started_at_ms?;
		if !self.is_running() {
			return None;
		}
		Some(now_ms().saturating_sub(started) / 1000)
	}
}

/// One state change, as broadcast to [`Supervisor::subscribe`](crate::Supervisor::subscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub name: String,
	pub from: ProcessStatus,
	pub to: ProcessStatus,
}

pub(crate) fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
