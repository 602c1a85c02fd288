use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Serialize, de::DeserializeOwned};

use crate::client::{self, ClientError, DaemonClient};
use crate::paths::DaemonPaths;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STARTUP_ATTEMPTS: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
	#[error("daemon already running")]
	AlreadyRunning,
	#[error("daemon not running")]
	NotRunning,
	#[error("failed to start daemon: {0}")]
	Spawn(#[source] io::Error),
	#[error("failed to signal daemon (pid {pid}): {source}")]
	Signal { pid: u32, source: nix::Error },
	#[error("daemon did not exit within {0:?}")]
	StopTimeout(Duration),
	#[error("the foreground daemon must be run by the application")]
	Foreground,
}

pub struct Daemon {
	pub paths: DaemonPaths,
}

impl Daemon {
	/// Create the state directory and record our PID. Call once from the
	/// daemon process before serving.
	pub fn prepare(&self) -> io::Result<()> {
		std::fs::create_dir_all(self.paths.state_dir())?;
		std::fs::write(self.paths.pid_path(), std::process::id().to_string())
	}

	pub fn cleanup(&self) {
		let _ = std::fs::remove_file(self.paths.socket_path());
		let _ = std::fs::remove_file(self.paths.pid_path());
	}

	/// Re-exec the current binary with `args`, detached, output appended to
	/// `daemon.log` in the state directory.
	pub fn start_background(&self, args: &[&str]) -> Result<(), DaemonError> {
		if client::is_running(&self.paths) {
			return Err(DaemonError::AlreadyRunning);
		}
		spawn_detached(&self.paths, args).map_err(DaemonError::Spawn)
	}

	/// Send SIGTERM and wait for the socket to go away.
	pub fn stop(&self, timeout: Duration) -> Result<(), DaemonError> {
		use nix::sys::signal::{kill, Signal};
		use nix::unistd::Pid;

		let pid = client::read_pid(&self.paths).ok_or(DaemonError::NotRunning)?;
		kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
			.map_err(|source| DaemonError::Signal { pid, source })?;

		let deadline = Instant::now() + timeout;
		while Instant::now() < deadline {
			if !client::is_running(&self.paths) {
				self.cleanup();
				return Ok(());
			}
			std::thread::sleep(POLL_INTERVAL);
		}
		Err(DaemonError::StopTimeout(timeout))
	}
}

/// Connect to the daemon, starting it with `args` first if nothing is listening.
pub fn ensure_daemon_with_args<Req, Resp>(
	paths: &DaemonPaths,
	args: &[&str],
) -> Result<DaemonClient<Req, Resp>, ClientError>
where
	Req: Serialize,
	Resp: DeserializeOwned,
{
	if let Ok(client) = DaemonClient::connect(paths) {
		return Ok(client);
	}

	tracing::debug!("daemon not running, starting it");
	spawn_detached(paths, args)?;

	for _ in 0..STARTUP_ATTEMPTS {
		std::thread::sleep(POLL_INTERVAL);
		if let Ok(client) = DaemonClient::connect(paths) {
			return Ok(client);
		}
	}

	Err(ClientError::NotRunning)
}

fn spawn_detached(paths: &DaemonPaths, args: &[&str]) -> io::Result<()> {
	std::fs::create_dir_all(paths.state_dir())?;
	let log = OpenOptions::new()
		.create(true)
		.append(true)
		.open(paths.state_dir().join("daemon.log"))?;

	std::process::Command::new(find_current_binary())
		.args(args)
		.stdin(Stdio::null())
		.stdout(log.try_clone()?)
		.stderr(log)
		.spawn()?;
	Ok(())
}

fn find_current_binary() -> PathBuf {
	std::env::current_exe().unwrap_or_else(|_| PathBuf::from("herd"))
}
