use std::time::Duration;

use clap::Subcommand;

use crate::daemon::{Daemon, DaemonError};
use crate::paths::DaemonPaths;

#[derive(Debug, Clone, Subcommand)]
pub enum DaemonCommand {
	/// Run the daemon in the foreground (used internally)
	Run {
		/// Also serve the HTTP control API
		#[arg(long)]
		http: bool,
	},
	/// Start the daemon in the background
	Start,
	/// Stop the running daemon
	Stop,
	/// Show daemon status
	Status,
}

impl DaemonCommand {
	/// Handle `start`, `stop` and `status`. `Run` belongs to the application
	/// and is answered with an error here.
	///
	/// `run_args` is the argument vector that makes the current binary run the
	/// daemon in the foreground.
	pub fn execute(
		&self,
		paths: &DaemonPaths,
		run_args: &[&str],
		stop_timeout: Duration,
	) -> Result<String, DaemonError> {
		let daemon = Daemon { paths: paths.clone() };
		match self {
			DaemonCommand::Run { .. } => Err(DaemonError::Foreground),
			DaemonCommand::Start => {
				daemon.start_background(run_args)?;
				Ok("daemon started".to_string())
			}
			DaemonCommand::Stop => {
				daemon.stop(stop_timeout)?;
				Ok("daemon stopped".to_string())
			}
			DaemonCommand::Status => {
				if !crate::client::is_running(paths) {
					return Ok("daemon not running".to_string());
				}
				Ok(match crate::client::read_pid(paths) {
					Some(pid) => format!("daemon running (pid {})", pid),
					None => "daemon running".to_string(),
				})
			}
		}
	}
}
