//! One controller per supervised process.
//!
//! Each controller is a tokio task owning the child process and its
//! [`ProcessState`]. Control commands arrive on a queue and are handled one at
//! a time, so transitions for a process never interleave. The state is
//! published on a `watch` channel; readers only ever see snapshot copies.
//!
//! ```text
//! Stopped ─start─► Starting ─spawned─► Running ─stop─► Stopping ─► Stopped
//!                     │                   │
//!                spawn error           exited
//!                     ▼                   ▼
//!                  Crashed ◄──────────────┘
//!                     │ autorestart: wait backoff.delay(failures)
//!                     └──────────────► Starting
//! ```

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::output::OutputCapture;
use crate::spec::ProcessSpec;
use crate::state::{now_ms, ExitInfo, Fault, ProcessState, ProcessStatus, Transition};

const COMMAND_QUEUE: usize = 32;
const GROUP_POLL: Duration = Duration::from_millis(25);

type Reply = oneshot::Sender<Result<ProcessState>>;

enum Op {
	Start { reply: Reply },
	Stop { timeout: Duration, reply: Reply },
	Restart { timeout: Duration, reply: Reply },
}

/// Cheap, cloneable handle to a running controller task.
#[derive(Clone)]
pub struct ControllerHandle {
	name: String,
	commands: mpsc::Sender<Op>,
	state: watch::Receiver<ProcessState>,
	output: OutputCapture,
}

impl ControllerHandle {
	/// Spawn the controller task. The process itself is not started.
	///
	/// The task runs until every handle is dropped, then stops its child.
	pub fn spawn(
		spec: ProcessSpec,
		output: OutputCapture,
		events: broadcast::Sender<Transition>,
	) -> Self {
		let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
		let (state_tx, state_rx) = watch::channel(ProcessState::new(&spec.name));

		let handle = Self {
			name: spec.name.clone(),
			commands: cmd_tx,
			state: state_rx,
			output: output.clone(),
		};

		let controller = Controller {
			state: ProcessState::new(&spec.name),
			spec,
			output,
			publisher: state_tx,
			events,
			child: None,
			pgid: None,
			started: None,
			retry_at: None,
			failures: 0,
		};
		tokio::spawn(controller.run(cmd_rx));

		handle
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn snapshot(&self) -> ProcessState {
		self.state.borrow().clone()
	}

	pub fn output(&self) -> &OutputCapture {
		&self.output
	}

	pub async fn start(&self) -> Result<ProcessState> {
		self.request(|reply| Op::Start { reply }).await
	}

	/// SIGTERM, then SIGKILL once `timeout` passes. Once queued, a stop runs to
	/// completion.
	pub async fn stop(&self, timeout: Duration) -> Result<ProcessState> {
		self.request(|reply| Op::Stop { timeout, reply }).await
	}

	pub async fn restart(&self, timeout: Duration) -> Result<ProcessState> {
		self.request(|reply| Op::Restart { timeout, reply }).await
	}

	async fn request(&self, make: impl FnOnce(Reply) -> Op) -> Result<ProcessState> {
		let gone = || Error::ControllerGone { name: self.name.clone() };
		let (reply_tx, reply_rx) = oneshot::channel();
		self.commands.send(make(reply_tx)).await.map_err(|_| gone())?;
		reply_rx.await.map_err(|_| gone())?
	}
}

enum Event {
	Command(Option<Op>),
	Exited(io::Result<ExitStatus>),
	RetryDue,
}

struct Controller {
	spec: ProcessSpec,
	output: OutputCapture,
	state: ProcessState,
	publisher: watch::Sender<ProcessState>,
	events: broadcast::Sender<Transition>,
	child: Option<Child>,
	/// Process group of the current run. Outlives the child until the
	/// group is confirmed empty.
	pgid: Option<Pid>,
	started: Option<Instant>,
	/// Deadline of a pending crash restart.
	retry_at: Option<Instant>,
	/// Consecutive failed runs, drives the backoff delay.
	failures: u32,
}

impl Controller {
	async fn run(mut self, mut commands: mpsc::Receiver<Op>) {
		loop {
			let event = match (self.child.as_mut(), self.retry_at) {
				(Some(child), _) => tokio::select! {
					cmd = commands.recv() => Event::Command(cmd),
					status = child.wait() => Event::Exited(status),
				},
				(None, Some(at)) => tokio::select! {
					cmd = commands.recv() => Event::Command(cmd),
					_ = tokio::time::sleep_until(at) => Event::RetryDue,
				},
				(None, None) => Event::Command(commands.recv().await),
			};

			match event {
				Event::Command(Some(cmd)) => self.handle(cmd).await,
				Event::Command(None) => {
					let _ = self.stop(self.spec.stop_timeout).await;
					return;
				}
				Event::Exited(status) => self.on_exit(status).await,
				Event::RetryDue => {
					self.retry_at = None;
					self.state.restart_count += 1;
					let _ = self.launch().await;
				}
			}
		}
	}

	async fn handle(&mut self, cmd: Op) {
		match cmd {
			Op::Start { reply } => {
				let _ = reply.send(self.start().await);
			}
			Op::Stop { timeout, reply } => {
				let _ = reply.send(self.stop(timeout).await);
			}
			Op::Restart { timeout, reply } => {
				if let Err(e) = self.stop(timeout).await {
					tracing::warn!(process = %self.spec.name, error = %e, "restart: forced stop");
				}
				let _ = reply.send(self.start().await);
			}
		}
	}

	/// Manual start. Clears crash history and preempts a pending restart.
	async fn start(&mut self) -> Result<ProcessState> {
		if self.child.is_some() {
			return Ok(self.state.clone());
		}
		self.retry_at = None;
		self.failures = 0;
		self.state.restart_count = 0;
		self.state.fault = None;
		self.launch().await?;
		Ok(self.state.clone())
	}

	async fn launch(&mut self) -> Result<()> {
		self.state.next_restart_ms = None;
		self.transition(ProcessStatus::Starting);

		let mut child = match spawn_process(&self.spec) {
			Ok(child) => child,
			Err(source) => {
				let err = Error::Spawn {
					name: self.spec.name.clone(),
					program: self.spec.program().to_string(),
					source,
				};
				tracing::error!(process = %self.spec.name, error = %err, "spawn failed");
				self.output.note(&err.to_string()).await;
				self.state.fault = Some(Fault::from(&err));
				self.failed().await;
				return Err(err);
			}
		};

		if let Some(stdout) = child.stdout.take() {
			tokio::spawn(pipe_output(stdout, self.output.clone()));
		}
		if let Some(stderr) = child.stderr.take() {
			tokio::spawn(pipe_output(stderr, self.output.clone()));
		}

		self.state.pid = child.id();
		self.pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
		self.state.started_at_ms = Some(now_ms());
		self.started = Some(Instant::now());
		self.child = Some(child);
		self.output
			.note(&format!("{} started (pid {})", self.spec.name, self.state.pid.unwrap_or(0)))
			.await;
		self.transition(ProcessStatus::Running);
		Ok(())
	}

	async fn stop(&mut self, timeout: Duration) -> Result<ProcessState> {
		self.retry_at = None;
		self.state.next_restart_ms = None;
		self.state.fault = None;

		let Some(mut child) = self.child.take() else {
			if self.state.status != ProcessStatus::Stopped {
				self.transition(ProcessStatus::Stopped);
			} else {
				self.publisher.send_replace(self.state.clone());
			}
			return Ok(self.state.clone());
		};

		self.transition(ProcessStatus::Stopping);
		let begun = Instant::now();
		let (exit, forced) = terminate(&mut child, timeout).await;
		if let Some(pgid) = self.pgid.take() {
			reap_group(pgid, timeout.saturating_sub(begun.elapsed())).await;
		}

		self.started = None;
		self.state.pid = None;
		self.state.last_exit = exit;
		let how = if forced { "killed" } else { "stopped" };
		self.output.note(&format!("{} {}", self.spec.name, how)).await;
		self.transition(ProcessStatus::Stopped);

		if forced {
			let err = Error::Timeout { name: self.spec.name.clone(), timeout };
			tracing::warn!(process = %self.spec.name, error = %err, "escalated to SIGKILL");
			return Err(err);
		}
		Ok(self.state.clone())
	}

	/// The child exited on its own.
	async fn on_exit(&mut self, status: io::Result<ExitStatus>) {
		self.child = None;
		self.state.pid = None;
		let uptime = self.started.take().map(|s| s.elapsed()).unwrap_or_default();

		let exit = match status {
			Ok(status) => Some(ExitInfo::from(status)),
			Err(e) => {
				tracing::error!(process = %self.spec.name, error = %e, "failed to reap child");
				None
			}
		};
		self.state.last_exit = exit;
		let described = exit.map(|e| e.to_string()).unwrap_or_else(|| "exit unknown".to_string());
		tracing::warn!(process = %self.spec.name, exit = %described, ?uptime, "process exited");
		self.output.note(&format!("{} exited ({})", self.spec.name, described)).await;

		if let Some(pgid) = self.pgid.take() {
			reap_group(pgid, self.spec.stop_timeout).await;
		}

		if uptime >= self.spec.restart.reset_after {
			self.failures = 0;
		}

		if !self.spec.restart.autorestart && exit.is_some_and(|e| e.success()) {
			self.transition(ProcessStatus::Stopped);
			return;
		}
		self.failed().await;
	}

	/// A run failed or a spawn did not succeed: schedule a restart under the
	/// backoff policy, or settle in Crashed.
	async fn failed(&mut self) {
		let policy = &self.spec.restart;
		if !policy.autorestart {
			self.transition(ProcessStatus::Crashed);
			return;
		}

		if let Some(max) = policy.max_retries {
			if self.failures >= max {
				let err = Error::ExhaustedRetries {
					name: self.spec.name.clone(),
					retries: self.failures,
				};
				tracing::error!(process = %self.spec.name, error = %err, "not restarting");
				self.output.note(&err.to_string()).await;
				self.state.fault = Some(Fault::from(&err));
				self.transition(ProcessStatus::Crashed);
				return;
			}
		}

		let delay = policy.backoff.delay(self.failures);
		self.failures += 1;
		self.retry_at = Some(Instant::now() + delay);
		self.state.next_restart_ms = Some(delay.as_millis() as u64);
		self.output
			.note(&format!("{} restarting in {:?} (failure {})", self.spec.name, delay, self.failures))
			.await;
		self.transition(ProcessStatus::Crashed);
	}

	fn transition(&mut self, to: ProcessStatus) {
		let from = self.state.status;
		self.state.status = to;
		tracing::info!(process = %self.spec.name, %from, %to, "state transition");
		self.publisher.send_replace(self.state.clone());
		let _ = self.events.send(Transition { name: self.spec.name.clone(), from, to });
	}
}

fn spawn_process(spec: &ProcessSpec) -> io::Result<Child> {
	let mut cmd = Command::new(spec.program());
	cmd.args(spec.argv())
		.current_dir(&spec.cwd)
		.envs(&spec.env)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0)
		.kill_on_drop(true);
	cmd.spawn()
}

/// Graceful stop of the child's process group. Returns the exit and whether
/// SIGKILL was needed.
async fn terminate(child: &mut Child, timeout: Duration) -> (Option<ExitInfo>, bool) {
	let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
	if let Some(pgid) = pgid {
		let _ = killpg(pgid, Signal::SIGTERM);
	}

	match tokio::time::timeout(timeout, child.wait()).await {
		Ok(status) => (status.ok().map(ExitInfo::from), false),
		Err(_) => {
			if let Some(pgid) = pgid {
				let _ = killpg(pgid, Signal::SIGKILL);
			}
			let _ = child.start_kill();
			(child.wait().await.ok().map(ExitInfo::from), true)
		}
	}
}

/// Signal whatever is left in a group whose leader has already been reaped:
/// SIGTERM, then SIGKILL if members remain after `grace`.
async fn reap_group(pgid: Pid, grace: Duration) {
	if killpg(pgid, Signal::SIGTERM).is_err() {
		return;
	}
	let deadline = Instant::now() + grace;
	while Instant::now() < deadline {
		tokio::time::sleep(GROUP_POLL).await;
		if killpg(pgid, None).is_err() {
			return;
		}
	}
	tracing::warn!(pgid = pgid.as_raw(), ?grace, "process group outlived its leader, sending SIGKILL");
	let _ = killpg(pgid, Signal::SIGKILL);
}

async fn pipe_output<R: tokio::io::AsyncRead + Unpin>(mut reader: R, output: OutputCapture) {
	let mut buf = [0u8; 4096];
	loop {
		match reader.read(&mut buf).await {
			Ok(0) | Err(_) => break,
			Ok(n) => output.write(&buf[..n]).await,
		}
	}
}
