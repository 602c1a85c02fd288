use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::controller::ControllerHandle;
use crate::error::{Error, Result};
use crate::output::OutputCapture;
use crate::registry;
use crate::spec::ProcessSpec;
use crate::state::{ProcessState, Transition};

/// Extra time `shutdown_all` allows past the stop timeout for SIGKILL and reaping.
const REAP_GRACE: Duration = Duration::from_secs(2);

pub struct SupervisorConfig {
	pub log_dir: PathBuf,
	pub max_log_size: u64,
}

/// Owns one controller per spec and routes control operations by name.
///
/// Controllers are independent: a crash loop in one process never blocks
/// operations on another. Operations on the same name are serialized by that
/// name's controller.
pub struct Supervisor {
	specs: Vec<ProcessSpec>,
	controllers: Vec<ControllerHandle>,
	events: broadcast::Sender<Transition>,
}

impl Supervisor {
	/// Spawn one idle controller per spec. Must be called inside a tokio runtime.
	pub fn new(specs: Vec<ProcessSpec>, config: SupervisorConfig) -> Result<Self> {
		registry::ensure_unique(&specs)?;

		let (events, _) = broadcast::channel(256);
		let controllers = specs
			.iter()
			.map(|spec| {
				let output = OutputCapture::new(&config.log_dir, &spec.name, config.max_log_size);
				ControllerHandle::spawn(spec.clone(), output, events.clone())
			})
			.collect();

		tracing::info!(processes = specs.len(), "supervisor ready");
		Ok(Self { specs, controllers, events })
	}

	pub fn names(&self) -> Vec<&str> {
		self.controllers.iter().map(|c| c.name()).collect()
	}

	pub fn spec(&self, name: &str) -> Result<&ProcessSpec> {
		self.specs
			.iter()
			.find(|s| s.name == name)
			.ok_or_else(|| unknown(name))
	}

	/// Snapshots in config order.
	pub fn list(&self) -> Vec<ProcessState> {
		self.controllers.iter().map(|c| c.snapshot()).collect()
	}

	pub fn status(&self, name: &str) -> Result<ProcessState> {
		Ok(self.controller(name)?.snapshot())
	}

	pub async fn start(&self, name: &str) -> Result<ProcessState> {
		self.controller(name)?.start().await
	}

	/// Stop using the process's configured stop timeout.
	pub async fn stop(&self, name: &str) -> Result<ProcessState> {
		let timeout = self.spec(name)?.stop_timeout;
		self.stop_with_timeout(name, timeout).await
	}

	pub async fn stop_with_timeout(&self, name: &str, timeout: Duration) -> Result<ProcessState> {
		self.controller(name)?.stop(timeout).await
	}

	pub async fn restart(&self, name: &str) -> Result<ProcessState> {
		let timeout = self.spec(name)?.stop_timeout;
		self.controller(name)?.restart(timeout).await
	}

	/// Start every spec marked `autostart`. Failures are returned, not fatal.
	pub async fn start_autostart(&self) -> Vec<Error> {
		let mut errors = Vec::new();
		for (spec, controller) in self.specs.iter().zip(&self.controllers) {
			if !spec.autostart {
				continue;
			}
			if let Err(e) = controller.start().await {
				tracing::error!(process = %spec.name, error = %e, "autostart failed");
				errors.push(e);
			}
		}
		errors
	}

	pub fn output(&self, name: &str) -> Result<OutputCapture> {
		Ok(self.controller(name)?.output().clone())
	}

	/// Every state transition of every controller, in order per process.
	pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
		self.events.subscribe()
	}

	/// Stop every process concurrently. Each one gets `timeout` after SIGTERM
	/// before SIGKILL; processes that needed SIGKILL or did not finish in time
	/// are reported in [`Error::ShutdownTimeout`].
	pub async fn shutdown_all(&self, timeout: Duration) -> Result<()> {
		tracing::info!(?timeout, "stopping all processes");
		let mut pending: HashSet<String> = self.names().into_iter().map(String::from).collect();
		let mut stuck = Vec::new();

		let mut set = JoinSet::new();
		for controller in &self.controllers {
			let controller = controller.clone();
			set.spawn(async move {
				let result = controller.stop(timeout).await;
				(controller.name().to_string(), result)
			});
		}

		let collect = async {
			while let Some(joined) = set.join_next().await {
				let Ok((name, result)) = joined else {
					continue;
				};
				pending.remove(&name);
				if let Err(e) = result {
					tracing::warn!(process = %name, error = %e, "shutdown");
					stuck.push(name);
				}
			}
		};
		if tokio::time::timeout(timeout + REAP_GRACE, collect).await.is_err() {
			set.abort_all();
		}

		stuck.extend(pending);
		if stuck.is_empty() {
			Ok(())
		} else {
			stuck.sort();
			Err(Error::ShutdownTimeout { grace: timeout, stuck })
		}
	}

	fn controller(&self, name: &str) -> Result<&ControllerHandle> {
		self.controllers
			.iter()
			.find(|c| c.name() == name)
			.ok_or_else(|| unknown(name))
	}
}

fn unknown(name: &str) -> Error {
	Error::UnknownProcess { name: name.to_string() }
}
