//! # herd-supervisor
//!
//! Supervise a small fleet of long-running processes.
//!
//! - [`registry`] turns an `apps` document into immutable [`ProcessSpec`]s.
//! - [`controller`] owns one child process per spec: start, graceful stop with
//!   SIGKILL escalation, restart, and crash restarts under a [`BackoffPolicy`].
//! - [`Supervisor`] owns the controllers and routes control operations by name.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use herd_supervisor::{registry, Supervisor, SupervisorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), herd_supervisor::Error> {
//! let specs = registry::load_file("apps.toml".as_ref(), &registry::Defaults::default())?;
//! let sup = Supervisor::new(specs, SupervisorConfig {
//!     log_dir: "/tmp/herd/logs".into(),
//!     max_log_size: 10 * 1024 * 1024,
//! })?;
//!
//! sup.start("tg-api").await?;
//! println!("{:?}", sup.status("tg-api")?.status);
//! sup.shutdown_all(std::time::Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod controller;
pub mod error;
pub mod logs;
pub mod output;
pub mod registry;
pub mod spec;
pub mod state;
pub mod supervisor;

pub use backoff::BackoffPolicy;
pub use controller::ControllerHandle;
pub use error::{ConfigError, Error, ErrorKind, Result};
pub use output::OutputCapture;
pub use spec::{ProcessSpec, RestartPolicy};
pub use state::{ExitInfo, Fault, ProcessState, ProcessStatus, Transition};
pub use supervisor::{Supervisor, SupervisorConfig};
