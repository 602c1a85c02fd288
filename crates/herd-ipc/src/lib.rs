//! Daemon plumbing for `herd`.
//!
//! A daemon owns a state directory holding its PID file and a Unix socket.
//! Requests and responses are single JSON documents, one per line.

pub mod paths;
pub mod server;
pub mod client;
pub mod daemon;
#[cfg(feature = "clap")]
pub mod cli;

pub use paths::DaemonPaths;
pub use client::{DaemonClient, ClientError};
pub use daemon::{Daemon, DaemonError, ensure_daemon_with_args};
