use std::path::PathBuf;

/// Where one daemon keeps its files, keyed by application name.
///
/// Follows XDG: state (socket, PID file, logs) under `$XDG_STATE_HOME/<app>`,
/// configuration under `$XDG_CONFIG_HOME/<app>`.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
	pub app_name: String,
	root: Option<PathBuf>,
}

impl DaemonPaths {
	pub fn new(app_name: impl Into<String>) -> Self {
		Self {
			app_name: app_name.into(),
			root: None,
		}
	}

	/// Everything under `root/<app>`, ignoring the environment. State and
	/// config share the directory.
	pub fn rooted(app_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self {
			app_name: app_name.into(),
			root: Some(root.into()),
		}
	}

	pub fn state_dir(&self) -> PathBuf {
		self.resolve("XDG_STATE_HOME", &[".local", "state"], &[])
	}

	pub fn config_dir(&self) -> PathBuf {
		self.resolve("XDG_CONFIG_HOME", &[".config"], &["config"])
	}

	pub fn log_dir(&self) -> PathBuf {
		self.state_dir().join("logs")
	}

	pub fn socket_path(&self) -> PathBuf {
		self.state_dir().join("daemon.sock")
	}

	pub fn pid_path(&self) -> PathBuf {
		self.state_dir().join("daemon.pid")
	}

	fn resolve(&self, var: &str, home_rel: &[&str], tmp_rel: &[&str]) -> PathBuf {
		if let Some(root) = &self.root {
			return root.join(&self.app_name);
		}
		if let Some(dir) = std::env::var_os(var).filter(|d| !d.is_empty()) {
			return PathBuf::from(dir).join(&self.app_name);
		}
		match home_dir() {
			Some(home) => home_rel.iter().fold(home, |p, seg| p.join(seg)).join(&self.app_name),
			None => tmp_rel.iter().fold(PathBuf::from("/tmp").join(&self.app_name), |p, seg| p.join(seg)),
		}
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rooted_ignores_environment() {
		let paths = DaemonPaths::rooted("herd", "/var/lib/herd-test");
		assert_eq!(paths.state_dir(), PathBuf::from("/var/lib/herd-test/herd"));
		assert_eq!(paths.config_dir(), paths.state_dir());
		assert_eq!(paths.socket_path(), PathBuf::from("/var/lib/herd-test/herd/daemon.sock"));
		assert_eq!(paths.log_dir(), PathBuf::from("/var/lib/herd-test/herd/logs"));
	}
}
