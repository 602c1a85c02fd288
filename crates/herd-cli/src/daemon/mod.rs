pub mod api;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use herd_ipc::Daemon;
use herd_supervisor::registry;
use herd_supervisor::{ErrorKind, Supervisor, SupervisorConfig};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use crate::config::{self, GlobalConfig};
use crate::protocol::{self, Request, Response};

const LOG_EXPIRY_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the daemon in the foreground until SIGINT, SIGTERM or a `Shutdown`
/// request. Returns the process exit code.
pub async fn run(apps: &Path, enable_http: bool) -> i32 {
	init_tracing();

	let paths = protocol::daemon_paths();
	let daemon = Daemon { paths: paths.clone() };
	if herd_ipc::client::is_running(&paths) {
		tracing::error!("daemon already running");
		return ErrorKind::Internal.exit_code();
	}

	let global_config = config::load_global_config(&paths);
	let specs = match registry::load_file(apps, &global_config.defaults.to_defaults()) {
		Ok(specs) => specs,
		Err(e) => {
			tracing::error!(config = %apps.display(), error = %e, "invalid app definitions");
			return ErrorKind::Config.exit_code();
		}
	};

	if let Err(e) = daemon.prepare() {
		tracing::error!(error = %e, "failed to prepare state directory");
		return ErrorKind::Internal.exit_code();
	}

	let log_dir = paths.log_dir();
	let supervisor = match Supervisor::new(
		specs,
		SupervisorConfig { log_dir: log_dir.clone(), max_log_size: global_config.logs.max_size_bytes },
	) {
		Ok(s) => Arc::new(s),
		Err(e) => {
			tracing::error!(error = %e, "failed to create supervisor");
			daemon.cleanup();
			return e.kind().exit_code();
		}
	};

	spawn_log_expiry(&global_config, log_dir);

	let shutdown = Arc::new(Notify::new());
	let socket_handle = {
		let sup = Arc::clone(&supervisor);
		let shutdown = Arc::clone(&shutdown);
		let paths = paths.clone();
		tokio::spawn(async move {
			let served = herd_ipc::server::run_socket_server(
				&paths,
				move |req: Request| {
					let sup = Arc::clone(&sup);
					let shutdown = Arc::clone(&shutdown);
					async move { handle_request(&sup, &shutdown, req).await }
				},
				|message: String| Response::Error { kind: ErrorKind::Internal, name: None, message },
			)
			.await;
			if let Err(e) = served {
				tracing::error!(error = %e, "socket server stopped");
			}
		})
	};

	let http_handle = if enable_http {
		let sup = Arc::clone(&supervisor);
		let port = global_config.daemon.port;
		Some(tokio::spawn(async move { run_http_server(sup, port).await }))
	} else {
		None
	};

	tracing::info!(pid = std::process::id(), config = %apps.display(), "daemon started");
	supervisor.start_autostart().await;

	tokio::select! {
		_ = socket_handle => {},
		_ = async {
			if let Some(h) = http_handle { h.await.ok(); }
			else { std::future::pending::<()>().await; }
		} => {},
		_ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
		_ = terminate_signal() => tracing::info!("received SIGTERM"),
		_ = shutdown.notified() => tracing::info!("shutdown requested"),
	}

	let code = match supervisor.shutdown_all(global_config.daemon.stop_timeout()).await {
		Ok(()) => 0,
		Err(e) => {
			tracing::warn!(error = %e, "shutdown was not clean");
			e.kind().exit_code()
		}
	};
	daemon.cleanup();
	tracing::info!("daemon stopped");
	code
}

fn init_tracing() {
	let filter = EnvFilter::try_from_env("HERD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn terminate_signal() {
	use tokio::signal::unix::{signal, SignalKind};
	match signal(SignalKind::terminate()) {
		Ok(mut sig) => {
			sig.recv().await;
		}
		Err(e) => {
			tracing::warn!(error = %e, "cannot listen for SIGTERM");
			std::future::pending::<()>().await;
		}
	}
}

fn spawn_log_expiry(config: &GlobalConfig, log_dir: std::path::PathBuf) {
	let (max_age_days, max_files) = (config.logs.max_age_days, config.logs.max_files);
	herd_supervisor::logs::expire_logs(&log_dir, max_age_days, max_files);
	tokio::spawn(async move {
		loop {
			tokio::time::sleep(LOG_EXPIRY_INTERVAL).await;
			herd_supervisor::logs::expire_logs(&log_dir, max_age_days, max_files);
		}
	});
}

pub(crate) async fn handle_request(supervisor: &Supervisor, shutdown: &Notify, request: Request) -> Response {
	match request {
		Request::Ping => Response::Pong,
		Request::List => Response::List { processes: supervisor.list() },
		Request::Status { name } => Response::from_result(supervisor.status(&name)),
		Request::Start { name } => Response::from_result(supervisor.start(&name).await),
		Request::Stop { name } => Response::from_result(supervisor.stop(&name).await),
		Request::Restart { name } => Response::from_result(supervisor.restart(&name).await),
		Request::Logs { name, lines } => match supervisor.output(&name) {
			Ok(output) => Response::Log { text: output.tail(lines).await },
			Err(e) => Response::error(&e),
		},
		Request::Shutdown => {
			shutdown.notify_one();
			Response::Ok { message: "shutting down".to_string() }
		}
	}
}

async fn run_http_server(supervisor: Arc<Supervisor>, port: u16) {
	let app = api::router(supervisor);
	let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind HTTP on {}: {}", addr, e);
			return;
		}
	};
	tracing::info!("HTTP listening on {}", addr);
	if let Err(e) = axum::serve(listener, app).await {
		tracing::error!("HTTP server error: {}", e);
	}
}
