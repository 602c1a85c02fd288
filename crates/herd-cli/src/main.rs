mod config;
mod daemon;
mod protocol;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use herd_ipc::cli::DaemonCommand;
use herd_ipc::{DaemonClient, DaemonPaths};
use herd_supervisor::{registry, ErrorKind, ProcessState, ProcessStatus};
use owo_colors::OwoColorize;

use config::GlobalConfig;
use protocol::{Request, Response};

/// Extra time `daemon stop` waits beyond the per-process grace period.
const DAEMON_STOP_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "herd", version, about = "Minimal process supervisor")]
struct Cli {
	/// App definitions file (apps.toml or apps.json)
	#[arg(long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Show every process
	#[command(alias = "ls")]
	List,
	/// Show one process
	#[command(alias = "st")]
	Status { name: String },
	/// Start a process
	Start { name: String },
	/// Stop a process (SIGTERM, then SIGKILL after its stop timeout)
	Stop { name: String },
	/// Stop and start a process, resetting its restart count
	Restart { name: String },
	/// Recent output of a process
	Logs {
		name: String,
		/// Number of lines
		#[arg(short = 'n', long, default_value_t = 100)]
		lines: usize,
	},
	/// Validate the app definitions without starting anything
	Check,
	/// Manage the background daemon
	#[command(subcommand)]
	Daemon(DaemonCommand),
}

fn main() {
	let cli = Cli::parse();
	let paths = protocol::daemon_paths();
	let global = config::load_global_config(&paths);
	let apps = config::apps_path(cli.config.as_deref(), &paths);
	let ctx = Context { paths, global, apps };

	let code = match cli.command {
		Commands::List => cmd_list(&ctx),
		Commands::Status { name } => cmd_process(&ctx, Request::Status { name }),
		Commands::Start { name } => cmd_process(&ctx, Request::Start { name }),
		Commands::Stop { name } => cmd_process(&ctx, Request::Stop { name }),
		Commands::Restart { name } => cmd_process(&ctx, Request::Restart { name }),
		Commands::Logs { name, lines } => cmd_logs(&ctx, &name, lines),
		Commands::Check => cmd_check(&ctx),
		Commands::Daemon(DaemonCommand::Run { http }) => run_daemon(&ctx.apps, http),
		Commands::Daemon(cmd) => cmd_daemon(&ctx, &cmd),
	};
	std::process::exit(code);
}

struct Context {
	paths: DaemonPaths,
	global: GlobalConfig,
	apps: PathBuf,
}

impl Context {
	fn run_args(&self) -> Vec<String> {
		vec![
			"daemon".to_string(),
			"run".to_string(),
			"--config".to_string(),
			self.apps.to_string_lossy().to_string(),
		]
	}
}

fn exit_failure() -> i32 {
	ErrorKind::Internal.exit_code()
}

fn print_error(message: &str) {
	eprintln!("{} {}", "error:".red().bold(), message);
}

// --- Daemon lifecycle ---

fn run_daemon(apps: &Path, http: bool) -> i32 {
	match tokio::runtime::Runtime::new() {
		Ok(rt) => rt.block_on(daemon::run(apps, http)),
		Err(e) => {
			print_error(&format!("failed to start runtime: {}", e));
			exit_failure()
		}
	}
}

fn cmd_daemon(ctx: &Context, cmd: &DaemonCommand) -> i32 {
	if matches!(cmd, DaemonCommand::Start) {
		if let Err(code) = validate(ctx) {
			return code;
		}
	}
	let args = ctx.run_args();
	let args: Vec<&str> = args.iter().map(String::as_str).collect();
	let timeout = ctx.global.daemon.stop_timeout() + DAEMON_STOP_SLACK;
	match cmd.execute(&ctx.paths, &args, timeout) {
		Ok(message) => {
			eprintln!("{}", message);
			0
		}
		Err(e) => {
			print_error(&e.to_string());
			exit_failure()
		}
	}
}

/// Load the app definitions locally so config errors surface with their own
/// exit code instead of as a daemon that never came up.
fn validate(ctx: &Context) -> Result<Vec<herd_supervisor::ProcessSpec>, i32> {
	registry::load_file(&ctx.apps, &ctx.global.defaults.to_defaults()).map_err(|e| {
		print_error(&e.to_string());
		ErrorKind::Config.exit_code()
	})
}

fn send_request(ctx: &Context, request: &Request) -> Result<Response, i32> {
	if !herd_ipc::client::is_running(&ctx.paths) {
		validate(ctx)?;
		eprintln!("starting daemon...");
	}

	let args = ctx.run_args();
	let args: Vec<&str> = args.iter().map(String::as_str).collect();
	let mut client: DaemonClient<Request, Response> =
		herd_ipc::ensure_daemon_with_args(&ctx.paths, &args).map_err(|e| {
			print_error(&format!("{} (see {})", e, ctx.paths.state_dir().join("daemon.log").display()));
			exit_failure()
		})?;

	client.send(request).map_err(|e| {
		print_error(&e.to_string());
		exit_failure()
	})
}

/// Print a daemon error and turn it into an exit code.
fn report(response: Response) -> Result<Response, i32> {
	match response {
		Response::Error { kind, message, .. } => {
			print_error(&message);
			Err(kind.exit_code())
		}
		other => Ok(other),
	}
}

// --- Commands that talk to the daemon ---

fn cmd_list(ctx: &Context) -> i32 {
	let response = match send_request(ctx, &Request::List).and_then(report) {
		Ok(r) => r,
		Err(code) => return code,
	};
	match response {
		Response::List { processes } => {
			render_table(&processes);
			0
		}
		other => unexpected(other),
	}
}

fn cmd_process(ctx: &Context, request: Request) -> i32 {
	let response = match send_request(ctx, &request).and_then(report) {
		Ok(r) => r,
		Err(code) => return code,
	};
	match response {
		Response::Process { state } => {
			render_table(std::slice::from_ref(&state));
			if let Some(fault) = &state.fault {
				eprintln!("  {} {}", fault.kind.as_label().yellow(), fault.message.dimmed());
			}
			0
		}
		other => unexpected(other),
	}
}

fn cmd_logs(ctx: &Context, name: &str, lines: usize) -> i32 {
	if herd_ipc::client::is_running(&ctx.paths) {
		let request = Request::Logs { name: name.to_string(), lines };
		return match send_request(ctx, &request).and_then(report) {
			Ok(Response::Log { text }) => {
				println!("{}", text);
				0
			}
			Ok(other) => unexpected(other),
			Err(code) => code,
		};
	}

	// Daemon down: fall back to the newest log file on disk.
	let files = herd_supervisor::logs::log_files(&ctx.paths.log_dir(), name);
	let Some(latest) = files.last() else {
		let specs = match validate(ctx) {
			Ok(specs) => specs,
			Err(code) => return code,
		};
		if specs.iter().any(|s| s.name == name) {
			eprintln!("no logs for {} yet", name);
			return 0;
		}
		print_error(&format!("unknown process: {}", name));
		return ErrorKind::UnknownName.exit_code();
	};
	match std::fs::read_to_string(latest) {
		Ok(content) => {
			println!("{}", tail_lines(&content, lines));
			0
		}
		Err(e) => {
			print_error(&format!("failed to read {}: {}", latest.display(), e));
			exit_failure()
		}
	}
}

fn cmd_check(ctx: &Context) -> i32 {
	let specs = match validate(ctx) {
		Ok(specs) => specs,
		Err(code) => return code,
	};
	let width = specs.iter().map(|s| s.name.len()).max().unwrap_or(4);
	for spec in &specs {
		let restart = if spec.restart.autorestart { "autorestart" } else { "once" };
		println!(
			"{} {:<width$} {} {}",
			"✓".green(),
			spec.name.bold(),
			spec.command_line(),
			restart.dimmed(),
			width = width
		);
	}
	eprintln!("{} apps in {}", specs.len(), ctx.apps.display());
	0
}

fn unexpected(response: Response) -> i32 {
	print_error(&format!("unexpected response from daemon: {:?}", response));
	exit_failure()
}

// --- Rendering ---

fn render_table(processes: &[ProcessState]) {
	if processes.is_empty() {
		eprintln!("no processes defined");
		return;
	}
	let name_width = processes.iter().map(|p| p.name.len()).max().unwrap_or(4);
	for state in processes {
		print_process_line(state, name_width);
	}
}

fn print_process_line(state: &ProcessState, name_width: usize) {
	let exit = state.last_exit.map(|e| e.to_string()).unwrap_or_else(|| "-".to_string());
	let (circle, detail, label) = match state.status {
		ProcessStatus::Running => (
			"●".green().to_string(),
			state.uptime_secs().map(format_uptime).unwrap_or_else(|| "-".to_string()),
			"running".green().to_string(),
		),
		ProcessStatus::Starting => ("●".yellow().to_string(), "-".to_string(), "starting".yellow().to_string()),
		ProcessStatus::Stopping => ("●".yellow().to_string(), "-".to_string(), "stopping".yellow().to_string()),
		ProcessStatus::Stopped => ("○".dimmed().to_string(), exit, "stopped".dimmed().to_string()),
		ProcessStatus::Crashed if state.restart_pending() => {
			let delay = state.next_restart_ms.unwrap_or(0);
			(
				"●".yellow().to_string(),
				exit,
				format!("crashed, retry in {}", format_delay(delay)).yellow().to_string(),
			)
		}
		ProcessStatus::Crashed => ("●".red().to_string(), exit, "crashed".red().to_string()),
	};
	let pid = state.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
	let restarts = format!("↺{}", state.restart_count);
	println!(
		"{} {:<width$} {:<8} {:<10} {:<5} {}",
		circle,
		state.name,
		pid,
		detail,
		restarts,
		label,
		width = name_width
	);
}

fn format_uptime(secs: u64) -> String {
	if secs < 60 {
		format!("{}s", secs)
	} else if secs < 3600 {
		let m = secs / 60;
		let s = secs % 60;
		if s == 0 { format!("{}m", m) } else { format!("{}m{}s", m, s) }
	} else if secs < 86400 {
		let h = secs / 3600;
		let m = (secs % 3600) / 60;
		if m == 0 { format!("{}h", h) } else { format!("{}h{}m", h, m) }
	} else {
		let d = secs / 86400;
		let h = (secs % 86400) / 3600;
		if h == 0 { format!("{}d", d) } else { format!("{}d{}h", d, h) }
	}
}

fn format_delay(ms: u64) -> String {
	if ms < 1000 {
		format!("{}ms", ms)
	} else {
		format_uptime(ms / 1000)
	}
}

fn tail_lines(text: &str, lines: usize) -> String {
	let all: Vec<&str> = text.lines().collect();
	let start = all.len().saturating_sub(lines);
	all[start..].join("\n")
}
