use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use herd_supervisor::registry::{self, Defaults};
use herd_supervisor::*;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_dir(name: &str) -> PathBuf {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	let dir = std::env::temp_dir().join(format!("herd-test-{}-{}-{}", std::process::id(), n, name));
	let _ = std::fs::create_dir_all(&dir);
	dir
}

fn fast_backoff(first_ms: u64) -> BackoffPolicy {
	BackoffPolicy {
		first: Duration::from_millis(first_ms),
		max: Duration::from_millis(first_ms * 4),
		factor: 2.0,
	}
}

fn sh(name: &str, script: &str, dir: &Path) -> ProcessSpec {
	let mut spec = ProcessSpec::new(name, "sh", dir);
	spec.args = vec!["-c".to_string(), script.to_string()];
	spec.restart.backoff = fast_backoff(20);
	spec.stop_timeout = Duration::from_secs(2);
	spec
}

fn supervisor(specs: Vec<ProcessSpec>, dir: &Path) -> Supervisor {
	Supervisor::new(
		specs,
		SupervisorConfig {
			log_dir: dir.join("logs"),
			max_log_size: 1024 * 1024,
		},
	)
	.unwrap()
}

async fn wait_for(
	sup: &Supervisor,
	name: &str,
	what: &str,
	pred: impl Fn(&ProcessState) -> bool,
) -> ProcessState {
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		let state = sup.status(name).unwrap();
		if pred(&state) {
			return state;
		}
		if Instant::now() > deadline {
			panic!("timed out waiting for {}: {:?}", what, state);
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Transition>, name: &str) -> Vec<ProcessStatus> {
	let mut seen = Vec::new();
	while let Ok(t) = rx.try_recv() {
		if t.name == name {
			seen.push(t.to);
		}
	}
	seen
}

// --- Load and start ---

#[tokio::test]
async fn load_then_start_every_name_runs() {
	let dir = temp_dir("load-start");
	let config = dir.join("apps.toml");
	std::fs::write(
		&config,
		r#"
[[apps]]
name = "tg-sender"
script = "sh"
args = ["-c", "sleep 60"]

[[apps]]
name = "tg-api"
script = "sleep"
args = "60"
interpreter = "none"

[[apps]]
name = "tg-web"
script = "sleep"
args = "60"
cwd = "."
env = { PORT = 3000 }
"#,
	)
	.unwrap();

	let specs = registry::load_file(&config, &Defaults::default()).unwrap();
	let sup = supervisor(specs, &dir);
	assert_eq!(sup.names(), vec!["tg-sender", "tg-api", "tg-web"]);
	assert!(sup.list().iter().all(|s| s.status == ProcessStatus::Stopped));

	for name in ["tg-sender", "tg-api", "tg-web"] {
		let state = sup.start(name).await.unwrap();
		assert_eq!(state.status, ProcessStatus::Running);
		assert!(state.pid.is_some());
	}
	for state in sup.list() {
		assert!(state.is_running(), "{:?}", state);
	}

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	assert!(sup.list().iter().all(|s| s.status == ProcessStatus::Stopped));
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
	let dir = temp_dir("start-twice");
	let sup = supervisor(vec![sh("sleeper", "sleep 60", &dir)], &dir);

	let first = sup.start("sleeper").await.unwrap();
	let second = sup.start("sleeper").await.unwrap();
	assert_eq!(first.pid, second.pid);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn duplicate_names_fail_and_start_nothing() {
	let dir = temp_dir("duplicates");
	let marker = dir.join("started");
	let config = dir.join("apps.json");
	let touch = format!("touch {}", marker.display());
	std::fs::write(
		&config,
		serde_json::json!({"apps": [
			{"name": "tg-api", "script": "sh", "args": ["-c", touch]},
			{"name": "tg-api", "script": "sh", "args": ["-c", touch]}
		]})
		.to_string(),
	)
	.unwrap();

	match registry::load_file(&config, &Defaults::default()) {
		Err(ConfigError::DuplicateName(name)) => assert_eq!(name, "tg-api"),
		other => panic!("expected DuplicateName, got {:?}", other),
	}

	let specs = vec![sh("tg-api", &touch, &dir), sh("tg-api", &touch, &dir)];
	let err = Supervisor::new(
		specs,
		SupervisorConfig { log_dir: dir.join("logs"), max_log_size: 1024 },
	)
	.err()
	.unwrap();
	assert_eq!(err.kind(), ErrorKind::Config);
	assert_eq!(err.kind().exit_code(), 2);

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(!marker.exists());
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unknown_name_is_reported() {
	let dir = temp_dir("unknown");
	let sup = supervisor(vec![sh("tg-web", "sleep 60", &dir)], &dir);

	let err = sup.start("tg-nope").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnknownName);
	assert_eq!(err.process(), Some("tg-nope"));
	assert!(sup.status("tg-nope").is_err());
	assert!(sup.stop("tg-nope").await.is_err());
	let _ = std::fs::remove_dir_all(&dir);
}

// --- Spawn failures ---

#[tokio::test]
async fn missing_executable_is_spawn_error() {
	let dir = temp_dir("spawn-error");
	let mut spec = ProcessSpec::new("ghost", "/nonexistent/herd-missing-binary", &dir);
	spec.restart.autorestart = false;
	let sup = supervisor(vec![spec], &dir);

	let err = sup.start("ghost").await.unwrap_err();
	assert!(matches!(err, Error::Spawn { .. }), "{:?}", err);
	assert_eq!(err.kind().exit_code(), 4);

	let state = sup.status("ghost").unwrap();
	assert_eq!(state.status, ProcessStatus::Crashed);
	assert!(!state.restart_pending());
	assert_eq!(state.fault.map(|f| f.kind), Some(ErrorKind::Spawn));
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn spawn_failures_retry_until_exhausted() {
	let dir = temp_dir("exhausted");
	let mut spec = ProcessSpec::new("ghost", "/nonexistent/herd-missing-binary", &dir);
	spec.restart.backoff = fast_backoff(10);
	spec.restart.max_retries = Some(2);
	let sup = supervisor(vec![spec], &dir);

	assert!(sup.start("ghost").await.is_err());
	let state = wait_for(&sup, "ghost", "exhaustion", |s| {
		s.fault.as_ref().map(|f| f.kind) == Some(ErrorKind::ExhaustedRetries)
	})
	.await;
	assert_eq!(state.status, ProcessStatus::Crashed);
	assert!(!state.restart_pending());
	assert_eq!(state.restart_count, 2);

	// Stays down until an operator intervenes.
	tokio::time::sleep(Duration::from_millis(200)).await;
	assert_eq!(sup.status("ghost").unwrap().restart_count, 2);
	let _ = std::fs::remove_dir_all(&dir);
}

// --- Crash restarts ---

#[tokio::test]
async fn crash_is_restarted_after_backoff() {
	let dir = temp_dir("tg-sender");
	let script = "if [ -f crashed ]; then exec sleep 60; else touch crashed; exit 1; fi";
	let mut spec = sh("tg-sender", script, &dir);
	spec.restart.backoff = fast_backoff(300);
	let sup = supervisor(vec![spec], &dir);
	let mut events = sup.subscribe();

	sup.start("tg-sender").await.unwrap();

	let pending = wait_for(&sup, "tg-sender", "pending restart", |s| s.restart_pending()).await;
	assert_eq!(pending.last_exit.and_then(|e| e.code), Some(1));
	assert_eq!(pending.restart_count, 0);

	let state = wait_for(&sup, "tg-sender", "restart", |s| s.is_running() && s.restart_count == 1).await;
	assert!(state.pid.is_some());

	assert_eq!(
		drain(&mut events, "tg-sender"),
		vec![
			ProcessStatus::Starting,
			ProcessStatus::Running,
			ProcessStatus::Crashed,
			ProcessStatus::Starting,
			ProcessStatus::Running,
		]
	);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn restart_count_grows_until_manual_restart() {
	let dir = temp_dir("crash-loop");
	let sup = supervisor(vec![sh("looper", "sleep 0.05; exit 3", &dir)], &dir);

	sup.start("looper").await.unwrap();

	let deadline = Instant::now() + Duration::from_secs(5);
	let mut last = 0;
	loop {
		let count = sup.status("looper").unwrap().restart_count;
		assert!(count >= last, "restart count went from {} to {}", last, count);
		last = count;
		if count >= 3 {
			break;
		}
		assert!(Instant::now() < deadline, "only {} restarts", count);
		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	let state = sup.restart("looper").await.unwrap();
	assert_eq!(state.restart_count, 0);
	assert_eq!(state.status, ProcessStatus::Running);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stable_run_resets_backoff() {
	let dir = temp_dir("stability");
	let script = "n=$(cat runs 2>/dev/null || echo 0); n=$((n+1)); echo $n > runs; \
		case $n in 1|2) exit 1;; 3) sleep 0.4; exit 1;; *) exec sleep 60;; esac";
	let mut spec = sh("flappy", script, &dir);
	spec.restart.backoff = fast_backoff(50);
	spec.restart.reset_after = Duration::from_millis(200);
	let sup = supervisor(vec![spec], &dir);

	sup.start("flappy").await.unwrap();
	wait_for(&sup, "flappy", "fourth run", |s| s.is_running() && s.restart_count == 3).await;

	// Failure numbering restarts once a run outlives the stability window.
	let text = sup.output("flappy").unwrap().tail(50).await;
	let failures: Vec<&str> = text
		.lines()
		.filter(|l| l.contains("restarting in"))
		.filter_map(|l| l.rsplit("(failure ").next())
		.collect();
	assert_eq!(failures, vec!["1)", "2)", "1)"], "output was: {}", text);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn crash_loop_gives_up_after_max_retries() {
	let dir = temp_dir("give-up");
	let mut spec = sh("doomed", "exit 1", &dir);
	spec.restart.backoff = fast_backoff(10);
	spec.restart.max_retries = Some(2);
	let sup = supervisor(vec![spec], &dir);

	sup.start("doomed").await.unwrap();
	let state = wait_for(&sup, "doomed", "exhaustion", |s| {
		s.fault.as_ref().map(|f| f.kind) == Some(ErrorKind::ExhaustedRetries)
	})
	.await;
	assert_eq!(state.status, ProcessStatus::Crashed);
	assert_eq!(state.restart_count, 2);
	assert_eq!(state.last_exit.and_then(|e| e.code), Some(1));
	assert!(!state.restart_pending());

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert_eq!(sup.status("doomed").unwrap().restart_count, 2);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stop_clears_fault() {
	let dir = temp_dir("clear-fault");
	let mut spec = sh("doomed", "exit 1", &dir);
	spec.restart.backoff = fast_backoff(10);
	spec.restart.max_retries = Some(0);
	let sup = supervisor(vec![spec], &dir);

	sup.start("doomed").await.unwrap();
	wait_for(&sup, "doomed", "exhaustion", |s| s.fault.is_some()).await;

	let state = sup.stop("doomed").await.unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert!(state.fault.is_none());
	assert!(sup.status("doomed").unwrap().fault.is_none());

	// Stopping again leaves it clean.
	let state = sup.stop("doomed").await.unwrap();
	assert!(state.fault.is_none());
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn manual_start_preempts_pending_restart() {
	let restart_dir = temp_dir("preempt-restart");
	let start_dir = temp_dir("preempt-start");
	let script = "if [ -f crashed ]; then exec sleep 60; else touch crashed; exit 1; fi";
	let mut via_restart = sh("via-restart", script, &restart_dir);
	via_restart.restart.backoff = fast_backoff(2000);
	let mut via_start = sh("via-start", script, &start_dir);
	via_start.restart.backoff = fast_backoff(2000);
	let sup = supervisor(vec![via_restart, via_start], &restart_dir);

	sup.start("via-restart").await.unwrap();
	sup.start("via-start").await.unwrap();
	wait_for(&sup, "via-restart", "pending restart", |s| s.restart_pending()).await;
	wait_for(&sup, "via-start", "pending restart", |s| s.restart_pending()).await;

	let began = Instant::now();
	let restarted = sup.restart("via-restart").await.unwrap();
	let started = sup.start("via-start").await.unwrap();
	assert!(began.elapsed() < Duration::from_secs(1), "took {:?}", began.elapsed());

	for state in [&restarted, &started] {
		assert_eq!(state.status, ProcessStatus::Running, "{:?}", state);
		assert_eq!(state.restart_count, 0);
		assert_eq!(state.next_restart_ms, None);
		assert!(state.pid.is_some());
	}

	// The cancelled backoff never fires a second launch.
	tokio::time::sleep(Duration::from_millis(300)).await;
	assert_eq!(sup.status("via-restart").unwrap().pid, restarted.pid);
	assert_eq!(sup.status("via-start").unwrap().pid, started.pid);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&restart_dir);
	let _ = std::fs::remove_dir_all(&start_dir);
}

#[tokio::test]
async fn exit_without_autorestart() {
	let dir = temp_dir("no-restart");
	let mut clean = sh("clean", "echo done", &dir);
	clean.restart.autorestart = false;
	let mut failing = sh("failing", "exit 2", &dir);
	failing.restart.autorestart = false;
	let sup = supervisor(vec![clean, failing], &dir);

	sup.start("clean").await.unwrap();
	sup.start("failing").await.unwrap();

	wait_for(&sup, "clean", "clean exit", |s| s.status == ProcessStatus::Stopped).await;
	let failed = wait_for(&sup, "failing", "crash", |s| s.status == ProcessStatus::Crashed).await;
	assert!(!failed.restart_pending());
	assert_eq!(failed.last_exit.and_then(|e| e.code), Some(2));

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(sup.status("failing").unwrap().restart_count, 0);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn crash_loop_does_not_affect_siblings() {
	let dir = temp_dir("isolation");
	let sup = supervisor(
		vec![sh("steady", "sleep 60", &dir), sh("flaky", "exit 1", &dir)],
		&dir,
	);

	let steady = sup.start("steady").await.unwrap();
	sup.start("flaky").await.unwrap();
	wait_for(&sup, "flaky", "crash loop", |s| s.restart_count >= 3).await;

	let now = sup.status("steady").unwrap();
	assert!(now.is_running());
	assert_eq!(now.pid, steady.pid);

	sup.shutdown_all(Duration::from_secs(2)).await.unwrap();
	let _ = std::fs::remove_dir_all(&dir);
}

// --- Stop ---

#[tokio::test]
async fn stop_escalates_when_sigterm_is_ignored() {
	let dir = temp_dir("stubborn");
	let sup = supervisor(
		vec![sh("stubborn", "trap '' TERM; echo ready; while true; do sleep 0.1; done", &dir)],
		&dir,
	);

	sup.start("stubborn").await.unwrap();
	let output = sup.output("stubborn").unwrap();
	let deadline = Instant::now() + Duration::from_secs(5);
	while !output.tail(10).await.contains("ready") {
		assert!(Instant::now() < deadline, "trap never installed");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let timeout = Duration::from_millis(500);
	let began = Instant::now();
	let err = sup.stop_with_timeout("stubborn", timeout).await.unwrap_err();
	let elapsed = began.elapsed();

	assert!(matches!(err, Error::Timeout { .. }), "{:?}", err);
	assert_eq!(err.kind().exit_code(), 3);
	assert!(elapsed >= timeout);
	assert!(elapsed < timeout + Duration::from_millis(500), "took {:?}", elapsed);

	let state = sup.status("stubborn").unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert_eq!(state.last_exit.and_then(|e| e.signal), Some(9));
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn concurrent_stops_are_serialized() {
	let dir = temp_dir("concurrent-stop");
	let sup = supervisor(vec![sh("tg-api", "sleep 60", &dir)], &dir);
	let mut events = sup.subscribe();

	sup.start("tg-api").await.unwrap();
	let (a, b) = tokio::join!(sup.stop("tg-api"), sup.stop("tg-api"));
	assert_eq!(a.unwrap().status, ProcessStatus::Stopped);
	assert_eq!(b.unwrap().status, ProcessStatus::Stopped);

	assert_eq!(
		drain(&mut events, "tg-api"),
		vec![
			ProcessStatus::Starting,
			ProcessStatus::Running,
			ProcessStatus::Stopping,
			ProcessStatus::Stopped,
		]
	);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stop_cancels_pending_restart() {
	let dir = temp_dir("cancel-backoff");
	let mut spec = sh("flaky", "exit 1", &dir);
	spec.restart.backoff = fast_backoff(300);
	let sup = supervisor(vec![spec], &dir);

	sup.start("flaky").await.unwrap();
	wait_for(&sup, "flaky", "pending restart", |s| s.restart_pending()).await;

	let state = sup.stop("flaky").await.unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert_eq!(state.next_restart_ms, None);

	tokio::time::sleep(Duration::from_millis(600)).await;
	let state = sup.status("flaky").unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert_eq!(state.restart_count, 0);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stop_is_idempotent() {
	let dir = temp_dir("stop-twice");
	let sup = supervisor(vec![sh("idle", "sleep 60", &dir)], &dir);

	let state = sup.stop("idle").await.unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert_eq!(state.pid, None);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn shutdown_all_reports_stragglers() {
	let dir = temp_dir("shutdown");
	let sup = supervisor(
		vec![
			sh("polite", "sleep 60", &dir),
			sh("stubborn", "trap '' TERM; echo ready; while true; do sleep 0.1; done", &dir),
		],
		&dir,
	);
	sup.start("polite").await.unwrap();
	sup.start("stubborn").await.unwrap();
	let output = sup.output("stubborn").unwrap();
	let deadline = Instant::now() + Duration::from_secs(5);
	while !output.tail(10).await.contains("ready") {
		assert!(Instant::now() < deadline, "trap never installed");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let began = Instant::now();
	match sup.shutdown_all(Duration::from_millis(400)).await {
		Err(Error::ShutdownTimeout { stuck, .. }) => assert_eq!(stuck, vec!["stubborn"]),
		other => panic!("expected ShutdownTimeout, got {:?}", other),
	}
	assert!(began.elapsed() < Duration::from_millis(1500), "took {:?}", began.elapsed());
	assert!(sup.list().iter().all(|s| s.status == ProcessStatus::Stopped));
	let _ = std::fs::remove_dir_all(&dir);
}

// --- Process groups ---

/// True while `pid` exists and is not a zombie awaiting its new parent.
fn alive(pid: i32) -> bool {
	if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err() {
		return false;
	}
	match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
		Ok(stat) => !stat.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
		Err(_) => true,
	}
}

async fn read_pid(path: &Path) -> i32 {
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		if let Some(pid) = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()) {
			return pid;
		}
		assert!(Instant::now() < deadline, "{} never written", path.display());
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

async fn assert_gone(pid: i32, what: &str) {
	let deadline = Instant::now() + Duration::from_secs(3);
	while alive(pid) {
		assert!(Instant::now() < deadline, "{} (pid {}) outlived its group leader", what, pid);
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
}

#[tokio::test]
async fn crash_takes_down_background_children() {
	let dir = temp_dir("orphan-crash");
	let mut spec = sh("forker", "sleep 300 & echo $! > child.pid; sleep 0.2; exit 1", &dir);
	spec.restart.autorestart = false;
	let sup = supervisor(vec![spec], &dir);

	sup.start("forker").await.unwrap();
	let pid = read_pid(&dir.join("child.pid")).await;
	assert!(alive(pid));

	let state = wait_for(&sup, "forker", "crash", |s| s.status == ProcessStatus::Crashed).await;
	assert_eq!(state.last_exit.and_then(|e| e.code), Some(1));
	assert_gone(pid, "background sleep").await;
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stop_reaps_members_that_ignore_sigterm() {
	let dir = temp_dir("orphan-stop");
	let script = "(trap '' TERM; sleep 300) & echo $! > child.pid; exec sleep 60";
	let mut spec = sh("forker", script, &dir);
	spec.stop_timeout = Duration::from_millis(300);
	let sup = supervisor(vec![spec], &dir);

	sup.start("forker").await.unwrap();
	let pid = read_pid(&dir.join("child.pid")).await;

	// The leader honours SIGTERM, so the stop itself is not forced.
	let state = sup.stop("forker").await.unwrap();
	assert_eq!(state.status, ProcessStatus::Stopped);
	assert_gone(pid, "TERM-ignoring subshell").await;
	let _ = std::fs::remove_dir_all(&dir);
}

// --- Environment and output ---

#[tokio::test]
async fn env_is_merged_over_parent_environment() {
	let dir = temp_dir("env");
	let mut spec = sh("env", "echo \"var=$HERD_TEST_VAR path=$PATH\"", &dir);
	spec.env.insert("HERD_TEST_VAR".to_string(), "hello123".to_string());
	spec.restart.autorestart = false;
	let sup = supervisor(vec![spec], &dir);

	sup.start("env").await.unwrap();
	wait_for(&sup, "env", "exit", |s| s.status == ProcessStatus::Stopped).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	let text = sup.output("env").unwrap().tail(20).await;
	assert!(text.contains("var=hello123"), "output was: {}", text);
	let path = std::env::var("PATH").unwrap_or_default();
	assert!(text.contains(&format!("path={}", path)), "output was: {}", text);
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn output_lands_in_log_file() {
	let dir = temp_dir("log-file");
	let mut spec = sh("chatty", "echo hello-herd", &dir);
	spec.restart.autorestart = false;
	let sup = supervisor(vec![spec], &dir);

	sup.start("chatty").await.unwrap();
	wait_for(&sup, "chatty", "exit", |s| s.status == ProcessStatus::Stopped).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	let files = logs::log_files(&dir.join("logs"), "chatty");
	assert_eq!(files.len(), 1);
	let content = std::fs::read_to_string(&files[0]).unwrap();
	assert!(content.contains("hello-herd"), "log was: {}", content);
	assert!(content.contains("[herd] chatty exited (exit 0)"), "log was: {}", content);
	let _ = std::fs::remove_dir_all(&dir);
}
