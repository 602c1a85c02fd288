use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::logs;

const RING_BUFFER_SIZE: usize = 64 * 1024;

/// Combined stdout/stderr of one process: the most recent output in memory,
/// everything on disk.
#[derive(Clone)]
pub struct OutputCapture {
	ring: Arc<Mutex<VecDeque<u8>>>,
	log_writer: Arc<Mutex<LogWriter>>,
}

struct LogWriter {
	file: Option<File>,
	path: PathBuf,
	bytes_written: u64,
	max_size: u64,
	dir: PathBuf,
	process: String,
}

impl OutputCapture {
	/// Log files that cannot be opened are skipped; the ring buffer still works.
	pub fn new(log_dir: &Path, process: &str, max_log_size: u64) -> Self {
		let dir = logs::process_log_dir(log_dir, process);
		if let Err(e) = fs::create_dir_all(&dir) {
			tracing::warn!(process, dir = %dir.display(), error = %e, "cannot create log directory");
		}

		let path = dir.join(logs::current_log_name(process));
		let file = open_append(&path);
		let bytes_written = file
			.as_ref()
			.and_then(|f| f.metadata().ok())
			.map(|m| m.len())
			.unwrap_or(0);

		Self {
			ring: Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_SIZE))),
			log_writer: Arc::new(Mutex::new(LogWriter {
				file,
				path,
				bytes_written,
				max_size: max_log_size,
				dir,
				process: process.to_string(),
			})),
		}
	}

	pub async fn write(&self, data: &[u8]) {
		{
			let mut ring = self.ring.lock().await;
			let overflow = (ring.len() + data.len()).saturating_sub(RING_BUFFER_SIZE);
			let evict = overflow.min(ring.len());
			ring.drain(..evict);
			let keep = data.len().min(RING_BUFFER_SIZE);
			ring.extend(&data[data.len() - keep..]);
		}

		self.log_writer.lock().await.write(data);
	}

	/// Supervisor event line, interleaved with the process output.
	pub async fn note(&self, message: &str) {
		self.write(format!("[herd] {}\n", message).as_bytes()).await;
	}

	pub async fn snapshot(&self) -> Vec<u8> {
		let ring = self.ring.lock().await;
		ring.iter().copied().collect()
	}

	/// The last `lines` lines of buffered output.
	pub async fn tail(&self, lines: usize) -> String {
		let text = String::from_utf8_lossy(&self.snapshot().await).into_owned();
		let all: Vec<&str> = text.lines().collect();
		let start = all.len().saturating_sub(lines);
		all[start..].join("\n")
	}

	pub async fn log_path(&self) -> PathBuf {
		self.log_writer.lock().await.path.clone()
	}
}

impl LogWriter {
	fn write(&mut self, data: &[u8]) {
		let Some(file) = self.file.as_mut() else {
			return;
		};
		if file.write_all(data).is_err() {
			return;
		}

		self.bytes_written += data.len() as u64;
		if self.max_size > 0 && self.bytes_written >= self.max_size {
			self.rotate();
		}
	}

	fn rotate(&mut self) {
		drop(self.file.take());

		let rotated = self.dir.join(logs::rotated_log_name(&self.dir, &self.process));
		let _ = fs::rename(&self.path, &rotated);

		self.path = self.dir.join(logs::current_log_name(&self.process));
		self.file = open_append(&self.path);
		self.bytes_written = 0;
	}
}

fn open_append(path: &Path) -> Option<File> {
	OpenOptions::new().create(true).append(true).open(path).ok()
}
