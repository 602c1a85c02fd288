//! On-disk log layout: `<log_dir>/<process>/<process> YY-MMDD.log`, with
//! rotated files suffixed by hour (and minute on collision).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn process_log_dir(log_dir: &Path, process: &str) -> PathBuf {
	log_dir.join(process)
}

pub fn current_log_name(process: &str) -> String {
	let (date, _, _) = now_parts();
	format!("{} {}.log", process, date)
}

pub fn rotated_log_name(dir: &Path, process: &str) -> String {
	let (date, hour, minute) = now_parts();
	let candidate = format!("{} {} {}.log", process, date, hour);
	if dir.join(&candidate).exists() {
		format!("{} {} {}.{}.log", process, date, hour, minute)
	} else {
		candidate
	}
}

/// Date encoded in a log file name, as `(yy, month, day)`.
pub fn parse_log_date(filename: &str) -> Option<(u32, u32, u32)> {
	let (_, rest) = filename.split_once(' ')?;
	let date = rest.split(' ').next().unwrap_or(rest).trim_end_matches(".log");

	let (year, mmdd) = date.split_once('-')?;
	if mmdd.len() != 4 || !mmdd.is_ascii() {
		return None;
	}
	let year: u32 = year.parse().ok()?;
	let month: u32 = mmdd.get(..2)?.parse().ok()?;
	let day: u32 = mmdd.get(2..)?.parse().ok()?;
	Some((year, month, day))
}

/// Latest log files for `process`, newest last.
pub fn log_files(log_dir: &Path, process: &str) -> Vec<PathBuf> {
	let prefix = format!("{} ", process);
	let mut files: Vec<PathBuf> = std::fs::read_dir(process_log_dir(log_dir, process))
		.map(|entries| {
			entries
				.flatten()
				.map(|e| e.path())
				.filter(|p| {
					let name = p.file_name().unwrap_or_default().to_string_lossy();
					name.starts_with(&prefix) && name.ends_with(".log")
				})
				.collect()
		})
		.unwrap_or_default();
	files.sort_by_key(|p| p.metadata().and_then(|m| m.modified()).ok());
	files
}

/// Remove logs older than `max_age_days` and keep at most `max_files` per
/// process. Zero disables either limit.
pub fn expire_logs(log_dir: &Path, max_age_days: u32, max_files: u32) {
	let Ok(entries) = std::fs::read_dir(log_dir) else {
		return;
	};

	for entry in entries.flatten() {
		if entry.path().is_dir() {
			expire_process_logs(&entry.path(), max_age_days, max_files);
		}
	}
}

fn expire_process_logs(dir: &Path, max_age_days: u32, max_files: u32) {
	let Ok(entries) = std::fs::read_dir(dir) else {
		return;
	};

	let mut log_files: Vec<(PathBuf, Option<(u32, u32, u32)>)> = entries
		.flatten()
		.map(|e| e.path())
		.filter(|p| p.extension().and_then(|e| e.to_str()) == Some("log"))
		.map(|p| {
			let date = parse_log_date(&p.file_name().unwrap_or_default().to_string_lossy());
			(p, date)
		})
		.collect();

	if max_age_days > 0 {
		let cutoff = now_secs().saturating_sub(max_age_days as u64 * 86400);
		log_files.retain(|(path, date)| match date {
			Some((y, m, d)) if date_to_epoch(*y, *m, *d) < cutoff => {
				let _ = std::fs::remove_file(path);
				false
			}
			_ => true,
		});
	}

	if max_files > 0 && log_files.len() > max_files as usize {
		log_files.sort_by_key(|(p, _)| p.metadata().and_then(|m| m.modified()).ok());
		let excess = log_files.len() - max_files as usize;
		for (path, _) in log_files.iter().take(excess) {
			let _ = std::fs::remove_file(path);
		}
	}
}

/// `(year, month, day, hour, minute)` in UTC.
pub fn secs_to_datetime(secs: u64) -> (u32, u32, u32, u32, u32) {
	let days = (secs / 86400) as i64;
	let time_of_day = secs % 86400;
	let hour = (time_of_day / 3600) as u32;
	let minute = ((time_of_day % 3600) / 60) as u32;

	let z = days + 719468;
	let era = if z >= 0 { z } else { z - 146096 } / 146097;
	let doe = (z - era * 146097) as u32;
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let y = yoe as i64 + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = doy - (153 * mp + 2) / 5 + 1;
	let m = if mp < 10 { mp + 3 } else { mp - 9 };
	let y = if m <= 2 { y + 1 } else { y };

	(y as u32, m, d, hour, minute)
}

fn date_to_epoch(year: u32, month: u32, day: u32) -> u64 {
	let y = (if year < 100 { 2000 + year } else { year }) as i64;
	let m = month as i64;
	let d = day as i64;

	let y_adj = if m <= 2 { y - 1 } else { y };
	let m_adj = if m <= 2 { m + 9 } else { m - 3 };

	let era = if y_adj >= 0 { y_adj } else { y_adj - 399 } / 400;
	let yoe = y_adj - era * 400;
	let doy = (153 * m_adj + 2) / 5 + d - 1;
	let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	let days = era * 146097 + doe - 719468;
	(days.max(0) * 86400) as u64
}

fn now_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

fn now_parts() -> (String, String, String) {
	let (year, month, day, hour, minute) = secs_to_datetime(now_secs());
	(
		format!("{:02}-{:02}{:02}", year % 100, month, day),
		format!("{:02}", hour),
		format!("{:02}", minute),
	)
}
