use herd_supervisor::{Error, ErrorKind, ProcessState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	List,
	Status { name: String },
	Start { name: String },
	Stop { name: String },
	Restart { name: String },
	Logs { name: String, lines: usize },
	Ping,
	Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok { message: String },
	List { processes: Vec<ProcessState> },
	Process { state: ProcessState },
	Log { text: String },
	Error {
		kind: ErrorKind,
		name: Option<String>,
		message: String,
	},
	Pong,
}

impl Response {
	pub fn error(err: &Error) -> Self {
		Response::Error {
			kind: err.kind(),
			name: err.process().map(String::from),
			message: err.to_string(),
		}
	}

	pub fn from_result(result: Result<ProcessState, Error>) -> Self {
		match result {
			Ok(state) => Response::Process { state },
			Err(e) => Response::error(&e),
		}
	}
}

pub fn daemon_paths() -> herd_ipc::DaemonPaths {
	herd_ipc::DaemonPaths::new("herd")
}
