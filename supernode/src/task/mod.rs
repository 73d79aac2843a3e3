use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

mod manager;
pub use manager::*;

pub mod utils;

/// Fetch task status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Registered, not downloading yet.
    #[default]
    Waiting,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    /// Wire representation, also used as metric label value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            _ => Err(Error::ConversionFailed {
                value: s.to_owned(),
                kind: "TaskStatus",
            }),
        }
    }
}

/// Fetch task description.
///
/// One registered download attempt of the content `task_id` by the download session `cid`, run on peer `peer_id`.
/// A fetch task is uniquely identified by its `(cid, task_id)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTask {
    /// Client id, generated by the downloading client for each download process.
    pub cid: String,

    /// Peer the download runs on.
    pub peer_id: String,

    /// Id of the content being fetched.
    pub task_id: String,

    /// Subsystem the download was issued from, for metrics attribution.
    pub call_system: String,

    /// Current status.
    pub status: TaskStatus,

    /// Local path the content is downloaded to.
    pub path: String,

    /// Piece size negotiated for the download.
    pub piece_size: i32,

    /// Whether the download was issued through a daemon proxy.
    pub dfdaemon: bool,

    /// Supernode the client registered to.
    pub supernode_ip: String,
}

impl FetchTask {
    /// Create a new `FetchTask` in [`TaskStatus::Waiting`] status.
    pub fn new(cid: impl Into<String>, peer_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            peer_id: peer_id.into(),
            task_id: task_id.into(),
            ..Default::default()
        }
    }

    /// Build a new `FetchTask` with given local path.
    #[inline]
    pub fn with_path(self, path: impl Into<String>) -> Self {
        Self { path: path.into(), ..self }
    }

    /// Build a new `FetchTask` with given call system.
    #[inline]
    pub fn with_call_system(self, call_system: impl Into<String>) -> Self {
        Self {
            call_system: call_system.into(),
            ..self
        }
    }

    /// Build a new `FetchTask` with given status.
    #[inline]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self { status, ..self }
    }

    /// Build a new `FetchTask` with given piece size.
    #[inline]
    pub fn with_piece_size(self, piece_size: i32) -> Self {
        Self { piece_size, ..self }
    }

    /// Build a new `FetchTask` flagged as issued through a daemon proxy.
    #[inline]
    pub fn with_dfdaemon(self, dfdaemon: bool) -> Self {
        Self { dfdaemon, ..self }
    }

    /// Build a new `FetchTask` with given supernode ip.
    #[inline]
    pub fn with_supernode_ip(self, supernode_ip: impl Into<String>) -> Self {
        Self {
            supernode_ip: supernode_ip.into(),
            ..self
        }
    }
}

/// Fetch task registry interface.
pub trait TaskRegistry: Send + Sync {
    /// Register `task`, replacing any fetch task with the same `(cid, task_id)` pair.
    ///
    /// Fails with [`Error::EmptyValue`] when any of `path`, `peer_id`, `cid` or `task_id` is empty.
    fn add(&self, task: FetchTask) -> Result<(), Error>;

    /// Get a copy of the fetch task registered by `cid` for `task_id`.
    fn get(&self, cid: &str, task_id: &str) -> Result<FetchTask, Error>;

    /// Get the client id of the fetch task running on `peer_id` for `task_id`.
    fn get_cid_by_peer_id_and_task_id(&self, peer_id: &str, task_id: &str) -> Result<String, Error>;

    /// Get the client ids of all fetch tasks for `task_id`, in no particular order.
    fn get_cids_by_task_id(&self, task_id: &str) -> Vec<String>;

    /// Get a client id to task id mapping of all fetch tasks running on `peer_id`.
    ///
    /// When a client id is used for several tasks on the same peer, only one of them is kept.
    fn get_cid_and_task_ids_by_peer_id(&self, peer_id: &str) -> HashMap<String, String>;

    /// Reserved, always empty.
    fn list(&self, filter: &HashMap<String, String>) -> Vec<FetchTask>;

    /// Delete the fetch task registered by `cid` for `task_id`.
    ///
    /// Its peer entry is kept when another client has since registered on the same peer for the same task.
    fn delete(&self, cid: &str, task_id: &str) -> Result<(), Error>;

    /// Update the status of the fetch task registered by `cid` for `task_id`.
    ///
    /// A fetch task in [`TaskStatus::Success`] status keeps it.
    fn update_status(&self, cid: &str, task_id: &str, status: TaskStatus) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings() {
        for status in [TaskStatus::Waiting, TaskStatus::Running, TaskStatus::Success, TaskStatus::Failed] {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }

        assert_eq!(TaskStatus::default(), TaskStatus::Waiting);
        assert_eq!(
            "waiting".parse::<TaskStatus>(),
            Err(Error::ConversionFailed {
                value: "waiting".to_owned(),
                kind: "TaskStatus"
            })
        );
    }

    #[test]
    fn test_fetch_task_builder() {
        let task = FetchTask::new("client", "peer", "task")
            .with_path("/tmp/file")
            .with_call_system("dfget")
            .with_piece_size(4 << 20)
            .with_dfdaemon(true)
            .with_supernode_ip("10.0.0.1");

        assert_eq!(task.cid, "client");
        assert_eq!(task.peer_id, "peer");
        assert_eq!(task.task_id, "task");
        assert_eq!(task.status, TaskStatus::Waiting);
        assert_eq!(task.path, "/tmp/file");
        assert_eq!(task.call_system, "dfget");
        assert_eq!(task.piece_size, 4 << 20);
        assert!(task.dfdaemon);
        assert_eq!(task.supernode_ip, "10.0.0.1");
    }
}
