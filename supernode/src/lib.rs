//! A simple crate providing the supernode's fetch task registry.
//!
//! In a peer-assisted distribution system, every download process of some content (a _task_) registers itself to the
//! supernode as a _fetch task_, identified by the client id it generated and the task id. The registry keeps track of
//! those fetch tasks, of the peer each of them runs on and of their status, and answers:
//! - which client id a given peer is using for a given task,
//! - which client ids are fetching a given task,
//! - which tasks a given peer is fetching, and under which client id.
//!
//! As a **strong hypothesis**, we can assume that:
//! - client ids are generated by the downloading clients and are **unique** per download process;
//! - `(cid, task_id)` pairs are not registered concurrently with conflicting data.
//!
//! Based on this assumption, fetch tasks are cached within an in-memory hashmap keyed by `{cid}@{task_id}`, and a second
//! hashmap keyed by `{peer_id}@{task_id}` maps peers to the client ids they use. Looking up a peer's entries or a task's
//! entries is a scan over the key prefixes or suffixes of the latter. Both hashmaps are held behind a single `RwLock`,
//! so that they can never be observed out of step with each other, nor with the fetch task metrics.
//!
//! ```
//! use supernode::config::Config;
//! use supernode::{FetchTask, TaskManager, TaskRegistry, TaskStatus};
//!
//! let manager = TaskManager::new(Config::default());
//!
//! manager.add(FetchTask::new("client", "peer", "task").with_path("/tmp/file"))?;
//! manager.update_status("client", "task", TaskStatus::Running)?;
//!
//! assert_eq!(manager.get("client", "task")?.status, TaskStatus::Running);
//! assert_eq!(manager.get_cid_by_peer_id_and_task_id("peer", "task")?, "client");
//! # Ok::<_, supernode::Error>(())
//! ```

mod error;
pub use error::Error;

mod task;
pub use task::*;

pub mod config;
pub mod metrics;
