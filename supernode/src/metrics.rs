//! Fetch task metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `supernode_dfgettasks` | Gauge | `callsystem`, `status` |
//! | `supernode_dfgettasks_registered_total` | Counter | `callsystem` |
//! | `supernode_dfgettasks_failed_total` | Counter | `callsystem` |
//!
//! Values go through a [`MetricsSink`]. The default [`Recorder`] sink forwards them to the `metrics` crate facade, so that
//! whatever exporter the embedding process installs picks them up. [`MemorySink`] keeps them in-process instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use metrics::{counter, describe_counter, describe_gauge, gauge, Label};

/// Label keys.
pub mod labels {
    /// Subsystem a fetch task was issued from.
    pub const CALL_SYSTEM: &str = "callsystem";
    /// Fetch task status.
    pub const STATUS: &str = "status";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A metric description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
}

/// Gauge: current fetch tasks by call system and status.
pub const DFGET_TASKS: Metric = Metric {
    name: "supernode_dfgettasks",
    kind: MetricKind::Gauge,
    help: "Current status of dfgettasks",
};

/// Counter: total fetch task registrations by call system.
pub const DFGET_TASKS_REGISTERED: Metric = Metric {
    name: "supernode_dfgettasks_registered_total",
    kind: MetricKind::Counter,
    help: "Total times of registering dfgettasks",
};

/// Counter: total fetch task failures by call system.
pub const DFGET_TASKS_FAILED: Metric = Metric {
    name: "supernode_dfgettasks_failed_total",
    kind: MetricKind::Counter,
    help: "Total failure times of dfgettasks",
};

/// Describe all fetch task metrics to the installed `metrics` recorder.
///
/// Call this once at startup, after installing the recorder.
pub fn register_metrics() {
    for metric in [DFGET_TASKS, DFGET_TASKS_REGISTERED, DFGET_TASKS_FAILED] {
        match metric.kind {
            MetricKind::Gauge => describe_gauge!(metric.name, metric.help),
            MetricKind::Counter => describe_counter!(metric.name, metric.help),
        }
    }
}

/// A labeled metrics sink.
///
/// Counters only ever go up: decrementing one is ignored.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    fn increment(&self, metric: &Metric, labels: &[(&'static str, &str)]);

    fn decrement(&self, metric: &Metric, labels: &[(&'static str, &str)]);
}

/// Sink forwarding to the `metrics` crate facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recorder;

impl Recorder {
    fn labels(labels: &[(&'static str, &str)]) -> Vec<Label> {
        labels.iter().map(|&(key, value)| Label::new(key, value.to_owned())).collect()
    }
}

impl MetricsSink for Recorder {
    fn increment(&self, metric: &Metric, labels: &[(&'static str, &str)]) {
        match metric.kind {
            MetricKind::Gauge => gauge!(metric.name, Self::labels(labels)).increment(1.0),
            MetricKind::Counter => counter!(metric.name, Self::labels(labels)).increment(1),
        }
    }

    fn decrement(&self, metric: &Metric, labels: &[(&'static str, &str)]) {
        match metric.kind {
            MetricKind::Gauge => gauge!(metric.name, Self::labels(labels)).decrement(1.0),
            MetricKind::Counter => tracing::warn!("Ignoring decrement of counter `{}`", metric.name),
        }
    }
}

type SeriesKey = (&'static str, Vec<(&'static str, String)>);

/// In-process sink keeping the current value of every series.
#[derive(Debug, Default)]
pub struct MemorySink {
    series: RwLock<HashMap<SeriesKey, i64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a series, `0` if it was never touched.
    pub fn value(&self, metric: &Metric, labels: &[(&'static str, &str)]) -> i64 {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);

        series.get(&Self::key(metric, labels)).copied().unwrap_or_default()
    }

    fn key(metric: &Metric, labels: &[(&'static str, &str)]) -> SeriesKey {
        (metric.name, labels.iter().map(|&(key, value)| (key, value.to_owned())).collect())
    }

    fn add(&self, metric: &Metric, labels: &[(&'static str, &str)], delta: i64) {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);

        *series.entry(Self::key(metric, labels)).or_default() += delta;
    }
}

impl MetricsSink for MemorySink {
    fn increment(&self, metric: &Metric, labels: &[(&'static str, &str)]) {
        self.add(metric, labels, 1);
    }

    fn decrement(&self, metric: &Metric, labels: &[(&'static str, &str)]) {
        match metric.kind {
            MetricKind::Gauge => self.add(metric, labels, -1),
            MetricKind::Counter => tracing::warn!("Ignoring decrement of counter `{}`", metric.name),
        }
    }
}

/// Fetch task accounting on top of a [`MetricsSink`].
#[derive(Debug, Clone)]
pub(crate) struct TaskMetrics {
    sink: Arc<dyn MetricsSink>,
}

impl Default for TaskMetrics {
    fn default() -> Self {
        Self::new(Arc::new(Recorder))
    }
}

impl TaskMetrics {
    pub(crate) fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn inc_tasks(&self, call_system: &str, status: &str) {
        self.sink.increment(&DFGET_TASKS, &[(labels::CALL_SYSTEM, call_system), (labels::STATUS, status)]);
    }

    pub(crate) fn dec_tasks(&self, call_system: &str, status: &str) {
        self.sink.decrement(&DFGET_TASKS, &[(labels::CALL_SYSTEM, call_system), (labels::STATUS, status)]);
    }

    pub(crate) fn inc_registered(&self, call_system: &str) {
        self.sink.increment(&DFGET_TASKS_REGISTERED, &[(labels::CALL_SYSTEM, call_system)]);
    }

    pub(crate) fn inc_failed(&self, call_system: &str) {
        self.sink.increment(&DFGET_TASKS_FAILED, &[(labels::CALL_SYSTEM, call_system)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_gauge() {
        let sink = MemorySink::new();
        let labels = [(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "WAITING")];

        assert_eq!(sink.value(&DFGET_TASKS, &labels), 0);
        sink.increment(&DFGET_TASKS, &labels);
        sink.increment(&DFGET_TASKS, &labels);
        sink.decrement(&DFGET_TASKS, &labels);
        assert_eq!(sink.value(&DFGET_TASKS, &labels), 1);

        // label values partition series
        assert_eq!(sink.value(&DFGET_TASKS, &[(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "RUNNING")]), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_memory_sink_counter_never_decreases() {
        let sink = MemorySink::new();
        let labels = [(labels::CALL_SYSTEM, "dfget")];

        sink.increment(&DFGET_TASKS_FAILED, &labels);
        sink.decrement(&DFGET_TASKS_FAILED, &labels);

        assert_eq!(sink.value(&DFGET_TASKS_FAILED, &labels), 1);
        assert!(logs_contain("Ignoring decrement of counter `supernode_dfgettasks_failed_total`"));
    }

    #[test]
    fn test_task_metrics() {
        let sink = Arc::new(MemorySink::new());
        let metrics = TaskMetrics::new(sink.clone());

        metrics.inc_tasks("dfget", "WAITING");
        metrics.inc_registered("dfget");
        metrics.dec_tasks("dfget", "WAITING");
        metrics.inc_tasks("dfget", "RUNNING");
        metrics.inc_failed("other");

        assert_eq!(sink.value(&DFGET_TASKS, &[(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "WAITING")]), 0);
        assert_eq!(sink.value(&DFGET_TASKS, &[(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "RUNNING")]), 1);
        assert_eq!(sink.value(&DFGET_TASKS_REGISTERED, &[(labels::CALL_SYSTEM, "dfget")]), 1);
        assert_eq!(sink.value(&DFGET_TASKS_FAILED, &[(labels::CALL_SYSTEM, "other")]), 1);
    }

    #[test]
    fn test_recorder_without_installed_recorder() {
        // the facade is a no-op until a recorder is installed
        register_metrics();
        Recorder.increment(&DFGET_TASKS, &[(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "WAITING")]);
        Recorder.decrement(&DFGET_TASKS, &[(labels::CALL_SYSTEM, "dfget"), (labels::STATUS, "WAITING")]);
        Recorder.increment(&DFGET_TASKS_REGISTERED, &[(labels::CALL_SYSTEM, "dfget")]);
    }
}
