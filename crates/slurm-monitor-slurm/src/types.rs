//! Snapshot data model.
//!
//! Everything here is constructed once per collection and never mutated
//! afterwards; consumers copy freely. `alloc <= total` is deliberately not
//! enforced; Slurm can report transient inconsistencies and we preserve
//! them verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cluster node as reported by `scontrol show node -o`.
///
/// Each `has_*` bit is false when the source field was absent, `N/A`,
/// `(null)`, or unparsable; the paired percentage is meaningless then.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Normalized state, flag composites like `MIXED+DRAIN` preserved.
    pub state: String,
    pub partition: String,

    pub cpu_alloc: i64,
    pub cpu_total: i64,
    pub cpu_util_pct: f64,
    pub has_cpu: bool,

    pub mem_alloc_mb: i64,
    pub mem_total_mb: i64,
    pub mem_util_pct: f64,
    pub has_mem: bool,

    pub gpu_alloc: i64,
    pub gpu_total: i64,
    pub gpu_util_pct: f64,
    pub has_gpu: bool,
}

/// Aggregated queue counters and distributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub running: u32,
    pub pending: u32,
    pub other: u32,

    pub by_state: Vec<StateCount>,
    pub by_partition: Vec<PartitionCount>,
    pub by_job_name: Vec<NameCount>,
    pub pending_cause: Vec<NameCount>,
    pub resource_load: ResourceTotals,
}

/// Per-user job counts and cumulative pending demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user: String,
    pub running: u32,
    pub pending: u32,

    pub pending_cpu_jobs: u32,
    pub pending_gpu_jobs: u32,

    pub pending_cpu: i64,
    pub pending_mem_mb: i64,
    pub pending_gpu: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCount {
    pub state: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionCount {
    pub partition: String,
    pub running: u32,
    pub pending: u32,
    pub other: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: u32,
}

/// Requested resources split by running/pending class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub running_cpu: i64,
    pub pending_cpu: i64,

    pub running_mem_mb: i64,
    pub pending_mem_mb: i64,

    pub running_gpu: i64,
    pub pending_gpu: i64,
}

/// One atomic observation of cluster state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sorted ascending by name.
    pub nodes: Vec<Node>,
    pub queue: QueueSummary,
    /// Sorted by pending demand.
    pub users: Vec<UserSummary>,
    pub collected_at: DateTime<Utc>,
}

/// Cluster-wide allocation totals over the node list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub cpu_alloc: i64,
    pub cpu_total: i64,

    pub mem_alloc_mb: i64,
    pub mem_total_mb: i64,

    pub gpu_alloc: i64,
    pub gpu_total: i64,
}

impl Snapshot {
    pub fn totals(&self) -> Aggregate {
        let mut out = Aggregate::default();
        for node in &self.nodes {
            out.cpu_alloc += node.cpu_alloc;
            out.cpu_total += node.cpu_total;
            out.mem_alloc_mb += node.mem_alloc_mb;
            out.mem_total_mb += node.mem_total_mb;
            out.gpu_alloc += node.gpu_alloc;
            out.gpu_total += node.gpu_total;
        }
        out
    }
}
