//! Slurm integration: typed snapshots of nodes, queue, and users.
//!
//! Parse `scontrol`/`squeue` output and collect consistent snapshots
//! through a transport.

pub mod collector;
pub mod nodes;
pub mod queue;
pub mod types;
pub mod user_sort;

pub use collector::{CollectError, Collector, COMBINED_COLLECT_COMMAND};
pub use nodes::{parse_node_lines, NodeParseError};
pub use queue::{parse_queue_lines, root_job_id};
pub use types::{
    Aggregate, NameCount, Node, PartitionCount, QueueSummary, ResourceTotals, Snapshot,
    StateCount, UserSummary,
};
pub use user_sort::sort_users_by_pending_demand;
