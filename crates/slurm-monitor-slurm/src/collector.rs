//! Snapshot collection.
//!
//! One collection issues a single combined remote command (node listing,
//! a unique marker line, queue listing) so every poll costs one ssh
//! round-trip, then enriches pending jobs with per-root GPU request facts
//! cached across polls.

use crate::nodes::{parse_node_lines, NodeParseError};
use crate::queue::{parse_queue_lines, root_job_id};
use crate::types::Snapshot;
use chrono::Utc;
use slurm_monitor_transport::{RunError, Transport};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Both listings in one round-trip. `-r` expands job arrays one task per
/// line, keeping queue/user counts and pending demand accurate for large
/// arrays. The marker cannot occur in Slurm output.
pub const COMBINED_COLLECT_COMMAND: &str = r#"scontrol show node -o; echo "__SLURM_MONITOR_SPLIT__"; squeue -h -r -o "%i|%T|%u|%C|%m|%b|%P|%j|%r""#;

const SPLIT_MARKER: &str = "__SLURM_MONITOR_SPLIT__";

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("collect snapshot: {0}")]
    Transport(#[from] RunError),
    #[error("unexpected collector output format: split marker missing")]
    SplitMarkerMissing,
    #[error("parse nodes: {0}")]
    Nodes(#[from] NodeParseError),
}

/// Collects snapshots through a [`Transport`], owning the GPU request
/// cache. One collector per monitoring session.
pub struct Collector {
    transport: Arc<dyn Transport>,
    command_timeout: Duration,
    /// root job id -> "requests a GPU"; entries are added, never removed.
    pending_gpu_by_job_root: HashMap<String, bool>,
}

impl Collector {
    pub fn new(transport: Arc<dyn Transport>, command_timeout: Duration) -> Self {
        Self {
            transport,
            command_timeout,
            pending_gpu_by_job_root: HashMap::new(),
        }
    }

    /// Collect one snapshot: run the combined command, split on the
    /// marker, parse nodes, enrich the GPU cache, parse the queue, stamp
    /// the collection time.
    pub async fn collect(&mut self) -> Result<Snapshot, CollectError> {
        let raw = self.run(COMBINED_COLLECT_COMMAND).await?;
        let (nodes_raw, queue_raw) = split_combined_output(&raw)?;

        let nodes = parse_node_lines(nodes_raw)?;
        self.fill_pending_gpu_request_cache(queue_raw).await;
        let (queue, users) = parse_queue_lines(queue_raw, &self.pending_gpu_by_job_root);

        Ok(Snapshot {
            nodes,
            queue,
            users,
            collected_at: Utc::now(),
        })
    }

    async fn run(&self, command: &str) -> Result<String, RunError> {
        let result = self.transport.run(command, self.command_timeout).await?;
        Ok(result.stdout.trim_end_matches('\n').to_string())
    }

    /// Probe `scontrol show job` for pending roots not yet cached.
    /// Probe failures are swallowed; the cache simply stays unpopulated
    /// for that root and the next poll tries again.
    async fn fill_pending_gpu_request_cache(&mut self, queue_raw: &str) {
        for root in extract_pending_job_roots(queue_raw) {
            if self.pending_gpu_by_job_root.contains_key(&root) {
                continue;
            }
            match self.job_root_requests_gpu(&root).await {
                Ok(has_gpu) => {
                    self.pending_gpu_by_job_root.insert(root, has_gpu);
                }
                Err(err) => {
                    tracing::debug!(root = %root, error = %err, "gpu request probe failed");
                }
            }
        }
    }

    async fn job_root_requests_gpu(&self, root: &str) -> Result<bool, RunError> {
        // All-digits guard: the root is interpolated into a shell command,
        // and queue lines are not trusted input.
        debug_assert!(is_numeric_job_id(root));
        let raw = self.run(&format!("scontrol show job -o {root}")).await?;
        let req_tres = extract_req_tres(&raw);
        Ok(req_tres.to_lowercase().contains("gres/gpu"))
    }
}

/// Distinct root job ids of pending queue lines, numeric roots only.
fn extract_pending_job_roots(queue_raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in queue_raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(9, '|').collect();
        if fields.len() < 9 {
            continue;
        }
        if !fields[1].trim().to_uppercase().contains("PENDING") {
            continue;
        }
        let root = root_job_id(fields[0]);
        if !is_numeric_job_id(root) {
            continue;
        }
        if seen.insert(root.to_string()) {
            out.push(root.to_string());
        }
    }
    out
}

/// Pull the `ReqTRES=` token out of `scontrol show job -o` output.
fn extract_req_tres(raw: &str) -> &str {
    let Some(idx) = raw.find("ReqTRES=") else {
        return "";
    };
    let tail = &raw[idx + "ReqTRES=".len()..];
    tail.split_whitespace().next().unwrap_or("")
}

fn is_numeric_job_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

fn split_combined_output(raw: &str) -> Result<(&str, &str), CollectError> {
    let Some((nodes, queue)) = raw.split_once(SPLIT_MARKER) else {
        return Err(CollectError::SplitMarkerMissing);
    };
    Ok((nodes.trim(), queue.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use slurm_monitor_transport::RunResult;
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<String, i32>>>,
        commands: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<String, i32>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn run(&self, command: &str, _timeout: Duration) -> Result<RunResult, RunError> {
            self.commands.lock().unwrap().push(command.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(RunResult::default());
            }
            match responses.remove(0) {
                Ok(stdout) => Ok(RunResult {
                    stdout,
                    ..RunResult::default()
                }),
                Err(exit_code) => Err(RunError {
                    command: command.to_string(),
                    target: self.describe(),
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code,
                    timeout: false,
                    source: None,
                }),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn test_combined_command_expands_array_tasks() {
        assert!(COMBINED_COLLECT_COMMAND.contains("squeue -h -r "));
        assert!(COMBINED_COLLECT_COMMAND.contains(r#"echo "__SLURM_MONITOR_SPLIT__""#));
    }

    #[test]
    fn test_split_combined_output() {
        let raw = "node-a\n__SLURM_MONITOR_SPLIT__\n1001|PENDING|alice|1|4G|N/A|gpu|job|Priority";
        let (nodes, queue) = split_combined_output(raw).unwrap();
        assert_eq!(nodes, "node-a");
        assert_eq!(queue, "1001|PENDING|alice|1|4G|N/A|gpu|job|Priority");
    }

    #[test]
    fn test_split_combined_output_missing_marker() {
        assert!(matches!(
            split_combined_output("just nodes"),
            Err(CollectError::SplitMarkerMissing)
        ));
    }

    #[test]
    fn test_extract_pending_job_roots() {
        let raw = "\
37820_1|PENDING|alice|4|64G|N/A|train|job|Priority
37820_2|PENDING|alice|4|64G|N/A|train|job|Priority
1001|RUNNING|bob|4|64G|N/A|train|job|None
bogus_id|PENDING|eve|1|1G|N/A|train|job|Priority
";
        let roots = extract_pending_job_roots(raw);
        assert_eq!(roots, vec!["37820".to_string()]);
    }

    #[test]
    fn test_extract_req_tres() {
        let raw = "JobId=37820 JobName=train ReqTRES=cpu=4,mem=64G,gres/gpu=2 AllocTRES=(null)";
        assert_eq!(extract_req_tres(raw), "cpu=4,mem=64G,gres/gpu=2");
        assert_eq!(extract_req_tres("JobId=1"), "");
    }

    #[test]
    fn test_is_numeric_job_id() {
        assert!(is_numeric_job_id("37820"));
        assert!(!is_numeric_job_id(""));
        assert!(!is_numeric_job_id("37820; rm -rf /"));
        assert!(!is_numeric_job_id("a37820"));
    }

    #[tokio::test]
    async fn test_collect_parses_both_halves() {
        let combined = "\
NodeName=node-a State=IDLE CPUTot=8 CPUAlloc=0
__SLURM_MONITOR_SPLIT__
1001|RUNNING|alice|8|20G|gres/gpu:1|train|jobA|None
1002|PENDING|alice|4|10G|N/A|train|jobB|Priority
";
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(combined.to_string()),
            // GPU probe for root 1002.
            Ok("JobId=1002 ReqTRES=cpu=4,mem=10G,gres/gpu=1".to_string()),
        ]));
        let mut collector = Collector::new(transport.clone(), Duration::from_secs(5));

        let snapshot = collector.collect().await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.queue.running, 1);
        assert_eq!(snapshot.queue.pending, 1);
        // Cache fallback flipped the N/A-request job to a GPU job.
        assert_eq!(snapshot.users[0].pending_gpu_jobs, 1);

        let commands = transport.commands.lock().unwrap();
        assert_eq!(commands[0], COMBINED_COLLECT_COMMAND);
        assert_eq!(commands[1], "scontrol show job -o 1002");
    }

    #[tokio::test]
    async fn test_collect_probe_failures_are_swallowed() {
        let combined = "\
NodeName=node-a State=IDLE
__SLURM_MONITOR_SPLIT__
1002|PENDING|alice|4|10G|N/A|train|jobB|Priority
";
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(combined.to_string()),
            Err(1),
        ]));
        let mut collector = Collector::new(transport, Duration::from_secs(5));

        let snapshot = collector.collect().await.unwrap();
        assert_eq!(snapshot.queue.pending, 1);
        assert_eq!(snapshot.users[0].pending_cpu_jobs, 1);
        assert!(collector.pending_gpu_by_job_root.is_empty());
    }

    #[tokio::test]
    async fn test_collect_caches_probe_across_polls() {
        let combined = "\
NodeName=node-a State=IDLE
__SLURM_MONITOR_SPLIT__
1002|PENDING|alice|4|10G|N/A|train|jobB|Priority
";
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(combined.to_string()),
            Ok("ReqTRES=cpu=4,gres/gpu=1".to_string()),
            Ok(combined.to_string()),
            // No response scripted for a second probe: the cache must
            // answer without another scontrol call.
        ]));
        let mut collector = Collector::new(transport.clone(), Duration::from_secs(5));

        collector.collect().await.unwrap();
        collector.collect().await.unwrap();
        assert_eq!(transport.commands.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_missing_marker_is_parse_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok("no marker".to_string())]));
        let mut collector = Collector::new(transport, Duration::from_secs(5));
        assert!(matches!(
            collector.collect().await,
            Err(CollectError::SplitMarkerMissing)
        ));
    }
}
