//! Parse `squeue` output into queue and per-user summaries.
//!
//! Input format is `squeue -h -r -o "%i|%T|%u|%C|%m|%b|%P|%j|%r"`: one
//! job (or expanded array task) per line, nine pipe-separated fields.
//! Lines with fewer fields are skipped silently.

use crate::types::{NameCount, PartitionCount, QueueSummary, StateCount, UserSummary};
use crate::user_sort::sort_users_by_pending_demand;
use once_cell::sync::Lazy;
use regex::Regex;
use slurm_monitor_parsers::{
    leading_int, non_empty_or, parse_mem_request_mb, split_queue_fields,
};
use std::collections::HashMap;

static GPU_REQ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"gpu(?::[a-zA-Z0-9_-]+)?:([0-9]+)").unwrap());

/// One queue line, normalized. Lives only inside the parser.
#[derive(Debug)]
struct JobRecord<'a> {
    job_id: &'a str,
    state: String,
    user: &'a str,
    cpu_req: i64,
    mem_req_mb: i64,
    gpu_req: i64,
    partition: &'a str,
    job_name: &'a str,
    pending_reason: &'a str,
}

fn parse_job_line(line: &str) -> Option<JobRecord<'_>> {
    let fields = split_queue_fields(line, 9)?;
    Some(JobRecord {
        job_id: fields[0].trim(),
        state: fields[1].trim().to_uppercase(),
        user: non_empty_or(fields[2], "<unknown>"),
        cpu_req: leading_int(fields[3]),
        mem_req_mb: parse_mem_request_mb(fields[4]),
        gpu_req: parse_gpu_req(fields[5]),
        partition: non_empty_or(fields[6], "<unknown>"),
        job_name: job_name_or_unnamed(fields[7]),
        pending_reason: fields[8].trim(),
    })
}

fn job_name_or_unnamed(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "N/A" {
        "<unnamed>"
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateClass {
    Running,
    Pending,
    Other,
}

/// Uppercase substring classification. `COMPLETING` and `CONFIGURING`
/// still occupy resources, so they count as running.
fn classify_queue_state(state: &str) -> StateClass {
    if state.contains("PENDING") {
        StateClass::Pending
    } else if state.contains("RUNNING")
        || state.contains("COMPLETING")
        || state.contains("CONFIGURING")
    {
        StateClass::Running
    } else {
        StateClass::Other
    }
}

/// Sum every GPU count in a `%b` GRES request (`gres/gpu:a100:4`).
pub(crate) fn parse_gpu_req(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == "N/A" {
        return 0;
    }
    GPU_REQ_RE
        .captures_iter(raw)
        .map(|caps| leading_int(&caps[1]))
        .sum()
}

/// Strip array-task (`_N`) and step (`.S`) suffixes from a job id.
pub fn root_job_id(job_id: &str) -> &str {
    let mut id = job_id.trim();
    if let Some(idx) = id.find('_') {
        if idx > 0 {
            id = &id[..idx];
        }
    }
    if let Some(idx) = id.find('.') {
        if idx > 0 {
            id = &id[..idx];
        }
    }
    id
}

/// Aggregate the queue listing into summaries.
///
/// `pending_gpu_by_job_root` is the collector's GPU request cache: a
/// pending job with no parsable `%b` request is still classified as a GPU
/// job when its root job id maps to true.
pub fn parse_queue_lines(
    raw: &str,
    pending_gpu_by_job_root: &HashMap<String, bool>,
) -> (QueueSummary, Vec<UserSummary>) {
    let mut queue = QueueSummary::default();
    let mut users: HashMap<&str, UserSummary> = HashMap::new();
    let mut partitions: HashMap<&str, PartitionCount> = HashMap::new();
    let mut states: HashMap<String, u32> = HashMap::new();
    let mut job_names: HashMap<&str, u32> = HashMap::new();
    let mut pending_reasons: HashMap<&str, u32> = HashMap::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(job) = parse_job_line(line) else {
            continue;
        };

        let user = users.entry(job.user).or_insert_with(|| UserSummary {
            user: job.user.to_string(),
            ..UserSummary::default()
        });
        let partition = partitions
            .entry(job.partition)
            .or_insert_with(|| PartitionCount {
                partition: job.partition.to_string(),
                ..PartitionCount::default()
            });

        *states.entry(job.state.clone()).or_default() += 1;
        *job_names.entry(job.job_name).or_default() += 1;

        match classify_queue_state(&job.state) {
            StateClass::Running => {
                queue.running += 1;
                user.running += 1;
                partition.running += 1;
                queue.resource_load.running_cpu += job.cpu_req;
                queue.resource_load.running_mem_mb += job.mem_req_mb;
                queue.resource_load.running_gpu += job.gpu_req;
            }
            StateClass::Pending => {
                queue.pending += 1;
                user.pending += 1;
                let is_gpu_job = job.gpu_req > 0
                    || pending_gpu_by_job_root
                        .get(root_job_id(job.job_id))
                        .copied()
                        .unwrap_or(false);
                if is_gpu_job {
                    user.pending_gpu_jobs += 1;
                } else {
                    user.pending_cpu_jobs += 1;
                }
                user.pending_cpu += job.cpu_req;
                user.pending_mem_mb += job.mem_req_mb;
                user.pending_gpu += job.gpu_req;
                partition.pending += 1;
                queue.resource_load.pending_cpu += job.cpu_req;
                queue.resource_load.pending_mem_mb += job.mem_req_mb;
                queue.resource_load.pending_gpu += job.gpu_req;
                let reason = non_empty_or(job.pending_reason, "<unknown>");
                *pending_reasons.entry(reason).or_default() += 1;
            }
            StateClass::Other => {
                queue.other += 1;
                partition.other += 1;
            }
        }
    }

    let mut out_users: Vec<UserSummary> = users.into_values().collect();
    sort_users_by_pending_demand(&mut out_users);

    queue.by_state = state_counts(states);
    queue.by_partition = partition_counts(partitions);
    queue.by_job_name = name_counts(job_names);
    queue.pending_cause = name_counts(pending_reasons);

    (queue, out_users)
}

/// Count desc, then state asc.
fn state_counts(map: HashMap<String, u32>) -> Vec<StateCount> {
    let mut out: Vec<StateCount> = map
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
    out
}

/// Total jobs desc, then partition asc.
fn partition_counts(map: HashMap<&str, PartitionCount>) -> Vec<PartitionCount> {
    let mut out: Vec<PartitionCount> = map.into_values().collect();
    out.sort_by(|a, b| {
        let a_total = a.running + a.pending + a.other;
        let b_total = b.running + b.pending + b.other;
        b_total
            .cmp(&a_total)
            .then_with(|| a.partition.cmp(&b.partition))
    });
    out
}

/// Count desc, then name asc.
fn name_counts(map: HashMap<&str, u32>) -> Vec<NameCount> {
    let mut out: Vec<NameCount> = map
        .into_iter()
        .map(|(name, count)| NameCount {
            name: name.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}
