//! Deterministic ranking of users by pending demand.

use crate::types::UserSummary;
use std::cmp::Ordering;

/// Order users by pending-demand impact first, then by stable identity so
/// rendering never flickers between equally-loaded users.
///
/// Comparator: pending desc, pending GPU jobs desc, pending CPU jobs desc,
/// pending memory desc, running desc, user name asc.
pub fn sort_users_by_pending_demand(users: &mut [UserSummary]) {
    users.sort_by(compare_users);
}

fn compare_users(a: &UserSummary, b: &UserSummary) -> Ordering {
    b.pending
        .cmp(&a.pending)
        .then_with(|| b.pending_gpu_jobs.cmp(&a.pending_gpu_jobs))
        .then_with(|| b.pending_cpu_jobs.cmp(&a.pending_cpu_jobs))
        .then_with(|| b.pending_mem_mb.cmp(&a.pending_mem_mb))
        .then_with(|| b.running.cmp(&a.running))
        .then_with(|| a.user.cmp(&b.user))
}
