//! Background polling loop for cluster snapshots.
//!
//! The loop drives a collector on a fixed refresh interval, classifies
//! nothing itself (every collection failure is a transient retry trigger)
//! and publishes [`Update`]s over a bounded channel. Sends block rather
//! than drop so a consumer sees every state transition; the loop owns the
//! sender and closes it (by drop) on exit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use slurm_monitor_slurm::Snapshot;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Bounded update channel capacity. Small on purpose: the consumer drains
/// in microseconds and a blocked send back-pressures collection.
pub const UPDATE_CHANNEL_CAPACITY: usize = 8;

/// Connection health as observed by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    DisconnectedRecovering,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::DisconnectedRecovering => "disconnected-recovering",
        };
        f.write_str(s)
    }
}

/// One message to the consumer: a snapshot or an error, plus loop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub snapshot: Option<Snapshot>,
    pub state: ConnectionState,
    pub last_error: String,
    pub last_success: Option<DateTime<Utc>>,
    pub next_retry: Option<DateTime<Utc>>,
}

/// Anything the loop can poll for a snapshot.
#[async_trait]
pub trait Collect: Send {
    async fn collect(&mut self) -> Result<Snapshot, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait]
impl Collect for slurm_monitor_slurm::Collector {
    async fn collect(&mut self) -> Result<Snapshot, Box<dyn std::error::Error + Send + Sync>> {
        Ok(slurm_monitor_slurm::Collector::collect(self).await?)
    }
}

/// Loop tuning. Defaults match the CLI defaults.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub refresh: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures before `reconnecting` degrades to
    /// `disconnected-recovering`.
    pub failure_threshold: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(2),
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            failure_threshold: 3,
        }
    }
}

/// The polling loop. Owns its collector and the jitter RNG.
pub struct Loop<C> {
    collector: C,
    config: LoopConfig,
    rng: StdRng,
}

impl<C: Collect> Loop<C> {
    pub fn new(collector: C, config: LoopConfig) -> Self {
        Self::with_rng(collector, config, StdRng::from_os_rng())
    }

    /// Inject the jitter RNG; with a fixed seed and a scripted collector
    /// the emitted state sequence is deterministic.
    pub fn with_rng(collector: C, config: LoopConfig, rng: StdRng) -> Self {
        Self {
            collector,
            config,
            rng,
        }
    }

    /// Drive the loop until `shutdown` flips or the consumer goes away.
    /// Dropping `updates` on return is what closes the channel.
    pub async fn run(mut self, updates: mpsc::Sender<Update>, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;
        let mut last_success: Option<DateTime<Utc>> = None;

        loop {
            let collected = tokio::select! {
                _ = cancelled(&mut shutdown) => return,
                result = self.collector.collect() => result,
            };

            match collected {
                Ok(snapshot) => {
                    failures = 0;
                    last_success = Some(snapshot.collected_at);
                    let update = Update {
                        snapshot: Some(snapshot),
                        state: ConnectionState::Connected,
                        last_error: String::new(),
                        last_success,
                        next_retry: None,
                    };
                    if !send_update(&updates, &mut shutdown, update).await {
                        return;
                    }
                    if !wait(self.config.refresh, &mut shutdown).await {
                        return;
                    }
                }
                Err(err) => {
                    failures += 1;
                    let state = if failures >= self.config.failure_threshold {
                        ConnectionState::DisconnectedRecovering
                    } else {
                        ConnectionState::Reconnecting
                    };
                    let delay = self.backoff_delay(failures);
                    tracing::debug!(
                        failures,
                        state = %state,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "collect failed"
                    );
                    let update = Update {
                        snapshot: None,
                        state,
                        last_error: err.to_string(),
                        last_success,
                        next_retry: Some(Utc::now() + delay),
                    };
                    if !send_update(&updates, &mut shutdown, update).await {
                        return;
                    }
                    if !wait(delay, &mut shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    /// Exponential backoff with multiplicative jitter, always inside
    /// `[base, max]`.
    fn backoff_delay(&mut self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let mut delay = self.config.base_backoff;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2);
            if delay >= self.config.max_backoff {
                delay = self.config.max_backoff;
                break;
            }
        }

        let jitter: f64 = self.rng.random_range(0.8..1.2);
        delay
            .mul_f64(jitter)
            .clamp(self.config.base_backoff, self.config.max_backoff)
    }
}

/// Resolve when shutdown is requested (or the shutdown sender vanished,
/// which means the rest of the program is gone).
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Blocking send, abandoned on shutdown. Returns false when the loop
/// should exit.
async fn send_update(
    updates: &mpsc::Sender<Update>,
    shutdown: &mut watch::Receiver<bool>,
    update: Update,
) -> bool {
    tokio::select! {
        _ = cancelled(shutdown) => false,
        sent = updates.send(update) => sent.is_ok(),
    }
}

/// Cancellable sleep. Returns false when shutdown fired first.
async fn wait(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = cancelled(shutdown) => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
