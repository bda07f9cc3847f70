//! Blocking availability gate: wait until the required Slurm binaries are
//! reachable on the target before any monitoring starts.
//!
//! Two failure classes matter here and must never be confused: a target
//! without Slurm binaries (a typo or the wrong host; give up immediately)
//! and a network hiccup (retry with bounded backoff). The distinction is
//! carried as a typed variant, never reconstructed from message text.

use slurm_monitor_transport::{RunError, Transport};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// One-line check, no persisted state: list the required commands that are
/// absent from PATH and exit 7 when any are.
pub const CHECK_COMMAND: &str = r#"missing=""; for c in sinfo squeue scontrol; do if ! command -v "$c" >/dev/null 2>&1; then missing="$missing $c"; fi; done; if [ -n "$missing" ]; then echo "$missing"; exit 7; fi"#;

#[derive(Debug, Error)]
pub enum PreflightError {
    /// Unrecoverable: the target has no Slurm.
    #[error("missing required Slurm commands on {target}: {}", .missing.join(" "))]
    MissingCommands { target: String, missing: Vec<String> },
    #[error("Slurm capability check timed out on {target}; consider increasing --command-timeout")]
    Timeout { target: String },
    #[error("failed Slurm capability check on {target}: {cause}")]
    Check { target: String, cause: RunError },
    #[error("cancelled while waiting for Slurm availability")]
    Cancelled,
}

impl PreflightError {
    /// The transport failure behind this error, when there is one.
    pub fn run_error(&self) -> Option<&RunError> {
        match self {
            Self::Check { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Run the check once.
pub async fn check_slurm_availability(
    transport: &dyn Transport,
    timeout: Duration,
) -> Result<(), PreflightError> {
    let err = match transport.run(CHECK_COMMAND, timeout).await {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };

    // A failing check that still produced stdout names the missing
    // binaries; that is the script's exit-7 path.
    let missing = err.stdout.trim();
    if !missing.is_empty() {
        return Err(PreflightError::MissingCommands {
            target: transport.describe(),
            missing: missing.split_whitespace().map(String::from).collect(),
        });
    }
    if err.timeout {
        return Err(PreflightError::Timeout {
            target: transport.describe(),
        });
    }
    Err(PreflightError::Check {
        target: transport.describe(),
        cause: err,
    })
}

/// Block until the check passes, retrying transient failures with a
/// doubling delay capped at 30 s.
pub async fn await_slurm_availability(
    transport: &dyn Transport,
    timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), PreflightError> {
    await_with_backoff(
        transport,
        timeout,
        Duration::from_secs(1),
        Duration::from_secs(30),
        shutdown,
    )
    .await
}

pub async fn await_with_backoff(
    transport: &dyn Transport,
    timeout: Duration,
    base_delay: Duration,
    max_delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), PreflightError> {
    let base_delay = if base_delay.is_zero() {
        Duration::from_secs(1)
    } else {
        base_delay
    };
    let max_delay = max_delay.max(base_delay);

    let mut delay = base_delay;
    loop {
        let result = tokio::select! {
            _ = cancelled(shutdown) => return Err(PreflightError::Cancelled),
            result = check_slurm_availability(transport, timeout) => result,
        };
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err @ PreflightError::MissingCommands { .. }) => return Err(err),
            Err(err) => err,
        };
        if *shutdown.borrow() {
            return Err(PreflightError::Cancelled);
        }

        tracing::warn!(
            peer = %transport.describe(),
            error = %err,
            retry_in = ?delay,
            "transient preflight failure; retrying (Ctrl+C to stop)"
        );

        tokio::select! {
            _ = cancelled(shutdown) => return Err(PreflightError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(max_delay);
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use slurm_monitor_transport::RunResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<RunResult, (String, i32)>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<RunResult, (String, i32)>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn run(&self, command: &str, _timeout: Duration) -> Result<RunResult, RunError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            let responses = self.responses.lock().unwrap();
            let response = responses
                .get(idx.min(responses.len().saturating_sub(1)))
                .cloned()
                .unwrap_or(Ok(RunResult::default()));
            response.map_err(|(stdout, exit_code)| RunError {
                command: command.to_string(),
                target: self.describe(),
                stdout,
                stderr: String::new(),
                exit_code,
                timeout: false,
                source: None,
            })
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn test_check_passes() {
        let transport = ScriptedTransport::new(vec![Ok(RunResult::default())]);
        check_slurm_availability(&transport, Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_reports_missing_commands() {
        let transport =
            ScriptedTransport::new(vec![Err((" sinfo scontrol".to_string(), 7))]);
        let err = check_slurm_availability(&transport, Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            PreflightError::MissingCommands { target, missing } => {
                assert_eq!(target, "scripted");
                assert_eq!(missing, vec!["sinfo".to_string(), "scontrol".to_string()]);
            }
            other => panic!("expected MissingCommands, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_await_retries_then_passes() {
        let transport = ScriptedTransport::new(vec![
            Err((String::new(), 255)),
            Err((String::new(), 255)),
            Ok(RunResult::default()),
        ]);
        let (_tx, mut shutdown) = no_shutdown();

        await_with_backoff(
            &transport,
            Duration::from_millis(50),
            Duration::from_millis(5),
            Duration::from_millis(10),
            &mut shutdown,
        )
        .await
        .unwrap();
        assert!(transport.calls() >= 3);
    }

    #[tokio::test]
    async fn test_await_short_circuits_on_missing_commands() {
        let transport = ScriptedTransport::new(vec![
            Err((" sinfo scontrol".to_string(), 7)),
            Ok(RunResult::default()),
        ]);
        let (_tx, mut shutdown) = no_shutdown();

        let err = await_with_backoff(
            &transport,
            Duration::from_millis(50),
            Duration::from_millis(5),
            Duration::from_millis(10),
            &mut shutdown,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PreflightError::MissingCommands { .. }));
        assert_eq!(transport.calls(), 1, "missing commands must not retry");
    }

    #[tokio::test]
    async fn test_await_honors_cancellation() {
        let transport = ScriptedTransport::new(vec![Err((String::new(), 255))]);
        let (tx, mut shutdown) = no_shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = tx.send(true);
        });

        let err = await_with_backoff(
            &transport,
            Duration::from_millis(50),
            Duration::from_millis(10),
            Duration::from_millis(20),
            &mut shutdown,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PreflightError::Cancelled));
        assert!(transport.calls() >= 1);
    }
}
