//! Retry classification for transport failures.

use crate::RunError;
use std::io::ErrorKind;

/// Stderr fragments that indicate a transient network-level failure.
/// These come from the remote peer or the ssh client itself, never from
/// error messages this crate produces.
const RETRY_SIGNALS: &[&str] = &[
    "connection reset",
    "broken pipe",
    "connection timed out",
    "operation timed out",
    "timed out",
    "network is unreachable",
    "temporary failure",
    "connection closed",
    "no route to host",
    "connection refused",
];

/// Decide whether `err` warrants another attempt.
///
/// The decision keys on typed fields: the timeout flag, ssh's generic
/// exit code 255, an EOF/timeout io cause, and the fixed stderr signal
/// allowlist. Any other non-zero exit (notably exit 7 from the preflight
/// script) is not retryable.
pub fn is_retryable(err: &RunError) -> bool {
    if err.timeout {
        return true;
    }
    if err.exit_code == 255 {
        return true;
    }
    if let Some(source) = &err.source {
        if matches!(source.kind(), ErrorKind::UnexpectedEof | ErrorKind::TimedOut) {
            return true;
        }
    }

    let stderr = err.stderr.to_lowercase();
    RETRY_SIGNALS.iter().any(|signal| stderr.contains(signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_error(exit_code: i32, timeout: bool, stderr: &str) -> RunError {
        RunError {
            command: "squeue".to_string(),
            target: "ssh:cluster".to_string(),
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            timeout,
            source: None,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(is_retryable(&run_error(0, true, "")));
    }

    #[test]
    fn test_ssh_exit_255_is_retryable() {
        assert!(is_retryable(&run_error(255, false, "")));
    }

    #[test]
    fn test_stderr_signals_are_retryable_case_insensitive() {
        assert!(is_retryable(&run_error(1, false, "Connection reset by peer")));
        assert!(is_retryable(&run_error(1, false, "ssh: No route to host")));
        assert!(is_retryable(&run_error(1, false, "read: CONNECTION TIMED OUT")));
    }

    #[test]
    fn test_preflight_exit_7_is_not_retryable() {
        assert!(!is_retryable(&run_error(7, false, "")));
    }

    #[test]
    fn test_plain_failure_is_not_retryable() {
        assert!(!is_retryable(&run_error(1, false, "bash: squeue: command not found")));
    }

    #[test]
    fn test_eof_cause_is_retryable() {
        let mut err = run_error(0, false, "");
        err.source = Some(std::io::Error::new(ErrorKind::UnexpectedEof, "eof"));
        assert!(is_retryable(&err));
    }
}
