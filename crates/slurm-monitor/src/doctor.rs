//! `doctor`: non-mutating environment checks.
//!
//! Verifies the pieces a monitoring session needs before any polling
//! starts: required tools on PATH, readable ssh files, and one preflight
//! round-trip through the configured transport. Never touches Slurm state.

use crate::app::build_transport;
use crate::preflight::{check_slurm_availability, PreflightError};
use async_trait::async_trait;
use slurm_monitor_cli::{Config, Mode};
use slurm_monitor_transport::{is_retryable, Transport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("doctor checks failed")]
    ChecksFailed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Seams the checks poke at, separated so tests can script them.
#[async_trait]
pub trait DoctorEnv: Sync {
    /// Locate an executable on PATH.
    fn look_path(&self, tool: &str) -> Option<PathBuf>;

    /// Stat a path; `Ok(true)` means it exists and is a directory.
    fn stat_is_dir(&self, path: &Path) -> std::io::Result<bool>;

    fn build_transport(&self, config: &Config) -> Arc<dyn Transport>;

    async fn check_availability(
        &self,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Result<(), PreflightError>;
}

/// The real thing.
pub struct SystemEnv;

#[async_trait]
impl DoctorEnv for SystemEnv {
    fn look_path(&self, tool: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(tool))
            .find(|candidate| is_executable(candidate))
    }

    fn stat_is_dir(&self, path: &Path) -> std::io::Result<bool> {
        Ok(std::fs::metadata(path)?.is_dir())
    }

    fn build_transport(&self, config: &Config) -> Arc<dyn Transport> {
        build_transport(config)
    }

    async fn check_availability(
        &self,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Result<(), PreflightError> {
        check_slurm_availability(transport.as_ref(), timeout).await
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

struct Check {
    name: String,
    outcome: Result<String, String>,
}

pub async fn run<W: Write, E: DoctorEnv>(
    config: &Config,
    out: &mut W,
    env: &E,
) -> Result<(), DoctorError> {
    let target = if config.mode == Mode::Remote {
        config.target.as_str()
    } else {
        "local"
    };

    writeln!(out, "slurm-monitor doctor")?;
    writeln!(out, "mode: {}", config.mode)?;
    writeln!(out, "target: {target}\n")?;

    let checks = build_checks(config, env).await;
    let mut failed = false;
    for check in &checks {
        match &check.outcome {
            Ok(detail) => writeln!(out, "[ok] {}: {}", check.name, detail)?,
            Err(reason) => {
                failed = true;
                writeln!(out, "[fail] {}: {}", check.name, reason)?;
            }
        }
    }

    if failed {
        writeln!(out, "\ndoctor result: FAIL")?;
        return Err(DoctorError::ChecksFailed);
    }
    writeln!(out, "\ndoctor result: PASS")?;
    Ok(())
}

async fn build_checks<E: DoctorEnv>(config: &Config, env: &E) -> Vec<Check> {
    let mut checks = Vec::new();

    let tool_check = |checks: &mut Vec<Check>, scope: &str, tool: &str| {
        let name = format!("{scope} tool {tool}");
        let outcome = match env.look_path(tool) {
            Some(path) => Ok(path.display().to_string()),
            None => Err("not found in PATH".to_string()),
        };
        checks.push(Check { name, outcome });
    };

    let file_check = |checks: &mut Vec<Check>, name: &str, path: Option<&str>| {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };
        let resolved = resolve_home_path(path);
        let outcome = match env.stat_is_dir(Path::new(&resolved)) {
            Err(_) => Err(format!("path is not readable: {resolved}")),
            Ok(true) => Err(format!("expected a file but found a directory: {resolved}")),
            Ok(false) => Ok(resolved),
        };
        checks.push(Check {
            name: name.to_string(),
            outcome,
        });
    };

    match config.mode {
        Mode::Local => {
            for tool in ["bash", "sinfo", "squeue", "scontrol"] {
                tool_check(&mut checks, "local", tool);
            }
        }
        Mode::Remote => {
            tool_check(&mut checks, "local", "ssh");
            file_check(
                &mut checks,
                "ssh config file",
                config.ssh_config.as_ref().map(|p| p.as_str()),
            );
            file_check(
                &mut checks,
                "ssh identity file",
                config.identity_file.as_ref().map(|p| p.as_str()),
            );
        }
    }

    let transport = env.build_transport(config);
    let outcome = match env
        .check_availability(transport.clone(), config.command_timeout)
        .await
    {
        Ok(()) => Ok(format!(
            "required Slurm commands are reachable on {}",
            transport.describe()
        )),
        Err(err) => {
            // Annotate failures the retry classifier recognizes as
            // transient: a second doctor run may simply succeed.
            let transient = err.run_error().map(is_retryable).unwrap_or(false)
                || matches!(err, PreflightError::Timeout { .. });
            if transient {
                Err(format!("{err} (transient; retry may succeed)"))
            } else {
                Err(err.to_string())
            }
        }
    };
    checks.push(Check {
        name: "slurm preflight".to_string(),
        outcome,
    });

    checks
}

/// Expand a leading `~/` against `$HOME`.
fn resolve_home_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            if !home.trim().is_empty() {
                return format!("{}/{rest}", home.trim_end_matches('/'));
            }
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use slurm_monitor_cli::Action;
    use slurm_monitor_transport::LocalTransport;

    struct FakeEnv {
        missing_tools: Vec<&'static str>,
        availability: Result<(), &'static str>,
    }

    #[async_trait]
    impl DoctorEnv for FakeEnv {
        fn look_path(&self, tool: &str) -> Option<PathBuf> {
            if self.missing_tools.contains(&tool) {
                None
            } else {
                Some(PathBuf::from(format!("/usr/bin/{tool}")))
            }
        }

        fn stat_is_dir(&self, _path: &Path) -> std::io::Result<bool> {
            Ok(false)
        }

        fn build_transport(&self, _config: &Config) -> Arc<dyn Transport> {
            Arc::new(LocalTransport::new())
        }

        async fn check_availability(
            &self,
            transport: Arc<dyn Transport>,
            _timeout: Duration,
        ) -> Result<(), PreflightError> {
            self.availability.map_err(|msg| PreflightError::Timeout {
                target: format!("{}:{msg}", transport.describe()),
            })
        }
    }

    fn config(mode: Mode, target: &str) -> Config {
        Config {
            action: Action::Doctor,
            mode,
            target: target.to_string(),
            refresh: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(2),
            ssh_config: None,
            identity_file: None,
            port: None,
            no_color: false,
            compact: false,
            once: false,
            duration: None,
        }
    }

    #[tokio::test]
    async fn test_doctor_local_pass() {
        let env = FakeEnv {
            missing_tools: Vec::new(),
            availability: Ok(()),
        };
        let mut out = Vec::new();
        run(&config(Mode::Local, ""), &mut out, &env).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        for needle in [
            "slurm-monitor doctor",
            "[ok] local tool bash",
            "[ok] local tool sinfo",
            "[ok] local tool squeue",
            "[ok] local tool scontrol",
            "[ok] slurm preflight",
            "doctor result: PASS",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }

    #[tokio::test]
    async fn test_doctor_remote_failure() {
        let env = FakeEnv {
            missing_tools: vec!["ssh"],
            availability: Err("remote check failed"),
        };
        let mut out = Vec::new();
        let err = run(&config(Mode::Remote, "cluster_alias"), &mut out, &env)
            .await
            .unwrap_err();
        assert!(matches!(err, DoctorError::ChecksFailed));

        let text = String::from_utf8(out).unwrap();
        for needle in [
            "mode: remote",
            "target: cluster_alias",
            "[fail] local tool ssh",
            "[fail] slurm preflight",
            "doctor result: FAIL",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }

    #[test]
    fn test_resolve_home_path() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(resolve_home_path("~/.ssh/config"), "/home/tester/.ssh/config");
        assert_eq!(resolve_home_path("/abs/path"), "/abs/path");
    }
}
