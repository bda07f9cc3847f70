//! CLI argument parsing for slurm-monitor.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::time::Duration;
use thiserror::Error;

const LONG_ABOUT: &str = "\
Resilient, read-only Slurm queue/node monitor.

The positional TARGET is optional:
  - omitted: run locally (requires local sinfo/squeue/scontrol)
  - provided: run remotely through OpenSSH using an alias or user@host

Monitoring never mutates Slurm state. Transient SSH/network failures retry
automatically with backoff; missing Slurm commands are treated as
non-recoverable. Retries are infinite by default; set --duration to
time-box a run. Authentication uses standard OpenSSH flows (ssh-agent,
keys, config aliases, bastion/proxy jumps); there are no password flags.
Remote hosts need a bash-compatible login shell.";

const EXAMPLES: &str = "\
Examples:
  slurm-monitor
  slurm-monitor cluster_alias
  slurm-monitor user@cluster.example.org --refresh 1
  slurm-monitor --once cluster_alias
  slurm-monitor --duration 1800 cluster_alias
  slurm-monitor doctor cluster_alias
  slurm-monitor dry-run --once cluster_alias";

#[derive(Parser, Debug)]
#[command(name = "slurm-monitor")]
#[command(version, about = "Resilient, read-only Slurm queue/node monitor")]
#[command(long_about = LONG_ABOUT, after_help = EXAMPLES)]
pub struct Cli {
    /// SSH target (config alias or user@host); omit to monitor locally
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    #[command(flatten)]
    pub options: Options,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(clap::Args, Debug)]
pub struct Options {
    /// Poll interval in seconds for collecting new Slurm snapshots
    #[arg(long, global = true, value_name = "SECS", default_value_t = 2)]
    pub refresh: u64,

    /// Max SSH connection setup time in seconds per command (remote mode)
    #[arg(long, global = true, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Max runtime in seconds for each Slurm command before retry
    #[arg(long, global = true, value_name = "SECS", default_value_t = 15)]
    pub command_timeout: u64,

    /// Alternate OpenSSH config path (remote mode, supports aliases/ProxyJump)
    #[arg(long, global = true, value_name = "PATH")]
    pub ssh_config: Option<Utf8PathBuf>,

    /// Explicit SSH private key path passed to ssh -i (remote mode)
    #[arg(long, global = true, value_name = "PATH")]
    pub identity_file: Option<Utf8PathBuf>,

    /// Override SSH port for the remote target (remote mode)
    #[arg(long, global = true, value_name = "PORT")]
    pub port: Option<u16>,

    /// Disable ANSI color styling
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Force compact TUI layout for smaller terminals
    #[arg(long, global = true)]
    pub compact: bool,

    /// Collect one snapshot, print a summary, and exit
    #[arg(long, global = true)]
    pub once: bool,

    /// Total runtime limit in seconds; 0 means run until interrupted
    #[arg(long, global = true, value_name = "SECS", default_value_t = 0)]
    pub duration: u64,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run non-mutating preflight checks and exit
    Doctor {
        /// SSH target (config alias or user@host); omit to check locally
        #[arg(value_name = "TARGET")]
        target: Option<String>,
    },
    /// Print the planned execution order and exit
    DryRun {
        /// SSH target (config alias or user@host); omit for local mode
        #[arg(value_name = "TARGET")]
        target: Option<String>,
    },
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where commands run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Remote,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// What the invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Monitor,
    Doctor,
    DryRun,
}

/// Validated configuration, ready for the application layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub action: Action,
    pub mode: Mode,
    pub target: String,
    pub refresh: Duration,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub ssh_config: Option<Utf8PathBuf>,
    pub identity_file: Option<Utf8PathBuf>,
    pub port: Option<u16>,
    pub no_color: bool,
    pub compact: bool,
    pub once: bool,
    /// None means run until interrupted.
    pub duration: Option<Duration>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--{flag} must be > 0")]
    NonPositiveDuration { flag: &'static str },
    #[error("ssh-specific flags require a remote target")]
    SshFlagsRequireRemote,
}

impl Cli {
    /// Resolve the parsed arguments into a validated [`Config`].
    ///
    /// Returns `None` for `completions`, which is handled before any
    /// configuration exists.
    pub fn into_config(self) -> Result<Option<Config>, ConfigError> {
        let (action, target) = match self.command {
            None => (Action::Monitor, self.target),
            Some(CliCommand::Doctor { target }) => (Action::Doctor, target.or(self.target)),
            Some(CliCommand::DryRun { target }) => (Action::DryRun, target.or(self.target)),
            Some(CliCommand::Completions { .. }) => return Ok(None),
        };

        let opts = self.options;
        for (flag, value) in [
            ("refresh", opts.refresh),
            ("connect-timeout", opts.connect_timeout),
            ("command-timeout", opts.command_timeout),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositiveDuration { flag });
            }
        }

        let target = target.map(|t| t.trim().to_string()).unwrap_or_default();
        let mode = if target.is_empty() {
            Mode::Local
        } else {
            Mode::Remote
        };

        if mode == Mode::Local
            && (opts.ssh_config.is_some() || opts.identity_file.is_some() || opts.port.is_some())
        {
            return Err(ConfigError::SshFlagsRequireRemote);
        }

        Ok(Some(Config {
            action,
            mode,
            target,
            refresh: Duration::from_secs(opts.refresh),
            connect_timeout: Duration::from_secs(opts.connect_timeout),
            command_timeout: Duration::from_secs(opts.command_timeout),
            ssh_config: opts.ssh_config,
            identity_file: opts.identity_file,
            port: opts.port,
            no_color: opts.no_color,
            compact: opts.compact,
            once: opts.once,
            duration: (opts.duration > 0).then(|| Duration::from_secs(opts.duration)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("slurm-monitor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_local_monitor() {
        let config = parse(&[]).into_config().unwrap().unwrap();
        assert_eq!(config.action, Action::Monitor);
        assert_eq!(config.mode, Mode::Local);
        assert_eq!(config.refresh, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(15));
        assert_eq!(config.duration, None);
        assert!(!config.once);
    }

    #[test]
    fn test_positional_target_selects_remote() {
        let config = parse(&["user@cluster"]).into_config().unwrap().unwrap();
        assert_eq!(config.mode, Mode::Remote);
        assert_eq!(config.target, "user@cluster");
    }

    #[test]
    fn test_doctor_subcommand_with_target() {
        let config = parse(&["doctor", "cluster_alias"])
            .into_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.action, Action::Doctor);
        assert_eq!(config.mode, Mode::Remote);
        assert_eq!(config.target, "cluster_alias");
    }

    #[test]
    fn test_dry_run_flags_after_subcommand() {
        let config = parse(&["dry-run", "--once", "cluster_alias"])
            .into_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.action, Action::DryRun);
        assert!(config.once);
        assert_eq!(config.target, "cluster_alias");
    }

    #[test]
    fn test_zero_refresh_rejected() {
        let err = parse(&["--refresh", "0"]).into_config().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveDuration { flag: "refresh" });
    }

    #[test]
    fn test_ssh_flags_require_remote_target() {
        let err = parse(&["--port", "2222"]).into_config().unwrap_err();
        assert_eq!(err, ConfigError::SshFlagsRequireRemote);

        let config = parse(&["--port", "2222", "cluster"])
            .into_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.port, Some(2222));
    }

    #[test]
    fn test_duration_zero_means_unbounded() {
        let config = parse(&["--duration", "0"]).into_config().unwrap().unwrap();
        assert_eq!(config.duration, None);

        let config = parse(&["--duration", "1800", "cluster"])
            .into_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.duration, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_completions_has_no_config() {
        assert!(parse(&["completions", "bash"]).into_config().unwrap().is_none());
    }
}
