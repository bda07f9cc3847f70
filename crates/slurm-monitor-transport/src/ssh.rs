//! OpenSSH transport with connection multiplexing.

use crate::{run_child, RunError, RunResult, Transport};
use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Connection parameters for [`SshTransport`].
#[derive(Debug, Clone, Default)]
pub struct SshOptions {
    /// Host alias or `user@host`.
    pub target: String,
    /// Alternate OpenSSH config passed as `-F`.
    pub config_path: Option<String>,
    /// Private key passed as `-i`.
    pub identity_file: Option<String>,
    /// Port override passed as `-p`.
    pub port: Option<u16>,
    /// Connection setup budget, mapped to `ConnectTimeout`.
    pub connect_timeout: Duration,
}

/// Shells out to the `ssh` binary, reusing one multiplexed connection per
/// target through a ControlMaster socket.
///
/// The control path is derived from the full connection tuple so that
/// repeated invocations with identical parameters land on the same socket.
/// That determinism is what makes reuse work; it is not an optimization.
#[derive(Debug)]
pub struct SshTransport {
    opts: SshOptions,
    control_path: Option<PathBuf>,
}

impl SshTransport {
    pub fn new(opts: SshOptions) -> Self {
        let control_path = build_control_path(&opts);
        Self { opts, control_path }
    }

    /// Assemble the full ssh argv for `command`, resilience flags included.
    pub fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(24);

        if self.opts.connect_timeout > Duration::ZERO {
            let seconds = (self.opts.connect_timeout.as_secs_f64().ceil() as u64).max(1);
            args.push("-o".into());
            args.push(format!("ConnectTimeout={seconds}"));
        }
        for opt in [
            "ConnectionAttempts=2",
            "ServerAliveInterval=15",
            "ServerAliveCountMax=3",
            "TCPKeepAlive=yes",
            "ControlMaster=auto",
            "ControlPersist=300",
            "StreamLocalBindUnlink=yes",
        ] {
            args.push("-o".into());
            args.push(opt.into());
        }
        if let Some(path) = &self.control_path {
            args.push("-o".into());
            args.push(format!("ControlPath={}", path.display()));
        }

        if let Some(config) = &self.opts.config_path {
            args.push("-F".into());
            args.push(config.clone());
        }
        if let Some(identity) = &self.opts.identity_file {
            args.push("-i".into());
            args.push(identity.clone());
        }
        if let Some(port) = self.opts.port {
            args.push("-p".into());
            args.push(port.to_string());
        }

        args.push(self.opts.target.clone());
        args.push(format!("bash -lc {}", shell_quote(command)));
        args
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(&self, command: &str, timeout: Duration) -> Result<RunResult, RunError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));
        run_child(cmd, command, &self.describe(), timeout).await
    }

    fn describe(&self) -> String {
        format!("ssh:{}", self.opts.target)
    }
}

/// Quote `s` for a POSIX shell: wrap in single quotes, escaping embedded
/// single quotes with the `'"'"'` sequence.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Derive the deterministic ControlMaster socket path for `opts`.
///
/// The id hashes the full connection tuple, not just the target: two
/// invocations differing only in identity file must not share a socket.
/// Returns `None` when the socket directory cannot be created; ssh then
/// runs without multiplexing.
fn build_control_path(opts: &SshOptions) -> Option<PathBuf> {
    let tuple = format!(
        "{}|{}|{}|{}",
        opts.target,
        opts.config_path.as_deref().unwrap_or(""),
        opts.identity_file.as_deref().unwrap_or(""),
        opts.port.unwrap_or(0),
    );
    let digest = Sha1::digest(tuple.as_bytes());
    let id: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();

    let root = std::env::temp_dir().join("slurm-monitor-ssh");
    if let Err(err) = create_private_dir(&root) {
        tracing::warn!(dir = %root.display(), error = %err, "control socket dir unavailable");
        return None;
    }
    Some(root.join(format!("cm-{id}")))
}

#[cfg(unix)]
fn create_private_dir(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true).mode(0o700);
    builder.create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(
            shell_quote("echo 'hello world'"),
            r#"'echo '"'"'hello world'"'"''"#
        );
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("plain"), "'plain'");
    }

    #[tokio::test]
    async fn test_shell_quote_round_trips_through_a_real_shell() {
        use crate::{LocalTransport, Transport};
        let transport = LocalTransport::new();
        for case in [
            "echo 'hello world'",
            r#"a'b"c$d `backticks`"#,
            "tabs\tand  spaces",
            "",
        ] {
            let command = format!("printf %s {}", shell_quote(case));
            let result = transport
                .run(&command, Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(result.stdout, case, "quoting {case:?}");
        }
    }

    #[test]
    fn test_control_path_is_deterministic() {
        let opts = SshOptions {
            target: "host-a".into(),
            config_path: Some("/tmp/cfg".into()),
            identity_file: Some("/tmp/key".into()),
            port: Some(22),
            connect_timeout: Duration::from_secs(10),
        };
        let first = build_control_path(&opts).expect("control path");
        let second = build_control_path(&opts).expect("control path");
        assert_eq!(first, second);

        let other = build_control_path(&SshOptions {
            identity_file: Some("/tmp/other-key".into()),
            ..opts
        })
        .expect("control path");
        assert_ne!(first, other);
    }

    #[test]
    fn test_build_ssh_args_includes_resilience_options() {
        let transport = SshTransport::new(SshOptions {
            target: "user@host".into(),
            config_path: Some("/tmp/ssh_config".into()),
            identity_file: Some("/tmp/id".into()),
            port: Some(2222),
            connect_timeout: Duration::from_millis(1500),
        });
        let args = transport.build_ssh_args("echo hello");
        let joined = args.join(" ");

        for token in [
            "ConnectTimeout=2",
            "ConnectionAttempts=2",
            "ServerAliveInterval=15",
            "ServerAliveCountMax=3",
            "TCPKeepAlive=yes",
            "ControlMaster=auto",
            "ControlPersist=300",
            "StreamLocalBindUnlink=yes",
            "ControlPath=",
            "-F /tmp/ssh_config",
            "-i /tmp/id",
            "-p 2222",
            "user@host",
        ] {
            assert!(joined.contains(token), "missing {token:?} in {joined}");
        }
        assert_eq!(args.last().unwrap(), "bash -lc 'echo hello'");
    }

    #[test]
    fn test_describe() {
        let transport = SshTransport::new(SshOptions {
            target: "cluster".into(),
            ..SshOptions::default()
        });
        assert_eq!(transport.describe(), "ssh:cluster");
    }
}
