//! `dry-run`: print the effective configuration and planned execution
//! order without running anything.

use slurm_monitor_cli::{Config, Mode};
use slurm_monitor_tui::format::human_duration;
use std::io::Write;

pub fn run<W: Write>(config: &Config, out: &mut W) -> std::io::Result<()> {
    let target = if config.mode == Mode::Remote {
        config.target.as_str()
    } else {
        "local"
    };
    let duration = match config.duration {
        Some(duration) => human_duration(duration),
        None => "unbounded".to_string(),
    };

    writeln!(out, "slurm-monitor dry-run")?;
    writeln!(out, "mode: {}", config.mode)?;
    writeln!(out, "target: {target}")?;
    writeln!(out, "refresh: {}", human_duration(config.refresh))?;
    writeln!(out, "connect-timeout: {}", human_duration(config.connect_timeout))?;
    writeln!(out, "command-timeout: {}", human_duration(config.command_timeout))?;
    writeln!(out, "duration: {duration}")?;
    writeln!(out, "once: {}", config.once)?;
    writeln!(out, "compact: {}", config.compact)?;
    writeln!(out, "no-color: {}\n", config.no_color)?;

    writeln!(out, "planned sequence:")?;
    writeln!(out, "1. Parse flags and build the configured transport.")?;
    if config.mode == Mode::Local {
        writeln!(
            out,
            "2. Run a local preflight check for bash, sinfo, squeue, and scontrol."
        )?;
    } else {
        writeln!(
            out,
            "2. Connect over OpenSSH to the target and validate sinfo, squeue, and scontrol remotely."
        )?;
    }
    if config.once {
        writeln!(out, "3. Collect one snapshot, print summary metrics, and exit.")?;
    } else {
        writeln!(
            out,
            "3. Start the polling loop and render the live TUI until interrupted or duration is reached."
        )?;
    }
    writeln!(out, "4. Exit without mutating any Slurm queue or cluster state.")?;
    writeln!(out, "\ndry-run only: no local or remote commands were executed.")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slurm_monitor_cli::Action;
    use std::time::Duration;

    fn config(mode: Mode, target: &str) -> Config {
        Config {
            action: Action::DryRun,
            mode,
            target: target.to_string(),
            refresh: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(15),
            ssh_config: None,
            identity_file: None,
            port: None,
            no_color: false,
            compact: false,
            once: false,
            duration: None,
        }
    }

    #[test]
    fn test_dry_run_local() {
        let mut out = Vec::new();
        run(&config(Mode::Local, ""), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for needle in [
            "slurm-monitor dry-run",
            "mode: local",
            "Run a local preflight check",
            "dry-run only: no local or remote commands were executed.",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }

    #[test]
    fn test_dry_run_remote_once() {
        let mut cfg = config(Mode::Remote, "cluster_alias");
        cfg.once = true;
        cfg.duration = Some(Duration::from_secs(1800));
        let mut out = Vec::new();
        run(&cfg, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for needle in [
            "mode: remote",
            "target: cluster_alias",
            "Collect one snapshot, print summary metrics, and exit.",
            "duration: 30m0s",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }
}
