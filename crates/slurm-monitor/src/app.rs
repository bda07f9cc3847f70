//! Application wiring: transport, preflight gate, polling loop, dashboard.

use crate::preflight;
use chrono::SecondsFormat;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use miette::{IntoDiagnostic, Result};
use ratatui::prelude::*;
use slurm_monitor_cli::{Config, Mode};
use slurm_monitor_slurm::{sort_users_by_pending_demand, Collector, Snapshot};
use slurm_monitor_transport::{LocalTransport, SshOptions, SshTransport, Transport};
use slurm_monitor_tui::format::{mem_mb, mem_pair, ratio};
use slurm_monitor_tui::{App, AppOptions};
use slurm_monitor_watch::{Loop, LoopConfig, Update, UPDATE_CHANNEL_CAPACITY};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Ceiling for a one-shot collection; generous because there is no retry.
const ONCE_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run(config: Config) -> Result<()> {
    let transport = build_transport(&config);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    spawn_shutdown_triggers(&config, &shutdown_tx);

    preflight::await_slurm_availability(
        transport.as_ref(),
        config.command_timeout,
        &mut shutdown_rx,
    )
    .await
    .into_diagnostic()?;

    let mut collector = Collector::new(transport.clone(), config.command_timeout);
    if config.once {
        return run_once(&mut collector, &transport.describe()).await;
    }

    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    let loop_config = LoopConfig {
        refresh: config.refresh,
        ..LoopConfig::default()
    };
    let looper = Loop::new(collector, loop_config);
    let loop_handle = tokio::spawn(looper.run(updates_tx, shutdown_rx.clone()));

    let result = run_tui(&config, transport.describe(), updates_rx).await;

    // Stop the loop whichever way the dashboard exited.
    let _ = shutdown_tx.send(true);
    let _ = loop_handle.await;
    result
}

pub fn build_transport(config: &Config) -> Arc<dyn Transport> {
    match config.mode {
        Mode::Local => Arc::new(LocalTransport::new()),
        Mode::Remote => Arc::new(SshTransport::new(SshOptions {
            target: config.target.clone(),
            config_path: config.ssh_config.as_ref().map(|p| p.to_string()),
            identity_file: config.identity_file.as_ref().map(|p| p.to_string()),
            port: config.port,
            connect_timeout: config.connect_timeout,
        })),
    }
}

/// Ctrl+C (outside raw mode) and the optional runtime limit both flip the
/// shutdown flag; inside the TUI the same limit is enforced by the app
/// tick.
fn spawn_shutdown_triggers(config: &Config, shutdown_tx: &Arc<watch::Sender<bool>>) {
    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });

    if let Some(duration) = config.duration {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(true);
        });
    }
}

/// `--once`: one snapshot, a plain-text summary, exit.
async fn run_once(collector: &mut Collector, source: &str) -> Result<()> {
    let snapshot = tokio::time::timeout(ONCE_TIMEOUT, collector.collect())
        .await
        .map_err(|_| miette::Report::msg("one-shot collection timed out"))?
        .into_diagnostic()?;

    print_summary(&snapshot, source, &mut io::stdout()).into_diagnostic()
}

fn print_summary<W: io::Write>(
    snapshot: &Snapshot,
    source: &str,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "source: {source}")?;
    writeln!(
        out,
        "collected_at: {}",
        snapshot.collected_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    writeln!(out, "nodes: {}", snapshot.nodes.len())?;
    writeln!(
        out,
        "queue: running={} pending={}",
        snapshot.queue.running, snapshot.queue.pending
    )?;

    let totals = snapshot.totals();
    writeln!(
        out,
        "totals: cpu={} mem={} gpu={}",
        ratio(totals.cpu_alloc, totals.cpu_total),
        mem_pair(totals.mem_alloc_mb, totals.mem_total_mb),
        ratio(totals.gpu_alloc, totals.gpu_total),
    )?;

    let mut users = snapshot.users.clone();
    sort_users_by_pending_demand(&mut users);
    users.truncate(10);
    writeln!(out, "users:")?;
    for user in &users {
        writeln!(
            out,
            "  - {} running={} pending={} pending_cpu_jobs={} pending_mem={} pending_gpu_jobs={}",
            user.user,
            user.running,
            user.pending,
            user.pending_cpu_jobs,
            mem_mb(user.pending_mem_mb),
            user.pending_gpu_jobs,
        )?;
    }
    Ok(())
}

/// Own the terminal for the dashboard's lifetime, restoring it on the way
/// out even when the driver errors.
async fn run_tui(
    config: &Config,
    source: String,
    updates: mpsc::Receiver<Update>,
) -> Result<()> {
    enable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;

    let mut app = App::new(AppOptions {
        source,
        compact: config.compact,
        no_color: config.no_color,
        refresh: config.refresh,
        max_duration: config.duration,
    });
    let result = drive(&mut terminal, &mut app, updates).await;

    disable_raw_mode().into_diagnostic()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).into_diagnostic()?;
    terminal.show_cursor().into_diagnostic()?;

    result.into_diagnostic()
}

/// Main dashboard loop: draw, drain updates, poll keys, tick once a
/// second.
async fn drive<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut updates: mpsc::Receiver<Update>,
) -> io::Result<()> {
    let poll_rate = Duration::from_millis(100);
    let tick_interval = Duration::from_secs(1);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        loop {
            match updates.try_recv() {
                Ok(update) => app.apply_update(update),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    app.on_channel_closed();
                    break;
                }
            }
        }

        if event::poll(poll_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_interval {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }

        // Keep the executor responsive between draws.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
