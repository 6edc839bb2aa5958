//! Per-channel scheduling loops and the shepherd task.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::encoding::encode_report;
use crate::liveness::{LivenessSnapshot, LivenessSource};
use crate::message::{MonitorMessage, ProbeStatus};
use crate::probes::{ProbeRunner, ProbeSettings};

/// Pause before the next cycle.
///
/// The pause fires only when the cycle overran its push period, and a
/// negative remainder cannot be represented as a sleep, so it clamps to
/// zero. A cycle that finishes early starts the next one immediately.
pub fn cycle_pause(period: Duration, elapsed: Duration) -> Option<Duration> {
    if elapsed > period {
        Some(Duration::ZERO)
    } else {
        None
    }
}

/// One scheduling loop: a probe group bound to a push period.
///
/// Every loop in the process feeds the same bounded queue; the sender
/// task on the other end owns the socket.
pub struct MonitorLoop {
    group: String,
    period: Duration,
    settings: ProbeSettings,
    runner: Arc<dyn ProbeRunner>,
    liveness: Arc<dyn LivenessSource>,
    snapshot: LivenessSnapshot,
    tx: mpsc::Sender<MonitorMessage>,
}

impl MonitorLoop {
    /// Bind a loop to its probe group. The liveness snapshot is captured
    /// here, once, and never changes afterwards.
    pub fn new(
        group: impl Into<String>,
        period: Duration,
        settings: ProbeSettings,
        runner: Arc<dyn ProbeRunner>,
        liveness: Arc<dyn LivenessSource>,
        tx: mpsc::Sender<MonitorMessage>,
    ) -> Self {
        let snapshot = liveness.capture();
        Self { group: group.into(), period, settings, runner, liveness, snapshot, tx }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Run until the liveness marker changes generation (process exit)
    /// or a probe/queue error ends this loop.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.liveness.should_stop(&self.snapshot) {
                tracing::info!("Agent generation is stale, exiting");
                std::process::exit(0);
            }

            self.run_cycle().await?;
        }
    }

    /// One probe-push cycle: run the group, encode its output, build the
    /// report line, enqueue it, then pause per the drift rule.
    pub async fn run_cycle(&self) -> Result<()> {
        let started = Instant::now();

        let context = self.settings.with_period(self.period.as_secs());
        let report = self.runner.run(&self.group, &context).await?;

        let payload = encode_report(&report.output)?;
        let message =
            MonitorMessage::new(ProbeStatus::from_exit(report.success), self.settings.retries, payload);

        if !self.matches_stored(&message) {
            self.tx
                .send(message)
                .await
                .with_context(|| format!("Push queue closed for group {}", self.group))?;
        }

        if let Some(pause) = cycle_pause(self.period, started.elapsed()) {
            tokio::time::sleep(pause).await;
        }

        Ok(())
    }

    // TODO: compare against the last report the collector stored and
    // skip the send when nothing changed
    fn matches_stored(&self, _message: &MonitorMessage) -> bool {
        false
    }
}

/// Spawn one scheduling loop as its own task. An error ends this task
/// only; sibling loops keep running.
pub fn spawn_monitor(monitor: MonitorLoop) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = monitor.run().await {
            tracing::error!("Monitor loop {} ended: {:#}", monitor.group(), e);
        }
    })
}

/// Spawn the shepherd task: sleep for the first group's push period,
/// then fire the supervisory script exactly once. No output is captured.
pub fn spawn_shepherd(delay: Duration, script: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let status = tokio::process::Command::new("bash")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if !status.success() => {
                tracing::warn!("Shepherd {} exited with {}", script.display(), status);
            }
            Err(e) => tracing::warn!("Failed to run shepherd {}: {}", script.display(), e),
            _ => {}
        }
    })
}
