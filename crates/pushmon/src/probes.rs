//! Probe group execution.
//!
//! The probes themselves live on disk as external executables under the
//! probes root; the agent only hands them a configuration blob and
//! collects their combined output and exit status.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::Serialize;

/// Static probe configuration, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSettings {
    pub port: u16,
    pub hypervisor: String,
    pub ds_location: String,
    pub retries: u32,
}

impl ProbeSettings {
    /// Merge in the current push period, producing the per-cycle blob
    /// handed to the probe runner.
    pub fn with_period(&self, push_period: u64) -> ProbeContext {
        ProbeContext {
            port: self.port,
            hypervisor: self.hypervisor.clone(),
            ds_location: self.ds_location.clone(),
            retries: self.retries,
            push_period,
        }
    }
}

/// The serialized configuration blob a probe group receives each cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeContext {
    pub port: u16,
    pub hypervisor: String,
    pub ds_location: String,
    pub retries: u32,
    pub push_period: u64,
}

impl ProbeContext {
    pub fn to_blob(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize probe context")
    }
}

/// Raw output of one probe group run.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Combined stdout and stderr of the probe group
    pub output: Vec<u8>,
    /// Whether the probe group exited zero
    pub success: bool,
}

/// Executes a named probe group with a merged configuration.
///
/// A runner that fails to execute at all (as opposed to a probe exiting
/// non-zero) returns an error, which ends the calling scheduling loop.
#[async_trait::async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, group: &str, context: &ProbeContext) -> Result<ProbeReport>;
}

/// Probe runner shelling out to the on-host `run_probes` executable.
pub struct ExecProbeRunner {
    probes_root: PathBuf,
}

impl ExecProbeRunner {
    pub fn new(probes_root: PathBuf) -> Self {
        Self { probes_root }
    }

    /// Directory argument for one group: `<hypervisor>-probes.d/<group>`.
    fn group_dir(hypervisor: &str, group: &str) -> String {
        format!("{}-probes.d/{}", hypervisor, group)
    }
}

#[async_trait::async_trait]
impl ProbeRunner for ExecProbeRunner {
    async fn run(&self, group: &str, context: &ProbeContext) -> Result<ProbeReport> {
        let runner = self.probes_root.join("run_probes");
        let group_dir = Self::group_dir(&context.hypervisor, group);
        let blob = context.to_blob()?;

        tracing::debug!("Running probe group {}", group_dir);

        let output = tokio::process::Command::new(&runner)
            .arg(&group_dir)
            .arg(&blob)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", runner.display()))?;

        // Probes write measurements to stdout and diagnostics to stderr;
        // the collector receives both streams merged.
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(ProbeReport { output: combined, success: output.status.success() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProbeSettings {
        ProbeSettings {
            port: 4124,
            hypervisor: "kvm".to_string(),
            ds_location: "/var/lib/datastores".to_string(),
            retries: 3,
        }
    }

    #[test]
    fn test_context_merges_push_period() {
        let context = settings().with_period(20);
        assert_eq!(context.push_period, 20);
        assert_eq!(context.port, 4124);
        assert_eq!(context.retries, 3);
    }

    #[test]
    fn test_blob_carries_all_keys() {
        let blob = settings().with_period(20).to_blob().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();

        assert_eq!(value["port"], 4124);
        assert_eq!(value["hypervisor"], "kvm");
        assert_eq!(value["ds_location"], "/var/lib/datastores");
        assert_eq!(value["retries"], 3);
        assert_eq!(value["push_period"], 20);
    }

    #[test]
    fn test_group_dir_layout() {
        assert_eq!(ExecProbeRunner::group_dir("kvm", "host/system"), "kvm-probes.d/host/system");
    }

    #[tokio::test]
    async fn test_missing_runner_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ExecProbeRunner::new(dir.path().to_path_buf());

        let result = runner.run("host/system", &settings().with_period(10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exec_captures_output_and_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let runner_path = dir.path().join("run_probes");
        // Echoes its group argument and exits non-zero: exercises both
        // the output capture and exit-status-as-data semantics.
        std::fs::write(&runner_path, "#!/bin/sh\necho \"probed $1\"\nexit 1\n").unwrap();
        std::fs::set_permissions(&runner_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = ExecProbeRunner::new(dir.path().to_path_buf());
        let report = runner.run("host/system", &settings().with_period(10)).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.output, b"probed kvm-probes.d/host/system\n");
    }
}
