mod config;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::info;

use pushmon::schedule::{spawn_monitor, spawn_shepherd};
use pushmon::transport::spawn_sender;
use pushmon::{
    Channel, ExecProbeRunner, FileMarkerSource, HostIdentityKeys, KeyProvider, MonitorLoop,
    PROBE_GROUPS, ProbeSettings,
};

/// Push-monitoring agent: runs probe groups on this node and streams
/// sealed reports to the collector that deployed it.
#[derive(Debug, Parser)]
#[command(name = "pushmon-agent", version, about)]
struct Cli {
    /// Hypervisor kind, selects the probe directory layout
    hypervisor: String,

    /// Datastore location on this host
    ds_location: String,

    /// Collector UDP port
    port: u16,

    /// Push period in seconds for each channel group, comma separated
    #[arg(value_delimiter = ',', num_args = 1, required = true)]
    push_periods: Vec<u64>,

    /// Retry count forwarded to the collector inside each report
    retries: u32,

    /// Config file path (default: $XDG_CONFIG_HOME/pushmon/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// The collector is whoever opened the inbound connection that started
/// this agent: the first token of SSH_CLIENT is its address.
fn peer_address(ssh_client: &str) -> Option<String> {
    ssh_client.split_whitespace().next().map(str::to_string)
}

fn collector_host() -> Result<String> {
    let ssh_client =
        env::var("SSH_CLIENT").context("SSH_CLIENT is not set; cannot locate the collector")?;
    peer_address(&ssh_client).context("SSH_CLIENT carries no peer address")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = config::Config::from_config(cli.config.as_deref())
        .context("Failed to load agent config")?;

    if cli.push_periods.len() < PROBE_GROUPS.len() {
        anyhow::bail!(
            "Expected {} push periods (one per channel group), got {}",
            PROBE_GROUPS.len(),
            cli.push_periods.len()
        );
    }

    let host = collector_host()?;

    let provider = HostIdentityKeys::new(config.keys.identity.clone(), config.keys.export.clone());
    let keypair = provider.ensure_keys()?;
    info!("Report key: {}", keypair.report_key_hex());

    let channel = Channel::open(&host, cli.port, keypair.report_key()).await?;

    let (tx, rx) = mpsc::channel(config.channel.queue_depth);
    let sender = spawn_sender(channel, rx);

    let settings = ProbeSettings {
        port: cli.port,
        hypervisor: cli.hypervisor.clone(),
        ds_location: cli.ds_location.clone(),
        retries: cli.retries,
    };
    let runner = Arc::new(ExecProbeRunner::new(config.probes.root.clone()));
    let liveness = Arc::new(FileMarkerSource::new(config.liveness.marker.clone()));

    let mut handles = Vec::new();
    for (group, period) in PROBE_GROUPS.iter().zip(&cli.push_periods) {
        info!("Scheduling {} every {}s", group, period);
        let monitor = MonitorLoop::new(
            *group,
            Duration::from_secs(*period),
            settings.clone(),
            runner.clone(),
            liveness.clone(),
            tx.clone(),
        );
        handles.push(spawn_monitor(monitor));
    }
    // The loops hold the only remaining senders; the sender task ends
    // when the last loop does.
    drop(tx);

    let shepherd =
        config.probes.root.join(format!("{}-probes.d", cli.hypervisor)).join("shepherd");
    handles.push(spawn_shepherd(Duration::from_secs(cli.push_periods[0]), shepherd));
    handles.push(sender);

    // Loops are infinite: the process lives until a fatal error, the
    // liveness exit, or an external kill.
    join_all(handles).await;

    Ok(())
}
