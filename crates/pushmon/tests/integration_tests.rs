//! End-to-end tests for the push-monitoring client: one full cycle from
//! fake probe output to a decodable queued report, and the sealed
//! datagram path against a local collector socket.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use flate2::read::ZlibDecoder;
use tokio::sync::mpsc;

use pushmon::crypto::{open_report, SealedReport};
use pushmon::liveness::ManualSource;
use pushmon::probes::{ProbeContext, ProbeReport, ProbeRunner, ProbeSettings};
use pushmon::transport::{spawn_sender, Channel};
use pushmon::{GeneratedKeys, KeyProvider, MonitorLoop, MonitorMessage, ProbeStatus};

struct StaticRunner {
    output: Vec<u8>,
    success: bool,
}

#[async_trait::async_trait]
impl ProbeRunner for StaticRunner {
    async fn run(&self, _group: &str, _context: &ProbeContext) -> anyhow::Result<ProbeReport> {
        Ok(ProbeReport { output: self.output.clone(), success: self.success })
    }
}

fn settings() -> ProbeSettings {
    ProbeSettings {
        port: 4124,
        hypervisor: "kvm".to_string(),
        ds_location: "/var/lib/datastores".to_string(),
        retries: 3,
    }
}

fn decode_payload(payload: &str) -> Vec<u8> {
    let compressed = STANDARD_NO_PAD.decode(payload).unwrap();
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut raw).unwrap();
    raw
}

#[tokio::test]
async fn one_cycle_queues_one_decodable_report() {
    let raw = b"HOSTNAME=node01\nFREEMEMORY=81920\nCPUSPEED=2400\n".to_vec();

    let (tx, mut rx) = mpsc::channel(8);
    let monitor = MonitorLoop::new(
        "host/system",
        Duration::from_secs(10),
        settings(),
        Arc::new(StaticRunner { output: raw.clone(), success: true }),
        Arc::new(ManualSource::new()),
        tx,
    );

    monitor.run_cycle().await.unwrap();

    // Exactly one message per completed cycle
    let message = rx.try_recv().unwrap();
    assert!(rx.try_recv().is_err());

    assert_eq!(message.status, ProbeStatus::Success);
    let line = message.to_line();
    assert!(line.starts_with("MONITOR SUCCESS 3 "));
    assert!(line.ends_with('\n'));

    // The payload inflates back to the exact probe output
    assert_eq!(decode_payload(&message.payload), raw);
}

#[tokio::test]
async fn sealed_datagram_reaches_a_local_collector() {
    let keypair = GeneratedKeys.ensure_keys().unwrap();

    // Stand-in collector: a plain UDP socket on localhost
    let collector = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let channel = Channel::open("127.0.0.1", port, keypair.report_key()).await.unwrap();
    let (tx, rx) = mpsc::channel(8);
    let sender = spawn_sender(channel, rx);

    let message = MonitorMessage::new(ProbeStatus::Failure, 3, "eJwDAAAAAAE".to_string());
    tx.send(message.clone()).await.unwrap();

    let mut buf = vec![0u8; 2048];
    let (len, _peer) = collector.recv_from(&mut buf).await.unwrap();

    // The collector holds the identity secret and opens the datagram
    let sealed = SealedReport::from_datagram(&buf[..len]).unwrap();
    let opened = open_report(&sealed, &keypair.x25519_secret_bytes()).unwrap();
    assert_eq!(opened, message.to_line().as_bytes());

    drop(tx);
    sender.await.unwrap();
}

#[tokio::test]
async fn sender_task_preserves_arrival_order() {
    let keypair = GeneratedKeys.ensure_keys().unwrap();

    let collector = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let channel = Channel::open("127.0.0.1", port, keypair.report_key()).await.unwrap();
    let (tx, rx) = mpsc::channel(8);
    let sender = spawn_sender(channel, rx);

    for retries in 0..3u32 {
        tx.send(MonitorMessage::new(ProbeStatus::Success, retries, "eJwDAAAAAAE".into()))
            .await
            .unwrap();
    }

    let mut buf = vec![0u8; 2048];
    for retries in 0..3u32 {
        let (len, _) = collector.recv_from(&mut buf).await.unwrap();
        let sealed = SealedReport::from_datagram(&buf[..len]).unwrap();
        let opened = open_report(&sealed, &keypair.x25519_secret_bytes()).unwrap();
        let line = String::from_utf8(opened).unwrap();
        assert_eq!(line, format!("MONITOR SUCCESS {} eJwDAAAAAAE\n", retries));
    }

    drop(tx);
    sender.await.unwrap();
}
