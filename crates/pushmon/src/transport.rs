//! The encrypted datagram channel to the collector.
//!
//! One socket is opened per process lifetime and handed to a single
//! owning sender task; scheduling loops enqueue finished messages on a
//! bounded queue instead of touching the socket themselves, so sends
//! from different channel groups never interleave mid-datagram.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::crypto::seal_report;
use crate::message::MonitorMessage;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No IPv4 address found for collector host: {0}")]
    AddressResolution(String),
    #[error("{0:#}")]
    Io(#[from] std::io::Error),
}

/// First address classified as IPv4 among the resolver's candidates;
/// IPv6 entries are skipped.
pub fn first_ipv4(candidates: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    candidates.into_iter().find(|addr| addr.is_ipv4())
}

/// Resolve the collector host to its IPv4 address.
pub async fn resolve_collector(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let candidates = tokio::net::lookup_host((host, port)).await?;

    first_ipv4(candidates).ok_or_else(|| TransportError::AddressResolution(host.to_string()))
}

/// The channel every scheduling loop reports through.
///
/// Each wire line is sealed whole under the report key and sent as one
/// datagram. There is no retry and no delivery confirmation.
pub struct Channel {
    socket: UdpSocket,
    report_key: [u8; 32],
}

impl Channel {
    /// Resolve the collector and open the process's one datagram socket,
    /// connected to the resolved address.
    pub async fn open(host: &str, port: u16, report_key: [u8; 32]) -> Result<Self, TransportError> {
        let collector = resolve_collector(host, port).await?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(collector).await?;

        tracing::info!("Push channel open to collector {}", collector);

        Ok(Self { socket, report_key })
    }

    /// Seal and transmit one wire line.
    pub async fn send(&self, line: &str) -> crate::Result<()> {
        let sealed = seal_report(line.as_bytes(), &self.report_key)?;
        self.socket.send(&sealed.to_datagram()).await?;
        Ok(())
    }
}

/// Give the channel to its owning task: drain the queue, seal and send
/// each message in arrival order.
///
/// A send failure ends this task; every loop still enqueueing observes
/// the closed queue on its next cycle and ends with it.
pub fn spawn_sender(channel: Channel, mut rx: mpsc::Receiver<MonitorMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = channel.send(&message.to_line()).await {
                tracing::error!("Failed to push report to collector: {:#}", e);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;

    fn v4(last: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, last)), 4124)
    }

    fn v6() -> SocketAddr {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 4124)
    }

    #[test]
    fn test_first_ipv4_skips_ipv6() {
        let chosen = first_ipv4([v6(), v4(10), v4(20)]);
        assert_eq!(chosen, Some(v4(10)));
    }

    #[test]
    fn test_first_ipv4_none_for_only_ipv6() {
        assert_eq!(first_ipv4([v6(), v6()]), None);
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let addr = resolve_collector("127.0.0.1", 4124).await.unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4124));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal_fails() {
        let err = resolve_collector("::1", 4124).await.unwrap_err();
        assert!(matches!(err, TransportError::AddressResolution(_)));
        assert!(err.to_string().contains("::1"));
    }
}
