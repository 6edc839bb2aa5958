//! pushmon - secure push-monitoring client for hypervisor nodes
//!
//! This library implements the agent side of the push monitoring
//! pipeline: it runs named probe groups on a schedule, compresses and
//! seals each report, and fires it at the collector over UDP. The
//! collector side is a separate service and is not part of this crate.

pub mod crypto;
pub mod encoding;
pub mod liveness;
pub mod message;
pub mod probes;
pub mod schedule;
pub mod transport;

// Re-export main types
pub use crypto::{GeneratedKeys, HostIdentityKeys, KeyPair, KeyProvider};
pub use liveness::{FileMarkerSource, LivenessSnapshot, LivenessSource};
pub use message::{MonitorMessage, ProbeStatus};
pub use probes::{ExecProbeRunner, ProbeReport, ProbeRunner, ProbeSettings};
pub use schedule::MonitorLoop;
pub use transport::{Channel, TransportError};

/// Re-export common error types
pub use anyhow;

/// pushmon result type using anyhow for error handling
pub type Result<T> = anyhow::Result<T>;

/// The probe groups every agent monitors, in scheduling order. The Nth
/// configured push period drives the Nth group.
pub const PROBE_GROUPS: [&str; 4] = ["host/system", "host/monitor", "vms/status", "vms/monitor"];
