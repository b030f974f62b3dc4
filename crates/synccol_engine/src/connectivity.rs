//! Platform connectivity probing.

use std::sync::atomic::{AtomicBool, Ordering};

/// The kind of network connection the platform reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// The platform cannot tell.
    Unknown,
    /// Wired connection.
    Ethernet,
    /// Wireless LAN.
    Wifi,
    /// Mobile data.
    Cellular,
    /// No connection at all.
    None,
}

/// Reports whether the device is online.
///
/// When the probe reports [`ConnectionType::None`] the sync engine skips
/// every network request and serves cached data.
pub trait Connectivity: Send + Sync {
    /// Returns the current connection type.
    fn connection_type(&self) -> ConnectionType;

    /// Returns true if the device is known to be offline.
    fn is_offline(&self) -> bool {
        self.connection_type() == ConnectionType::None
    }
}

/// A probe that never reports offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Unknown
    }
}

/// A probe switched by the host, e.g. from OS network notifications.
#[derive(Debug, Default)]
pub struct ManualConnectivity {
    offline: AtomicBool,
}

impl ManualConnectivity {
    /// Creates an online probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the offline state.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Connectivity for ManualConnectivity {
    fn connection_type(&self) -> ConnectionType {
        if self.offline.load(Ordering::SeqCst) {
            ConnectionType::None
        } else {
            ConnectionType::Unknown
        }
    }
}
