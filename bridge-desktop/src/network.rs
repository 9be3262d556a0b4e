//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Desktop network monitor implementation
///
/// Provides basic network connectivity detection via a TCP probe.
///
/// Note: Platform-specific implementations (Linux netlink, macOS
/// SystemConfiguration, Windows WinAPI) would be more robust but require
/// additional dependencies.
pub struct DesktopNetworkMonitor {
    cached_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self {
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    /// Check network connectivity by attempting a TCP connection
    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            std::time::Duration::from_secs(5),
            tokio::net::TcpStream::connect("8.8.8.8:53"),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let mut cached = self.cached_info.lock().await;

        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: if status == NetworkStatus::Connected {
                // The probe cannot distinguish WiFi from Ethernet without
                // platform-specific APIs.
                Some(NetworkType::Other)
            } else {
                None
            },
            // Desktop connections are typically not metered
            is_metered: false,
            // A successful probe doubles as internet validation
            is_validated: status == NetworkStatus::Connected,
        };

        *cached = Some(info.clone());
        debug!(status = ?status, "Network info updated");

        Ok(info)
    }

    async fn is_wifi(&self) -> bool {
        // Desktop implementation doesn't distinguish network types
        false
    }

    async fn is_metered(&self) -> bool {
        false
    }
}
