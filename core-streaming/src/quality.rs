//! # Network Quality Assessment
//!
//! Classifies current connectivity into a small ordinal tier set used by the
//! adaptive chunk sizing policy, plus a human-readable label for the
//! diagnostics surface.

use bridge_traits::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Discretized network quality, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkTier::Poor => "Poor",
            NetworkTier::Fair => "Fair",
            NetworkTier::Good => "Good",
            NetworkTier::Excellent => "Excellent",
        };
        write!(f, "{label}")
    }
}

/// Assesses network quality from a platform [`NetworkMonitor`].
///
/// Side-effect free and cheap to call at high frequency; any monitor failure
/// degrades to [`NetworkTier::Fair`] rather than propagating an error.
pub struct NetworkQualityAssessor {
    monitor: Arc<dyn NetworkMonitor>,
}

impl NetworkQualityAssessor {
    pub fn new(monitor: Arc<dyn NetworkMonitor>) -> Self {
        Self { monitor }
    }

    /// Classify current connectivity into a tier.
    pub async fn assess(&self) -> NetworkTier {
        match self.monitor.get_network_info().await {
            Ok(info) => {
                let tier = Self::tier_from_info(&info);
                debug!(?tier, status = ?info.status, metered = info.is_metered, "Assessed network quality");
                tier
            }
            Err(e) => {
                debug!(error = %e, "Network query failed, defaulting to Fair");
                NetworkTier::Fair
            }
        }
    }

    /// Returns `true` if the device currently has connectivity.
    ///
    /// Used by the retry controller to suppress attempts on a dead link; a
    /// failed query is treated as connected so retries are not starved.
    pub async fn is_connected(&self) -> bool {
        match self.monitor.get_network_info().await {
            Ok(info) => info.status == NetworkStatus::Connected,
            Err(_) => true,
        }
    }

    /// Human-readable quality label for the diagnostics surface,
    /// e.g. `"WiFi (Excellent)"`. Returns `"Unknown"` if the query fails.
    pub async fn quality_label(&self) -> String {
        match self.monitor.get_network_info().await {
            Ok(info) => {
                let tier = Self::tier_from_info(&info);
                let transport = match info.network_type {
                    Some(NetworkType::WiFi) => "WiFi",
                    Some(NetworkType::Ethernet) => "Ethernet",
                    Some(NetworkType::Cellular) => "Cellular",
                    Some(NetworkType::Other) | None => "Network",
                };
                match info.status {
                    NetworkStatus::Connected => format!("{transport} ({tier})"),
                    NetworkStatus::Disconnected => "Offline".to_string(),
                    NetworkStatus::Indeterminate => format!("{transport} (unverified)"),
                }
            }
            Err(_) => "Unknown".to_string(),
        }
    }

    fn tier_from_info(info: &NetworkInfo) -> NetworkTier {
        if info.status != NetworkStatus::Connected {
            return NetworkTier::Poor;
        }

        let wide_link = matches!(
            info.network_type,
            Some(NetworkType::WiFi) | Some(NetworkType::Ethernet)
        );

        if wide_link && !info.is_metered {
            NetworkTier::Excellent
        } else if !info.is_metered {
            NetworkTier::Good
        } else if info.is_validated {
            NetworkTier::Fair
        } else {
            NetworkTier::Poor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::Result as BridgeResult;

    struct FixedMonitor(BridgeResult<NetworkInfo>);

    #[async_trait::async_trait]
    impl NetworkMonitor for FixedMonitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            match &self.0 {
                Ok(info) => Ok(info.clone()),
                Err(_) => Err(bridge_traits::BridgeError::NotAvailable(
                    "monitor down".to_string(),
                )),
            }
        }
    }

    fn info(
        status: NetworkStatus,
        network_type: Option<NetworkType>,
        is_metered: bool,
        is_validated: bool,
    ) -> NetworkInfo {
        NetworkInfo {
            status,
            network_type,
            is_metered,
            is_validated,
        }
    }

    #[tokio::test]
    async fn test_tier_mapping() {
        let cases = [
            (
                info(NetworkStatus::Connected, Some(NetworkType::WiFi), false, true),
                NetworkTier::Excellent,
            ),
            (
                info(NetworkStatus::Connected, Some(NetworkType::Ethernet), false, true),
                NetworkTier::Excellent,
            ),
            (
                info(NetworkStatus::Connected, Some(NetworkType::Cellular), false, true),
                NetworkTier::Good,
            ),
            (
                info(NetworkStatus::Connected, Some(NetworkType::Cellular), true, true),
                NetworkTier::Fair,
            ),
            (
                info(NetworkStatus::Connected, Some(NetworkType::Cellular), true, false),
                NetworkTier::Poor,
            ),
            (
                info(NetworkStatus::Disconnected, None, false, false),
                NetworkTier::Poor,
            ),
        ];

        for (info, expected) in cases {
            let assessor = NetworkQualityAssessor::new(Arc::new(FixedMonitor(Ok(info))));
            assert_eq!(assessor.assess().await, expected);
        }
    }

    #[tokio::test]
    async fn test_monitor_failure_defaults_to_fair() {
        let assessor = NetworkQualityAssessor::new(Arc::new(FixedMonitor(Err(
            bridge_traits::BridgeError::NotAvailable("down".to_string()),
        ))));
        assert_eq!(assessor.assess().await, NetworkTier::Fair);
        assert_eq!(assessor.quality_label().await, "Unknown");
        assert!(assessor.is_connected().await);
    }

    #[tokio::test]
    async fn test_quality_label() {
        let assessor = NetworkQualityAssessor::new(Arc::new(FixedMonitor(Ok(info(
            NetworkStatus::Connected,
            Some(NetworkType::WiFi),
            false,
            true,
        )))));
        assert_eq!(assessor.quality_label().await, "WiFi (Excellent)");

        let assessor = NetworkQualityAssessor::new(Arc::new(FixedMonitor(Ok(info(
            NetworkStatus::Disconnected,
            None,
            false,
            false,
        )))));
        assert_eq!(assessor.quality_label().await, "Offline");
    }

    #[test]
    fn test_tier_ordering() {
        assert!(NetworkTier::Poor < NetworkTier::Fair);
        assert!(NetworkTier::Fair < NetworkTier::Good);
        assert!(NetworkTier::Good < NetworkTier::Excellent);
    }
}
