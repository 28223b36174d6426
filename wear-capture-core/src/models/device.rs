use serde::{Deserialize, Serialize};

/// Device family a scan result belongs to.
///
/// One family today; scan filtering keys on the family's audio service id,
/// so anything discovered is a wearable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Wearable,
}

/// A device seen during a scan.
///
/// Ephemeral: created per scan result and discarded when the next scan
/// replaces the cached list. Promotion to "paired" (persisting id and name)
/// is an external concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Stable wire address, unique per adapter session.
    pub id: String,
    pub name: String,
    /// Signal strength at discovery time; `None` when the platform does not
    /// report it (such devices sort last).
    pub rssi: Option<i16>,
    pub kind: DeviceKind,
}
