use serde::{Deserialize, Serialize};

/// Number of consecutive button presses reported by the wearable.
///
/// Never a start/stop discriminator: any tap toggles capture. The count is
/// carried only as metadata on the resulting recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapCount {
    Single,
    Double,
    Triple,
}

impl TapCount {
    /// Decode the first payload byte of a button notification.
    ///
    /// Any value outside 1..=3 is unknown and ignored by callers.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }
}

/// A decoded button notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub taps: TapCount,
}
