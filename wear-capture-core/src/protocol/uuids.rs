//! GATT service and characteristic ids for the wearable's profile.
//!
//! The audio service doubles as the scan filter: advertisements that do not
//! carry it are not this device family.

use uuid::{uuid, Uuid};

/// Primary audio service; mandatory, also used as the advertisement filter.
pub const AUDIO_SERVICE: Uuid = uuid!("19b10000-e8f2-537e-4f6c-d104768a1214");

/// Notify characteristic streaming `[seqLo, seqHi, frameId, ...payload]`.
pub const AUDIO_DATA_CHARACTERISTIC: Uuid = uuid!("19b10001-e8f2-537e-4f6c-d104768a1214");

/// Read characteristic holding the one-byte codec id.
pub const AUDIO_CODEC_CHARACTERISTIC: Uuid = uuid!("19b10002-e8f2-537e-4f6c-d104768a1214");

/// Button service; optional.
pub const BUTTON_SERVICE: Uuid = uuid!("23ba7924-0000-1000-7450-346eac492e92");

/// Notify characteristic whose first payload byte is the tap count.
pub const BUTTON_TRIGGER_CHARACTERISTIC: Uuid = uuid!("23ba7925-0000-1000-7450-346eac492e92");

/// Bluetooth SIG Battery Service; optional, consumed read-only.
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

pub const BATTERY_LEVEL_CHARACTERISTIC: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Bluetooth SIG Device Information Service; optional, consumed read-only.
pub const DEVICE_INFORMATION_SERVICE: Uuid = uuid!("0000180a-0000-1000-8000-00805f9b34fb");

pub const MODEL_NUMBER_CHARACTERISTIC: Uuid = uuid!("00002a24-0000-1000-8000-00805f9b34fb");

pub const FIRMWARE_REVISION_CHARACTERISTIC: Uuid = uuid!("00002a26-0000-1000-8000-00805f9b34fb");
