//! Seams between the core and its host environment.
//!
//! [`BleCentral`] and [`BlePeripheral`] are implemented by a platform
//! backend crate; [`DeviceConnection`], [`AudioDecoder`] and
//! [`RecordingSink`] let the capture layer run against mocks in tests.
//!
//! [`BleCentral`]: central::BleCentral
//! [`BlePeripheral`]: peripheral::BlePeripheral
//! [`DeviceConnection`]: device_connection::DeviceConnection
//! [`AudioDecoder`]: decoder::AudioDecoder
//! [`RecordingSink`]: sink::RecordingSink

pub mod central;
pub mod decoder;
pub mod device_connection;
pub mod peripheral;
pub mod sink;
