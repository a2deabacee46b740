//! Backend abstraction over the native controller layer
//!
//! A [`ControllerBackend`] is the only thing that talks to devices. Sessions share one
//! backend through a [`SharedBackend`]; the mutex doubles as the external serialisation
//! the native device-update call needs, so polling from several threads is safe but never
//! concurrent.
//!
//! ```text
//! ControllerSession ──lock──► SharedBackend<B> ──► native devices / audio outputs
//! HapticsHandshake  ──lock──┘
//! ```

pub mod mock;

#[cfg(feature = "gilrs-backend")]
pub mod gilrs_backend;

use std::num::NonZeroU64;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::types::{AxisId, ButtonId, PowerLevel};

/// Backend shared between sessions and the handshake task.
pub type SharedBackend<B> = Arc<Mutex<B>>;

/// Wraps a backend so it can be handed to sessions.
pub fn share<B: ControllerBackend>(backend: B) -> SharedBackend<B> {
    Arc::new(Mutex::new(backend))
}

/// Raw id of an open device connection, allocated by the backend.
///
/// Zero is never a valid id, which keeps `Option<DeviceId>` the size of a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(NonZeroU64);

impl DeviceId {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Exclusive ownership of one open device connection.
///
/// Deliberately neither `Clone` nor `Copy`: exactly one session holds it, and it is
/// consumed when the session releases the connection.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    id: DeviceId,
}

impl DeviceHandle {
    pub(crate) fn new(id: DeviceId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }
}

// Motion sensor sample straight from the backend
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionReading {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

// Touchpad finger sample straight from the backend
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchReading {
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

/// Requested format of an audio output. Samples are always signed 16-bit little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub freq: u32,
    pub channels: u16,
    /// Buffer size in frames
    pub frames: u16,
}

/// Output format of the haptic audio channel: 48 kHz, 4 channels, 10 ms buffers.
pub const HAPTIC_AUDIO_SPEC: AudioSpec = AudioSpec {
    freq: 48_000,
    channels: 4,
    frames: 480,
};

/// FIFO audio output. Queued packets play in submission order.
pub trait AudioSink: Send {
    fn queue(&mut self, pcm: &[u8]) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to open controller at slot {slot}: {reason}")]
    OpenFailed { slot: u32, reason: String },

    #[error("Not supported by backend: {0}")]
    NotSupported(String),

    #[error("Failed to send to device: {0}")]
    SendFailed(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Device detached")]
    Detached,
}

/// Synchronous access to controllers and audio outputs.
///
/// Every query is a short call without suspension points. Optional capabilities have
/// default implementations reporting "unsupported", so a minimal backend only deals with
/// connection lifecycle, buttons and axes.
pub trait ControllerBackend: Send + 'static {
    /// Opens the controller at `slot`.
    fn open(&mut self, slot: u32) -> Result<DeviceId, BackendError>;

    /// Releases a connection. Unknown ids are ignored.
    fn close(&mut self, device: DeviceId);

    /// Pumps pending device state. Called before every state read.
    fn update(&mut self) {}

    fn is_attached(&self, device: DeviceId) -> bool;

    fn name(&self, device: DeviceId) -> Option<String>;

    fn vendor_id(&self, device: DeviceId) -> Option<u16>;

    fn product_id(&self, device: DeviceId) -> Option<u16>;

    fn button(&self, device: DeviceId, button: ButtonId) -> bool;

    fn has_button(&self, device: DeviceId, button: ButtonId) -> bool;

    /// Raw axis sample in `i16::MIN..=i16::MAX`.
    fn axis(&self, device: DeviceId, axis: AxisId) -> i16;

    fn has_axis(&self, device: DeviceId, axis: AxisId) -> bool;

    fn instance_id(&self, _device: DeviceId) -> Option<i32> {
        None
    }

    fn player_index(&self, _device: DeviceId) -> Option<i32> {
        None
    }

    fn set_player_index(&mut self, _device: DeviceId, _index: i32) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("player index".to_string()))
    }

    fn power_level(&self, _device: DeviceId) -> PowerLevel {
        PowerLevel::Unknown
    }

    fn touchpad_count(&self, _device: DeviceId) -> usize {
        0
    }

    fn touchpad_finger(&self, _device: DeviceId, _finger: u32) -> Option<TouchReading> {
        None
    }

    /// Enables accelerometer and gyroscope together; false if either is missing.
    fn enable_motion_sensors(&mut self, _device: DeviceId) -> bool {
        false
    }

    fn motion_reading(&self, _device: DeviceId) -> Option<MotionReading> {
        None
    }

    fn has_rumble(&self, _device: DeviceId) -> bool {
        false
    }

    fn rumble(
        &mut self,
        _device: DeviceId,
        _low_frequency: u16,
        _high_frequency: u16,
        _duration_ms: u32,
    ) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("rumble".to_string()))
    }

    /// Sends a raw effects report to the device.
    fn send_effect(&mut self, _device: DeviceId, _report: &[u8]) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("effect reports".to_string()))
    }

    /// Names of the available audio output devices.
    fn audio_output_devices(&self) -> Vec<String> {
        Vec::new()
    }

    fn open_audio_output(
        &mut self,
        device_name: &str,
        _spec: &AudioSpec,
    ) -> Result<Box<dyn AudioSink>, BackendError> {
        Err(BackendError::NotSupported(format!(
            "audio output '{}'",
            device_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_device_id() {
        assert!(DeviceId::new(0).is_none());
        assert_eq!(DeviceId::new(7).map(DeviceId::get), Some(7));
    }
}
