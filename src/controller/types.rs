//! Value types shared between sessions, backends and callers.

use serde::{Deserialize, Serialize};

/// Sony vendor id
pub const SONY_VENDOR_ID: u16 = 0x054C;
/// DualSense product id
pub const DUALSENSE_PRODUCT_ID: u16 = 0x0CE6;
/// DualSense Edge product id
pub const DUALSENSE_EDGE_PRODUCT_ID: u16 = 0x0DF2;

/// Opaque button identifier.
///
/// The identifier set is finite and fixed; indices follow the backend's own button
/// ordering. Out-of-range indices cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ButtonId(u8);

impl ButtonId {
    /// Number of distinct button identifiers.
    pub const COUNT: usize = 21;

    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::COUNT).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = ButtonId> {
        (0..Self::COUNT as u8).map(ButtonId)
    }
}

/// Opaque axis identifier, same conventions as [`ButtonId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AxisId(u8);

impl AxisId {
    /// Number of distinct axis identifiers.
    pub const COUNT: usize = 6;

    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::COUNT).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = AxisId> {
        (0..Self::COUNT as u8).map(AxisId)
    }
}

/// Accelerometer and gyroscope data of a controller.
///
/// A session keeps exactly one of these and overwrites it in place on every
/// successful sensor query. Copy it to keep a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// Microseconds since the Unix epoch at which the reading was taken. Within a session
    /// the value never decreases, even if the system clock is adjusted.
    pub timestamp_us: i64,
}

impl SensorState {
    pub(crate) fn update(&mut self, accel: [f32; 3], gyro: [f32; 3], timestamp_us: i64) {
        let [accel_x, accel_y, accel_z] = accel;
        let [gyro_x, gyro_y, gyro_z] = gyro;
        *self = Self {
            accel_x,
            accel_y,
            accel_z,
            gyro_x,
            gyro_y,
            gyro_z,
            timestamp_us,
        };
    }
}

/// Position of one finger on the touchpad.
///
/// Cached per finger index by the session and mutated in place on each query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchState {
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

impl TouchState {
    pub(crate) fn update(&mut self, pressed: bool, x: f32, y: f32) {
        self.pressed = pressed;
        self.x = x;
        self.y = y;
    }
}

// Power level as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerLevel {
    #[default]
    Unknown,
    Empty,
    Low,
    Medium,
    Full,
    Wired,
    Max,
}

impl PowerLevel {
    /// Maps the backend's numeric power level (-1..=5) onto the enum.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PowerLevel::Empty,
            1 => PowerLevel::Low,
            2 => PowerLevel::Medium,
            3 => PowerLevel::Full,
            4 => PowerLevel::Wired,
            5 => PowerLevel::Max,
            _ => PowerLevel::Unknown,
        }
    }
}

/// Device families with dedicated feature support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceFamily {
    DualSense,
    DualSenseEdge,
    Generic,
}

impl DeviceFamily {
    pub fn from_vendor_product(vendor_id: u16, product_id: u16) -> Self {
        match (vendor_id, product_id) {
            (SONY_VENDOR_ID, DUALSENSE_PRODUCT_ID) => Self::DualSense,
            (SONY_VENDOR_ID, DUALSENSE_EDGE_PRODUCT_ID) => Self::DualSenseEdge,
            _ => Self::Generic,
        }
    }

    /// Adaptive triggers and audio haptics are only available on DualSense pads.
    pub fn is_dualsense(&self) -> bool {
        matches!(self, Self::DualSense | Self::DualSenseEdge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_out_of_range_indices() {
        assert!(ButtonId::new(20).is_some());
        assert!(ButtonId::new(21).is_none());
        assert!(AxisId::new(5).is_some());
        assert!(AxisId::new(6).is_none());
        assert_eq!(ButtonId::all().count(), ButtonId::COUNT);
        assert_eq!(AxisId::all().count(), AxisId::COUNT);
    }

    #[test]
    fn dualsense_family_is_recognised_by_ids() {
        assert_eq!(
            DeviceFamily::from_vendor_product(0x054C, 0x0CE6),
            DeviceFamily::DualSense
        );
        assert_eq!(
            DeviceFamily::from_vendor_product(0x054C, 0x0DF2),
            DeviceFamily::DualSenseEdge
        );
        // DualShock 4 shares the vendor but not the feature set
        assert_eq!(
            DeviceFamily::from_vendor_product(0x054C, 0x09CC),
            DeviceFamily::Generic
        );
        assert!(!DeviceFamily::Generic.is_dualsense());
    }

    #[test]
    fn power_level_maps_raw_values() {
        assert_eq!(PowerLevel::from_raw(-1), PowerLevel::Unknown);
        assert_eq!(PowerLevel::from_raw(3), PowerLevel::Full);
        assert_eq!(PowerLevel::from_raw(5), PowerLevel::Max);
        assert_eq!(PowerLevel::from_raw(42), PowerLevel::Unknown);
    }
}
