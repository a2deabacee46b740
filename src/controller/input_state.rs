//! Button edge tracking and analog scaling
//!
//! Pure state and pure functions; the session feeds them backend samples.

use super::error::SessionError;
use super::types::ButtonId;

/// Largest positive raw axis sample, used as the normalisation divisor.
pub const AXIS_MAX_VAL: f32 = 32767.0;

/// Largest motor intensity accepted by the backend.
pub const MOTOR_MAX: f32 = 65535.0;

// Result of feeding one button sample to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonSample {
    pub held: bool,
    pub just_pressed: bool,
}

/// Per-button held / just-pressed state.
///
/// Edges are relative to the previous sample of the same button, not to wall-clock time,
/// so `just_pressed` only becomes meaningful once a button has been sampled at least once.
/// The arrays are sized for every [`ButtonId`] and never change length.
#[derive(Debug, Clone)]
pub struct InputStateTracker {
    held: [bool; ButtonId::COUNT],
    just_pressed: [bool; ButtonId::COUNT],
}

impl Default for InputStateTracker {
    fn default() -> Self {
        Self {
            held: [false; ButtonId::COUNT],
            just_pressed: [false; ButtonId::COUNT],
        }
    }
}

impl InputStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current raw state of `button` and derives its edge.
    pub fn update(&mut self, button: ButtonId, pressed: bool) -> ButtonSample {
        let idx = button.index();
        let just_pressed = pressed && !self.held[idx];
        self.just_pressed[idx] = just_pressed;
        self.held[idx] = pressed;
        ButtonSample {
            held: pressed,
            just_pressed,
        }
    }

    pub fn held(&self, button: ButtonId) -> bool {
        self.held[button.index()]
    }

    pub fn just_pressed(&self, button: ButtonId) -> bool {
        self.just_pressed[button.index()]
    }

    /// Forgets every sample, as after a reconnect.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Maps a raw signed 16-bit axis sample onto roughly `[-1.0, 1.0]`.
///
/// Not clamped: the raw range is asymmetric, so `i16::MIN` lands slightly below `-1.0`.
pub fn normalize_axis(raw: i16) -> f32 {
    f32::from(raw) / AXIS_MAX_VAL
}

/// Scales a rumble magnitude in `[0.0, 1.0]` to a motor intensity in `0..=65535`.
///
/// The product is truncated toward zero, so `0.5` maps to `32767`. Values outside the
/// range (and NaN) are rejected rather than clamped.
pub fn scale_vibration(magnitude: f32) -> Result<u16, SessionError> {
    if !(0.0..=1.0).contains(&magnitude) {
        return Err(SessionError::InvalidArgument(format!(
            "vibration magnitude {} is not in the range 0 to 1",
            magnitude
        )));
    }
    Ok((MOTOR_MAX * magnitude) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn button(index: u8) -> ButtonId {
        ButtonId::new(index).unwrap()
    }

    #[test]
    fn just_pressed_only_on_rising_edge() {
        let mut tracker = InputStateTracker::new();
        let b = button(0);

        assert!(!tracker.just_pressed(b));
        assert_eq!(
            tracker.update(b, true),
            ButtonSample {
                held: true,
                just_pressed: true
            }
        );
        assert_eq!(
            tracker.update(b, true),
            ButtonSample {
                held: true,
                just_pressed: false
            }
        );
        assert!(!tracker.update(b, false).just_pressed);
        assert!(tracker.update(b, true).just_pressed);
    }

    #[test]
    fn buttons_are_tracked_independently() {
        let mut tracker = InputStateTracker::new();
        tracker.update(button(1), true);
        assert!(tracker.update(button(2), true).just_pressed);
        assert!(tracker.held(button(1)));
        assert!(!tracker.held(button(3)));

        tracker.reset();
        assert!(!tracker.held(button(1)));
        assert!(tracker.update(button(1), true).just_pressed);
    }

    #[test]
    fn axis_scaling_matches_documented_points() {
        assert_eq!(normalize_axis(32767), 1.0);
        assert_eq!(normalize_axis(0), 0.0);
        assert!(normalize_axis(-32768) < -1.0);
    }

    #[test]
    fn vibration_scaling_truncates() {
        assert_eq!(scale_vibration(0.0).unwrap(), 0);
        assert_eq!(scale_vibration(1.0).unwrap(), 65535);
        assert_eq!(scale_vibration(0.5).unwrap(), 32767);
    }

    #[test]
    fn vibration_out_of_range_is_rejected() {
        for bad in [-0.1, 1.1, f32::NAN] {
            assert!(matches!(
                scale_vibration(bad),
                Err(SessionError::InvalidArgument(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_edge_law(samples in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut tracker = InputStateTracker::new();
            let b = button(4);
            let mut previous = false;
            for pressed in samples {
                let sample = tracker.update(b, pressed);
                prop_assert_eq!(sample.just_pressed, pressed && !previous);
                prop_assert_eq!(sample.held, pressed);
                previous = pressed;
            }
        }

        #[test]
        fn prop_axis_is_linear(raw in any::<i16>()) {
            let value = normalize_axis(raw);
            prop_assert!((value * AXIS_MAX_VAL - f32::from(raw)).abs() < 0.01);
            if raw > i16::MIN {
                prop_assert!((-1.0..=1.0).contains(&value));
            }
        }

        #[test]
        fn prop_vibration_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(scale_vibration(lo).unwrap() <= scale_vibration(hi).unwrap());
        }
    }
}
