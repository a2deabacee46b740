//! Adaptive trigger effects and the DualSense effects report
//!
//! The report is a fixed 47-byte layout. Only the enable bits and the two trigger programs
//! are written; every other field stays zero so the controller leaves it untouched.
//!
//! ```text
//! 0  enable bits 1        10 right trigger (type + 10 params)
//! 1  enable bits 2        21 left trigger  (type + 10 params)
//! 2  rumble right         32 reserved (6)
//! 3  rumble left          38 LED flags
//! 4  headphone volume     39 reserved (2)
//! 5  speaker volume       41 LED animation
//! 6  mic volume           42 LED brightness
//! 7  audio enable bits    43 pad lights
//! 8  mic light mode       44 LED red / green / blue
//! 9  audio mute bits
//! ```

use std::fmt;

use thiserror::Error;

/// Size of the effects report in bytes.
pub const EFFECTS_REPORT_LEN: usize = 47;

/// Maximum number of parameter bytes in one trigger program.
pub const TRIGGER_PARAMS_LEN: usize = 10;

// Enable bits 1
pub const ENABLE_RIGHT_TRIGGER_EFFECT: u8 = 0x04;
pub const ENABLE_LEFT_TRIGGER_EFFECT: u8 = 0x08;

// Field offsets
const OFFSET_ENABLE_BITS_1: usize = 0;
const OFFSET_ENABLE_BITS_2: usize = 1;
const OFFSET_RUMBLE_RIGHT: usize = 2;
const OFFSET_RUMBLE_LEFT: usize = 3;
const OFFSET_HEADPHONE_VOLUME: usize = 4;
const OFFSET_SPEAKER_VOLUME: usize = 5;
const OFFSET_MIC_VOLUME: usize = 6;
const OFFSET_AUDIO_ENABLE_BITS: usize = 7;
const OFFSET_MIC_LIGHT_MODE: usize = 8;
const OFFSET_AUDIO_MUTE_BITS: usize = 9;
pub const OFFSET_RIGHT_TRIGGER: usize = 10;
pub const OFFSET_LEFT_TRIGGER: usize = 21;
const OFFSET_LED_FLAGS: usize = 38;
const OFFSET_LED_ANIM: usize = 41;
const OFFSET_LED_BRIGHTNESS: usize = 42;
const OFFSET_PAD_LIGHTS: usize = 43;
const OFFSET_LED_RGB: usize = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSide {
    Left,
    Right,
}

impl fmt::Display for TriggerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSide::Left => write!(f, "left"),
            TriggerSide::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerEffectError {
    #[error("{side} trigger parameter block is {len} bytes, at most 10 are allowed")]
    ParameterBlockTooLong { side: TriggerSide, len: usize },
}

/// One trigger program: an effect type byte followed by up to ten parameter bytes.
///
/// Unused parameter bytes are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerEffect {
    effect_type: u8,
    params: [u8; TRIGGER_PARAMS_LEN],
}

impl TriggerEffect {
    /// The all-zero program. Sent when a session closes with an effect still active.
    pub const NEUTRAL: TriggerEffect = TriggerEffect {
        effect_type: 0,
        params: [0; TRIGGER_PARAMS_LEN],
    };

    /// Builds a raw program for `side`; fails if `params` is longer than ten bytes.
    pub fn new(
        side: TriggerSide,
        effect_type: u8,
        params: &[u8],
    ) -> Result<Self, TriggerEffectError> {
        let slot = [0u8; TRIGGER_PARAMS_LEN];
        if params.len() > slot.len() {
            return Err(TriggerEffectError::ParameterBlockTooLong {
                side,
                len: params.len(),
            });
        }
        let mut effect = Self {
            effect_type,
            params: slot,
        };
        effect.params[..params.len()].copy_from_slice(params);
        Ok(effect)
    }

    /// Switches resistance off on the controller side.
    pub fn off() -> Self {
        Self::fixed(0x05, &[])
    }

    /// Constant resistance from `start` onwards.
    pub fn continuous(start: u8, force: u8) -> Self {
        Self::fixed(0x01, &[start, force])
    }

    /// Resistance between `start` and `end`.
    pub fn section(start: u8, end: u8, force: u8) -> Self {
        Self::fixed(0x02, &[start, end, force])
    }

    /// Vibrating trigger past `position`.
    pub fn vibration(position: u8, amplitude: u8, frequency: u8) -> Self {
        Self::fixed(0x06, &[position, amplitude, frequency])
    }

    /// Weapon-like click between `start` and `end`.
    pub fn weapon(start: u8, end: u8, force: u8) -> Self {
        Self::fixed(0x26, &[start, end, force])
    }

    fn fixed(effect_type: u8, params: &[u8]) -> Self {
        let mut effect = Self {
            effect_type,
            params: [0; TRIGGER_PARAMS_LEN],
        };
        for (dst, src) in effect.params.iter_mut().zip(params) {
            *dst = *src;
        }
        effect
    }

    pub fn effect_type(&self) -> u8 {
        self.effect_type
    }

    pub fn params(&self) -> &[u8; TRIGGER_PARAMS_LEN] {
        &self.params
    }

    /// True for the all-zero program.
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    fn write_to(&self, out: &mut [u8]) {
        if let Some((ty, params)) = out.split_first_mut() {
            *ty = self.effect_type;
            for (dst, src) in params.iter_mut().zip(self.params.iter()) {
                *dst = *src;
            }
        }
    }
}

/// Field-level view of the effects report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectsReport {
    pub enable_bits_1: u8,
    pub enable_bits_2: u8,
    pub rumble_right: u8,
    pub rumble_left: u8,
    pub headphone_volume: u8,
    pub speaker_volume: u8,
    pub mic_volume: u8,
    pub audio_enable_bits: u8,
    pub mic_light_mode: u8,
    pub audio_mute_bits: u8,
    pub right_trigger: TriggerEffect,
    pub left_trigger: TriggerEffect,
    pub led_flags: u8,
    pub led_anim: u8,
    pub led_brightness: u8,
    pub pad_lights: u8,
    pub led_rgb: [u8; 3],
}

impl EffectsReport {
    /// Serialises into the wire layout; reserved bytes are zero.
    pub fn to_bytes(&self) -> [u8; EFFECTS_REPORT_LEN] {
        let mut out = [0u8; EFFECTS_REPORT_LEN];
        out[OFFSET_ENABLE_BITS_1] = self.enable_bits_1;
        out[OFFSET_ENABLE_BITS_2] = self.enable_bits_2;
        out[OFFSET_RUMBLE_RIGHT] = self.rumble_right;
        out[OFFSET_RUMBLE_LEFT] = self.rumble_left;
        out[OFFSET_HEADPHONE_VOLUME] = self.headphone_volume;
        out[OFFSET_SPEAKER_VOLUME] = self.speaker_volume;
        out[OFFSET_MIC_VOLUME] = self.mic_volume;
        out[OFFSET_AUDIO_ENABLE_BITS] = self.audio_enable_bits;
        out[OFFSET_MIC_LIGHT_MODE] = self.mic_light_mode;
        out[OFFSET_AUDIO_MUTE_BITS] = self.audio_mute_bits;
        self.right_trigger
            .write_to(&mut out[OFFSET_RIGHT_TRIGGER..OFFSET_LEFT_TRIGGER]);
        self.left_trigger
            .write_to(&mut out[OFFSET_LEFT_TRIGGER..OFFSET_LEFT_TRIGGER + 1 + TRIGGER_PARAMS_LEN]);
        out[OFFSET_LED_FLAGS] = self.led_flags;
        out[OFFSET_LED_ANIM] = self.led_anim;
        out[OFFSET_LED_BRIGHTNESS] = self.led_brightness;
        out[OFFSET_PAD_LIGHTS] = self.pad_lights;
        out[OFFSET_LED_RGB..].copy_from_slice(&self.led_rgb);
        out
    }
}

/// Builds effects reports carrying both trigger programs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEffectEncoder;

impl TriggerEffectEncoder {
    pub fn encode(left: &TriggerEffect, right: &TriggerEffect) -> [u8; EFFECTS_REPORT_LEN] {
        EffectsReport {
            enable_bits_1: ENABLE_RIGHT_TRIGGER_EFFECT | ENABLE_LEFT_TRIGGER_EFFECT,
            right_trigger: *right,
            left_trigger: *left,
            ..EffectsReport::default()
        }
        .to_bytes()
    }

    /// Encodes raw type/parameter pairs, rejecting parameter blocks over ten bytes.
    pub fn encode_raw(
        left_type: u8,
        left_params: &[u8],
        right_type: u8,
        right_params: &[u8],
    ) -> Result<[u8; EFFECTS_REPORT_LEN], TriggerEffectError> {
        let left = TriggerEffect::new(TriggerSide::Left, left_type, left_params)?;
        let right = TriggerEffect::new(TriggerSide::Right, right_type, right_params)?;
        Ok(Self::encode(&left, &right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn left_and_right_programs_land_at_their_offsets() {
        let report = TriggerEffectEncoder::encode_raw(5, &[0xAA, 0xBB, 0xCC], 2, &[]).unwrap();

        assert_eq!(report.len(), 47);
        assert_eq!(report[0], 0x0C);
        assert_eq!(report[21], 5);
        assert_eq!(&report[22..25], &[0xAA, 0xBB, 0xCC]);
        assert!(report[25..32].iter().all(|b| *b == 0));
        assert_eq!(report[10], 2);
        assert!(report[11..21].iter().all(|b| *b == 0));
        assert!(report[32..].iter().all(|b| *b == 0));
        assert!(report[1..10].iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_parameter_block_is_rejected() {
        let err = TriggerEffectEncoder::encode_raw(1, &[0; 11], 0, &[]).unwrap_err();
        assert_eq!(
            err,
            TriggerEffectError::ParameterBlockTooLong {
                side: TriggerSide::Left,
                len: 11
            }
        );
        let err = TriggerEffectEncoder::encode_raw(0, &[], 1, &[0; 12]).unwrap_err();
        assert!(matches!(
            err,
            TriggerEffectError::ParameterBlockTooLong {
                side: TriggerSide::Right,
                ..
            }
        ));
    }

    #[test]
    fn neutral_effect_clears_both_triggers() {
        let report = TriggerEffectEncoder::encode(&TriggerEffect::NEUTRAL, &TriggerEffect::NEUTRAL);
        assert_eq!(report[0], 0x0C);
        assert!(report[1..].iter().all(|b| *b == 0));
        assert!(TriggerEffect::NEUTRAL.is_neutral());
        assert!(!TriggerEffect::off().is_neutral());
    }

    #[test]
    fn presets_fill_leading_parameters() {
        let effect = TriggerEffect::section(10, 200, 255);
        assert_eq!(effect.effect_type(), 0x02);
        assert_eq!(&effect.params()[..4], &[10, 200, 255, 0]);
    }

    #[test]
    fn led_fields_follow_layout() {
        let report = EffectsReport {
            led_flags: 1,
            led_anim: 2,
            led_brightness: 3,
            pad_lights: 4,
            led_rgb: [5, 6, 7],
            ..EffectsReport::default()
        }
        .to_bytes();
        assert_eq!(&report[38..47], &[1, 0, 0, 2, 3, 4, 5, 6, 7]);
    }

    proptest! {
        #[test]
        fn prop_programs_never_touch_other_fields(
            left_type in any::<u8>(),
            left in proptest::collection::vec(any::<u8>(), 0..=10),
            right_type in any::<u8>(),
            right in proptest::collection::vec(any::<u8>(), 0..=10),
        ) {
            let report =
                TriggerEffectEncoder::encode_raw(left_type, &left, right_type, &right).unwrap();
            prop_assert_eq!(report[0], 0x0C);
            prop_assert!(report[1..10].iter().all(|b| *b == 0));
            prop_assert!(report[32..].iter().all(|b| *b == 0));
            prop_assert_eq!(report[10], right_type);
            prop_assert_eq!(&report[11..11 + right.len()], right.as_slice());
            prop_assert_eq!(report[21], left_type);
            prop_assert_eq!(&report[22..22 + left.len()], left.as_slice());
        }
    }
}
