//! 3 kHz stereo haptics to 48 kHz four-channel audio
//!
//! Every input frame is remixed into a four-channel frame with the two leading channels
//! silent and the submitted pair in channels 2 and 3, then upsampled 16x by linear
//! interpolation from the previous frame. The previous frame and any incomplete trailing
//! frame are carried across calls, so feeding many small packets yields the same stream as
//! one large packet.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sample rate of the packets applications submit.
pub const HAPTIC_INPUT_RATE: u32 = 3_000;
/// Sample rate of the haptic audio channel.
pub const HAPTIC_OUTPUT_RATE: u32 = 48_000;
/// Output frames generated per input frame.
pub const RATE_RATIO: usize = (HAPTIC_OUTPUT_RATE / HAPTIC_INPUT_RATE) as usize;
/// Channels in the output stream.
pub const OUTPUT_CHANNELS: usize = 4;

const SAMPLE_BYTES: usize = 2;
const OUTPUT_FRAME_BYTES: usize = OUTPUT_CHANNELS * SAMPLE_BYTES;

/// Channel layout of submitted haptic packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticInputLayout {
    /// Interleaved left/right samples
    #[default]
    Stereo,
    /// One sample per frame, duplicated into both haptic channels
    Mono,
}

impl HapticInputLayout {
    /// Bytes per input frame.
    pub fn frame_bytes(&self) -> usize {
        match self {
            HapticInputLayout::Stereo => 2 * SAMPLE_BYTES,
            HapticInputLayout::Mono => SAMPLE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HapticAudioResampler {
    layout: HapticInputLayout,
    previous: [i16; OUTPUT_CHANNELS],
    pending: Vec<u8>,
}

impl HapticAudioResampler {
    pub fn new(layout: HapticInputLayout) -> Self {
        Self {
            layout,
            previous: [0; OUTPUT_CHANNELS],
            pending: Vec::new(),
        }
    }

    pub fn layout(&self) -> HapticInputLayout {
        self.layout
    }

    /// Size in bytes of the output produced for `input_len` input bytes.
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len / self.layout.frame_bytes()) * RATE_RATIO * OUTPUT_FRAME_BYTES
    }

    /// Bytes of an incomplete frame held back for the next packet.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forgets the carried frame and any held bytes so the next packet starts from silence.
    pub fn reset(&mut self) {
        self.previous = [0; OUTPUT_CHANNELS];
        self.pending.clear();
    }

    /// Converts one packet of little-endian PCM. A trailing partial frame is held back and
    /// completed by the next packet.
    pub fn process(&mut self, input: &[u8]) -> Vec<u8> {
        let frame_bytes = self.layout.frame_bytes();
        let mut out = Vec::with_capacity(self.output_len(self.pending.len() + input.len()));
        let mut rest = input;

        if !self.pending.is_empty() {
            let take = (frame_bytes - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() < frame_bytes {
                return out;
            }
            let frame = std::mem::take(&mut self.pending);
            self.push_frame(&frame, &mut out);
        }

        let mut frames = rest.chunks_exact(frame_bytes);
        for frame in &mut frames {
            self.push_frame(frame, &mut out);
        }
        let tail = frames.remainder();
        if !tail.is_empty() {
            debug!("Holding {} bytes of incomplete haptic frame", tail.len());
            self.pending.extend_from_slice(tail);
        }
        out
    }

    fn push_frame(&mut self, frame: &[u8], out: &mut Vec<u8>) {
        let current = self.remix(frame);
        for step in 1..=RATE_RATIO {
            for (prev, cur) in self.previous.iter().zip(current.iter()) {
                let sample = interpolate(*prev, *cur, step);
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        self.previous = current;
    }

    fn remix(&self, frame: &[u8]) -> [i16; OUTPUT_CHANNELS] {
        let sample = |i: usize| {
            frame
                .get(i * SAMPLE_BYTES..(i + 1) * SAMPLE_BYTES)
                .map_or(0, |b| i16::from_le_bytes([b[0], b[1]]))
        };
        match self.layout {
            HapticInputLayout::Stereo => [0, 0, sample(0), sample(1)],
            HapticInputLayout::Mono => {
                let s = sample(0);
                [0, 0, s, s]
            }
        }
    }
}

// Value `step` sixteenths of the way from `from` to `to`
fn interpolate(from: i16, to: i16, step: usize) -> i16 {
    let from = i32::from(from);
    let to = i32::from(to);
    let value = from + (to - from) * step as i32 / RATE_RATIO as i32;
    value as i16
}
