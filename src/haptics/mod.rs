//! Audio haptics for DualSense controllers
//!
//! 1. [`handshake`] - timed, at-most-twice attempt to open the controller's audio output
//! 2. [`resampler`] - 3 kHz stereo packets to the 48 kHz four-channel output format
//!
//! A session owns one [`HapticsChannel`] behind a mutex shared with its handshake task.
//! The channel holds the audio sink once negotiated; closing the session cancels the task
//! and drops the sink under the same lock.

pub mod handshake;
pub mod resampler;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::AudioSink;
use resampler::{HapticAudioResampler, HapticInputLayout};

pub type SharedChannel = Arc<Mutex<HapticsChannel>>;

/// Most recent backend error observed by a session, readable on demand.
pub type LastError = Arc<Mutex<Option<String>>>;

/// Observable state of the haptics negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticsStatus {
    /// Not requested, or not applicable to this device
    Disabled,
    /// Handshake scheduled; `attempt` is 0 for the first try and 1 for the retry
    Pending { attempt: u8 },
    Connected,
    /// Both attempts failed; no further retries for this connection
    Failed,
    /// Session closed before the handshake completed
    Cancelled,
}

pub struct HapticsChannel {
    status: HapticsStatus,
    sink: Option<Box<dyn AudioSink>>,
    resampler: HapticAudioResampler,
    cancel: Option<CancellationToken>,
}

impl HapticsChannel {
    pub fn new(layout: HapticInputLayout) -> Self {
        Self {
            status: HapticsStatus::Disabled,
            sink: None,
            resampler: HapticAudioResampler::new(layout),
            cancel: None,
        }
    }

    pub fn shared(layout: HapticInputLayout) -> SharedChannel {
        Arc::new(Mutex::new(Self::new(layout)))
    }

    pub fn status(&self) -> HapticsStatus {
        self.status
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Marks a handshake as scheduled under `token`.
    pub(crate) fn begin(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
        self.status = HapticsStatus::Pending { attempt: 0 };
    }

    pub(crate) fn set_status(&mut self, status: HapticsStatus) {
        self.status = status;
    }

    pub(crate) fn attach_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.resampler.reset();
        self.sink = Some(sink);
        self.status = HapticsStatus::Connected;
        self.cancel = None;
    }

    /// Cancels a pending handshake and releases the sink.
    pub(crate) fn shutdown(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if self.sink.take().is_some() {
            debug!("Released haptic audio sink");
        }
        self.status = match self.status {
            HapticsStatus::Pending { .. } => HapticsStatus::Cancelled,
            HapticsStatus::Connected => HapticsStatus::Disabled,
            other => other,
        };
    }

    /// Resamples `pcm` and queues it on the sink.
    ///
    /// Returns false without touching any state when no sink is open, and false after
    /// recording the error when the sink rejects the packet. Bytes of an incomplete frame
    /// count as accepted; they are held and sent with the next packet.
    pub(crate) fn send(&mut self, pcm: &[u8], last_error: &LastError) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            debug!("No haptic audio sink open, dropping packet");
            return false;
        };
        let converted = self.resampler.process(pcm);
        if converted.is_empty() {
            return true;
        }
        match sink.queue(&converted) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to queue haptic audio: {}", e);
                *last_error.lock() = Some(e.to_string());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    struct RecordingSink(Arc<Mutex<Vec<usize>>>);

    impl AudioSink for RecordingSink {
        fn queue(&mut self, pcm: &[u8]) -> Result<(), BackendError> {
            self.0.lock().push(pcm.len());
            Ok(())
        }
    }

    #[test]
    fn send_without_sink_has_no_side_effects() {
        let mut channel = HapticsChannel::new(HapticInputLayout::Stereo);
        let last_error = LastError::default();
        assert!(!channel.send(&[0; 40], &last_error));
        assert!(last_error.lock().is_none());
        assert_eq!(channel.status(), HapticsStatus::Disabled);
    }

    #[test]
    fn sink_receives_resampled_packets_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = HapticsChannel::new(HapticInputLayout::Stereo);
        channel.attach_sink(Box::new(RecordingSink(Arc::clone(&log))));
        let last_error = LastError::default();

        assert!(channel.send(&[0; 40], &last_error));
        assert!(channel.send(&[0; 4], &last_error));
        assert!(channel.send(&[], &last_error));
        assert_eq!(*log.lock(), vec![1280, 128]);
    }

    #[test]
    fn split_frame_is_queued_once_complete() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = HapticsChannel::new(HapticInputLayout::Stereo);
        channel.attach_sink(Box::new(RecordingSink(Arc::clone(&log))));
        let last_error = LastError::default();

        assert!(channel.send(&[0; 3], &last_error));
        assert!(log.lock().is_empty());
        assert!(channel.send(&[0; 5], &last_error));
        assert_eq!(*log.lock(), vec![256]);
        assert!(last_error.lock().is_none());
    }

    #[test]
    fn shutdown_cancels_pending_handshake() {
        let token = CancellationToken::new();
        let mut channel = HapticsChannel::new(HapticInputLayout::Stereo);
        channel.begin(token.clone());
        channel.shutdown();
        assert!(token.is_cancelled());
        assert_eq!(channel.status(), HapticsStatus::Cancelled);
    }
}
