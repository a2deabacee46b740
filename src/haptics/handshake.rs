//! Haptics handshake - timed negotiation of the DualSense audio output
//!
//! The controller's audio interface usually enumerates some time after the pad itself, so
//! the handshake waits before looking for it and retries once after a longer pause:
//!
//! ```text
//! Idle ──schedule──► ProbeScheduled(0) ──fail──► ProbeScheduled(1) ──fail──► Failed
//!                          │                          │
//!                          └────────ok────────────────┴──────ok──────► Connected
//! ```
//!
//! Each probe runs under the session's haptics-channel lock and first re-checks the
//! cancellation token, so a probe can never observe a half-closed session. If the device
//! was unplugged in the meantime the probe aborts without changing any state.

use std::time::Duration;

use statum::{machine, state, transition};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{HapticsStatus, LastError, SharedChannel};
use crate::backend::{
    AudioSink, BackendError, ControllerBackend, DeviceId, SharedBackend, HAPTIC_AUDIO_SPEC,
};

/// Audio device name fragment identifying the controller's output on this platform.
pub const HAPTIC_DEVICE_HINT: &str = if cfg!(any(target_os = "windows", target_os = "macos")) {
    "Wireless Controller"
} else {
    "DualSense"
};

// Delays before the first probe and before the single retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeDelays {
    pub initial: Duration,
    pub retry: Duration,
}

impl Default for HandshakeDelays {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1_000),
            retry: Duration::from_millis(10_000),
        }
    }
}

// One scheduled probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub attempt: u8,
    pub delay: Duration,
}

#[state]
pub enum HandshakeState {
    Idle,
    ProbeScheduled(ProbeAttempt),
    Connected,
    Failed,
}

#[machine]
pub struct HapticsHandshake<HandshakeState> {
    slot: u32,
    delays: HandshakeDelays,
}

/// Result of resolving a scheduled probe.
pub enum ProbeOutcome {
    Opened(HapticsHandshake<Connected>, Box<dyn AudioSink>),
    Retry(HapticsHandshake<ProbeScheduled>, BackendError),
    GaveUp(HapticsHandshake<Failed>, BackendError),
}

impl HapticsHandshake<Idle> {
    pub fn create(slot: u32, delays: HandshakeDelays) -> Self {
        HapticsHandshake::<Idle>::builder()
            .slot(slot)
            .delays(delays)
            .build()
    }
}

#[transition]
impl HapticsHandshake<Idle> {
    /// Schedules the first probe after the initial delay.
    pub fn schedule(self) -> HapticsHandshake<ProbeScheduled> {
        let first = ProbeAttempt {
            attempt: 0,
            delay: self.delays.initial,
        };
        self.transition_with(first)
    }
}

#[transition]
impl HapticsHandshake<ProbeScheduled> {
    fn connect(self) -> HapticsHandshake<Connected> {
        self.transition()
    }

    fn reschedule(self) -> HapticsHandshake<ProbeScheduled> {
        let retry = ProbeAttempt {
            attempt: 1,
            delay: self.delays.retry,
        };
        self.transition_with(retry)
    }

    fn give_up(self) -> HapticsHandshake<Failed> {
        self.transition()
    }
}

impl HapticsHandshake<ProbeScheduled> {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn attempt(&self) -> ProbeAttempt {
        self.state_data
    }

    /// Applies the result of a probe: success connects, the first failure schedules the
    /// retry, the second failure is terminal.
    pub fn resolve(self, probe: Result<Box<dyn AudioSink>, BackendError>) -> ProbeOutcome {
        let current = self.attempt();
        match probe {
            Ok(sink) => ProbeOutcome::Opened(self.connect(), sink),
            Err(err) if current.attempt == 0 => ProbeOutcome::Retry(self.reschedule(), err),
            Err(err) => ProbeOutcome::GaveUp(self.give_up(), err),
        }
    }
}

/// Everything the handshake task needs from its session.
pub(crate) struct HandshakeContext<B: ControllerBackend> {
    pub slot: u32,
    pub device: DeviceId,
    pub backend: SharedBackend<B>,
    pub channel: SharedChannel,
    pub last_error: LastError,
    pub token: CancellationToken,
}

/// Spawns the handshake on `runtime`. The task ends on success, terminal failure,
/// cancellation or when the device is gone.
pub(crate) fn spawn_handshake<B: ControllerBackend>(
    runtime: &Handle,
    ctx: HandshakeContext<B>,
    delays: HandshakeDelays,
) -> JoinHandle<()> {
    debug!(
        "Scheduling haptics handshake for slot {} in {:?}",
        ctx.slot, delays.initial
    );
    runtime.spawn(run_handshake(ctx, delays))
}

async fn run_handshake<B: ControllerBackend>(ctx: HandshakeContext<B>, delays: HandshakeDelays) {
    let mut machine = HapticsHandshake::create(ctx.slot, delays).schedule();
    loop {
        let attempt = machine.attempt();
        tokio::select! {
            _ = ctx.token.cancelled() => {
                debug!("Haptics handshake for slot {} cancelled", ctx.slot);
                return;
            }
            _ = tokio::time::sleep(attempt.delay) => {}
        }
        match fire(&ctx, machine) {
            Some(next) => machine = next,
            None => return,
        }
    }
}

// Runs one probe; returns the rescheduled machine if a retry is due.
fn fire<B: ControllerBackend>(
    ctx: &HandshakeContext<B>,
    machine: HapticsHandshake<ProbeScheduled>,
) -> Option<HapticsHandshake<ProbeScheduled>> {
    let mut channel = ctx.channel.lock();
    if ctx.token.is_cancelled() {
        debug!("Haptics handshake for slot {} fired after close", ctx.slot);
        return None;
    }

    let probe = {
        let mut backend = ctx.backend.lock();
        if !backend.is_attached(ctx.device) {
            debug!(
                "Controller at slot {} is gone, skipping haptics handshake",
                ctx.slot
            );
            return None;
        }
        if channel.has_sink() {
            debug!("Haptic audio already open for slot {}", ctx.slot);
            return None;
        }
        open_haptic_sink(&mut *backend)
    };

    match machine.resolve(probe) {
        ProbeOutcome::Opened(done, sink) => {
            info!("Haptic audio connected for slot {}", done.slot);
            channel.attach_sink(sink);
            None
        }
        ProbeOutcome::Retry(next, err) => {
            let retry = next.attempt();
            warn!(
                "Haptics handshake for slot {} failed ({}), retrying in {:?}",
                next.slot(),
                err,
                retry.delay
            );
            channel.set_status(HapticsStatus::Pending {
                attempt: retry.attempt,
            });
            *ctx.last_error.lock() = Some(err.to_string());
            Some(next)
        }
        ProbeOutcome::GaveUp(failed, err) => {
            error!("Connecting haptics for slot {} did not work: {}", failed.slot, err);
            channel.set_status(HapticsStatus::Failed);
            *ctx.last_error.lock() = Some(err.to_string());
            None
        }
    }
}

/// Opens the first audio output whose name matches [`HAPTIC_DEVICE_HINT`].
pub fn open_haptic_sink<B: ControllerBackend + ?Sized>(
    backend: &mut B,
) -> Result<Box<dyn AudioSink>, BackendError> {
    let mut last = BackendError::Audio(format!(
        "no audio output matching '{}'",
        HAPTIC_DEVICE_HINT
    ));
    let candidates: Vec<String> = backend
        .audio_output_devices()
        .into_iter()
        .filter(|name| name.contains(HAPTIC_DEVICE_HINT))
        .collect();
    for name in candidates {
        match backend.open_audio_output(&name, &HAPTIC_AUDIO_SPEC) {
            Ok(sink) => {
                debug!("Opened haptic audio output '{}'", name);
                return Ok(sink);
            }
            Err(e) => {
                debug!("Could not open audio output '{}': {}", name, e);
                last = e;
            }
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn failure() -> BackendError {
        BackendError::Audio("not yet".to_string())
    }

    #[test]
    fn first_failure_schedules_one_longer_retry() {
        let delays = HandshakeDelays::default();
        let machine = HapticsHandshake::create(2, delays).schedule();
        assert_eq!(
            machine.attempt(),
            ProbeAttempt {
                attempt: 0,
                delay: delays.initial
            }
        );

        let retry = match machine.resolve(Err(failure())) {
            ProbeOutcome::Retry(next, _) => next,
            _ => panic!("first failure must reschedule"),
        };
        let attempt = retry.attempt();
        assert_eq!(attempt.attempt, 1);
        assert!(attempt.delay > delays.initial);

        assert!(matches!(
            retry.resolve(Err(failure())),
            ProbeOutcome::GaveUp(..)
        ));
    }

    #[test]
    fn sink_discovery_matches_device_hint() {
        let mut backend = MockBackend::new();
        backend.add_audio_device("Built-in Speakers");
        assert!(open_haptic_sink(&mut backend).is_err());
        assert_eq!(backend.audio_open_attempts(), 0);

        backend.add_audio_device("DualSense Wireless Controller");
        assert!(open_haptic_sink(&mut backend).is_ok());
        assert_eq!(backend.audio_open_attempts(), 1);
    }
}
