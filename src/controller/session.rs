//! Controller Session - lifecycle and queries for one controller slot
//!
//! A session owns at most one open device connection and everything derived from it:
//! button edge state, capability flags, the sensor and touch caches and the haptics
//! channel. Every query re-checks that the device is still attached, so a hot-unplugged
//! controller surfaces as [`SessionError::DeviceNotConnected`] on the next call.
//!
//! # Lifecycle
//!
//! ```text
//! open ──► connected ──(unplug)──► detached
//!   ▲          │                      │
//!   └─reconnect┴────────close─────────┴──► closed (handle released)
//! ```
//!
//! Closing releases the handle, cancels a pending haptics handshake and drops the audio
//! sink. If a non-neutral trigger effect is still active, a neutral effects report is sent
//! first. Dropping a session closes it.
//!
//! # Cached views
//!
//! [`sensor_state`](ControllerSession::sensor_state) and
//! [`touch_state`](ControllerSession::touch_state) return references into caches the
//! session overwrites in place on every successful query. Both types are `Copy`; copy the
//! value to keep a snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::input_state::{normalize_axis, scale_vibration, InputStateTracker};
use super::types::{AxisId, ButtonId, DeviceFamily, PowerLevel, SensorState, TouchState};
use crate::backend::{BackendError, ControllerBackend, DeviceHandle, DeviceId, SharedBackend};
use crate::config::{SessionConfig, SonyControllerFeature};
use crate::haptics::handshake::{spawn_handshake, HandshakeContext};
use crate::haptics::{HapticsChannel, HapticsStatus, LastError, SharedChannel};
use crate::trigger::{TriggerEffect, TriggerEffectEncoder, TriggerSide};

/// Name reported for controllers the backend has no name for.
pub const UNNAMED_CONTROLLER: &str = "Unnamed Controller";

// Wall-clock anchor taken when the session is created, advanced by the monotonic clock
#[derive(Debug, Clone, Copy)]
struct SensorClock {
    anchor_us: i64,
    started: Instant,
}

impl SensorClock {
    fn start() -> Self {
        Self {
            anchor_us: Utc::now().timestamp_micros(),
            started: Instant::now(),
        }
    }

    fn now_us(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_micros()).unwrap_or(i64::MAX);
        self.anchor_us.saturating_add(elapsed)
    }
}

pub struct ControllerSession<B: ControllerBackend> {
    slot: u32,
    config: SessionConfig,
    backend: SharedBackend<B>,
    runtime: Option<Handle>,
    handle: Option<DeviceHandle>,
    family: DeviceFamily,
    buttons: InputStateTracker,
    supports_touchpad: bool,
    supports_sensors: bool,
    pending_trigger_clear: bool,
    sensor_state: SensorState,
    sensor_clock: SensorClock,
    touch_states: HashMap<u32, TouchState>,
    haptics: SharedChannel,
    last_error: LastError,
}

impl<B: ControllerBackend> ControllerSession<B> {
    /// Opens the controller at `slot`, scheduling the haptics handshake on the ambient
    /// tokio runtime if there is one.
    ///
    /// The session is returned even when no controller is present; check
    /// [`is_connected`](Self::is_connected) or call [`reconnect`](Self::reconnect) later.
    pub fn open(slot: u32, backend: SharedBackend<B>, config: SessionConfig) -> Self {
        Self::open_with_runtime(slot, backend, config, Handle::try_current().ok())
    }

    /// Like [`open`](Self::open), with an explicit runtime for the handshake timer.
    pub fn open_with_runtime(
        slot: u32,
        backend: SharedBackend<B>,
        config: SessionConfig,
        runtime: Option<Handle>,
    ) -> Self {
        let mut session = Self {
            slot,
            config,
            backend,
            runtime,
            handle: None,
            family: DeviceFamily::Generic,
            buttons: InputStateTracker::new(),
            supports_touchpad: false,
            supports_sensors: false,
            pending_trigger_clear: false,
            sensor_state: SensorState::default(),
            sensor_clock: SensorClock::start(),
            touch_states: HashMap::new(),
            haptics: HapticsChannel::shared(config.haptics.input_layout),
            last_error: LastError::default(),
        };
        session.connect();
        session
    }

    fn connect(&mut self) -> bool {
        // channel before backend, same as the handshake task
        let haptics = Arc::clone(&self.haptics);
        let mut channel = haptics.lock();
        let backend_ref = Arc::clone(&self.backend);
        let mut backend = backend_ref.lock();

        self.buttons.reset();
        self.touch_states.clear();
        self.sensor_state = SensorState::default();
        self.supports_touchpad = false;
        self.supports_sensors = false;
        self.family = DeviceFamily::Generic;
        channel.set_status(HapticsStatus::Disabled);

        let id = match backend.open(self.slot) {
            Ok(id) => id,
            Err(e) => {
                debug!("No controller opened at slot {}: {}", self.slot, e);
                *self.last_error.lock() = Some(e.to_string());
                return false;
            }
        };

        self.family = match (backend.vendor_id(id), backend.product_id(id)) {
            (Some(vendor), Some(product)) => DeviceFamily::from_vendor_product(vendor, product),
            _ => DeviceFamily::Generic,
        };

        let features = self.config.sony_features;
        if features.requests_advanced() {
            self.supports_touchpad = backend.touchpad_count(id) > 0;
            self.supports_sensors = backend.enable_motion_sensors(id);
            debug!(
                "Slot {}: touchpad {}, sensors {}",
                self.slot, self.supports_touchpad, self.supports_sensors
            );
        }

        if features.requests_haptics() && self.family.is_dualsense() {
            match &self.runtime {
                Some(runtime) => {
                    let token = CancellationToken::new();
                    channel.begin(token.clone());
                    let ctx = HandshakeContext {
                        slot: self.slot,
                        device: id,
                        backend: Arc::clone(&self.backend),
                        channel: Arc::clone(&self.haptics),
                        last_error: Arc::clone(&self.last_error),
                        token,
                    };
                    spawn_handshake(runtime, ctx, self.config.haptics.delays());
                }
                None => {
                    warn!(
                        "No tokio runtime available, haptics for slot {} disabled",
                        self.slot
                    );
                    channel.set_status(HapticsStatus::Failed);
                    *self.last_error.lock() =
                        Some("no tokio runtime to schedule the haptics handshake".to_string());
                }
            }
        }

        info!("Opened controller at slot {} ({:?})", self.slot, self.family);
        self.handle = Some(DeviceHandle::new(id));
        true
    }

    /// Releases the connection. Closing an already closed session is a no-op.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            self.touch_states.clear();
            return;
        };
        let haptics = Arc::clone(&self.haptics);
        let mut channel = haptics.lock();
        channel.shutdown();

        let mut backend = self.backend.lock();
        if self.pending_trigger_clear {
            let report =
                TriggerEffectEncoder::encode(&TriggerEffect::NEUTRAL, &TriggerEffect::NEUTRAL);
            if let Err(e) = backend.send_effect(handle.id(), &report) {
                debug!("Clearing trigger effects on slot {} failed: {}", self.slot, e);
            }
            self.pending_trigger_clear = false;
        }
        backend.close(handle.id());
        drop(backend);
        drop(channel);

        self.touch_states.clear();
        self.buttons.reset();
        info!("Closed controller at slot {}", self.slot);
    }

    /// Closes and reopens the slot. Returns whether a controller is connected afterwards;
    /// failures are recorded as the last backend error rather than returned.
    pub fn reconnect(&mut self) -> bool {
        self.close();
        self.connect();
        self.is_connected()
    }

    /// True if the session holds a connection and the device is still attached.
    pub fn is_connected(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| self.backend.lock().is_attached(h.id()))
    }

    // Pumps the backend and runs `f` against the live device
    fn with_device<T>(&self, f: impl FnOnce(&mut B, DeviceId) -> T) -> Result<T, SessionError> {
        let not_connected = SessionError::DeviceNotConnected { slot: self.slot };
        let id = self.handle.as_ref().map(DeviceHandle::id).ok_or(not_connected.clone())?;
        let mut backend = self.backend.lock();
        backend.update();
        if !backend.is_attached(id) {
            return Err(not_connected);
        }
        Ok(f(&mut *backend, id))
    }

    fn record(&self, err: &BackendError) {
        *self.last_error.lock() = Some(err.to_string());
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Whether `button` is held. Also updates its just-pressed edge.
    pub fn button(&mut self, button: ButtonId) -> Result<bool, SessionError> {
        let pressed = self.with_device(|b, id| b.button(id, button))?;
        Ok(self.buttons.update(button, pressed).held)
    }

    /// Whether `button` went from released to held since the previous query of that button.
    pub fn button_just_pressed(&mut self, button: ButtonId) -> Result<bool, SessionError> {
        let pressed = self.with_device(|b, id| b.button(id, button))?;
        Ok(self.buttons.update(button, pressed).just_pressed)
    }

    pub fn is_button_available(&self, button: ButtonId) -> Result<bool, SessionError> {
        self.with_device(|b, id| b.has_button(id, button))
    }

    /// Axis position scaled to roughly `-1.0..=1.0`.
    pub fn axis(&self, axis: AxisId) -> Result<f32, SessionError> {
        let raw = self.with_device(|b, id| b.axis(id, axis))?;
        Ok(normalize_axis(raw))
    }

    pub fn is_axis_available(&self, axis: AxisId) -> Result<bool, SessionError> {
        self.with_device(|b, id| b.has_axis(id, axis))
    }

    pub fn name(&self) -> Result<String, SessionError> {
        let name = self.with_device(|b, id| b.name(id))?;
        Ok(name.unwrap_or_else(|| UNNAMED_CONTROLLER.to_string()))
    }

    pub fn instance_id(&self) -> Result<Option<i32>, SessionError> {
        self.with_device(|b, id| b.instance_id(id))
    }

    pub fn player_index(&self) -> Result<Option<i32>, SessionError> {
        self.with_device(|b, id| b.player_index(id))
    }

    /// Returns false if the backend cannot assign player indices.
    pub fn set_player_index(&mut self, index: i32) -> Result<bool, SessionError> {
        match self.with_device(|b, id| b.set_player_index(id, index))? {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("Setting player index on slot {} failed: {}", self.slot, e);
                self.record(&e);
                Ok(false)
            }
        }
    }

    pub fn power_level(&self) -> Result<PowerLevel, SessionError> {
        self.with_device(|b, id| b.power_level(id))
    }

    pub fn can_vibrate(&self) -> Result<bool, SessionError> {
        self.with_device(|b, id| b.has_rumble(id))
    }

    /// Starts rumble with both motor magnitudes in `0.0..=1.0`, replacing any previous one.
    /// Zero magnitudes stop rumbling.
    ///
    /// Returns false if the controller refused the request.
    pub fn vibrate(
        &mut self,
        left: f32,
        right: f32,
        duration_ms: u32,
    ) -> Result<bool, SessionError> {
        let id = self.live_device()?;
        let low = scale_vibration(left)?;
        let high = scale_vibration(right)?;
        let result = self.backend.lock().rumble(id, low, high, duration_ms);
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("Rumble on slot {} failed: {}", self.slot, e);
                self.record(&e);
                Ok(false)
            }
        }
    }

    fn live_device(&self) -> Result<DeviceId, SessionError> {
        self.with_device(|_, id| id)
    }

    /// Latest accelerometer and gyroscope reading.
    ///
    /// The returned state is the session's cache: it keeps its previous values when the
    /// controller has no sensors, sensors were not requested, or the read failed.
    pub fn sensor_state(&mut self) -> Result<&SensorState, SessionError> {
        let supported = self.supports_sensors;
        let reading =
            self.with_device(|b, id| supported.then(|| b.motion_reading(id)).flatten())?;
        if let Some(reading) = reading {
            let now = self.sensor_clock.now_us();
            self.sensor_state.update(reading.accel, reading.gyro, now);
        }
        Ok(&self.sensor_state)
    }

    /// Touchpad state of `finger`. The cache entry is created on first query and kept
    /// until the session closes.
    pub fn touch_state(&mut self, finger: u32) -> Result<&TouchState, SessionError> {
        let supported = self.supports_touchpad;
        let reading =
            self.with_device(|b, id| supported.then(|| b.touchpad_finger(id, finger)).flatten())?;
        let state = self.touch_states.entry(finger).or_default();
        if let Some(reading) = reading {
            state.update(reading.pressed, reading.x, reading.y);
        }
        Ok(state)
    }

    fn dualsense_effects_enabled(&self) -> bool {
        self.config.sony_features.allows_dualsense_effects() && self.family.is_dualsense()
    }

    /// Sends adaptive trigger programs to both triggers.
    ///
    /// Returns false if the controller is not a DualSense, DualSense features are not
    /// enabled, or the device rejected the report.
    pub fn send_trigger_effects(
        &mut self,
        left: &TriggerEffect,
        right: &TriggerEffect,
    ) -> Result<bool, SessionError> {
        let id = self.live_device()?;
        if !self.dualsense_effects_enabled() {
            debug!("Trigger effects unsupported on slot {}", self.slot);
            return Ok(false);
        }
        let report = TriggerEffectEncoder::encode(left, right);
        let result = self.backend.lock().send_effect(id, &report);
        match result {
            Ok(()) => {
                self.pending_trigger_clear = !(left.is_neutral() && right.is_neutral());
                debug!(
                    "Sent trigger effects {:#04x}/{:#04x} to slot {}",
                    left.effect_type(),
                    right.effect_type(),
                    self.slot
                );
                Ok(true)
            }
            Err(e) => {
                warn!("Sending trigger effects to slot {} failed: {}", self.slot, e);
                self.record(&e);
                Ok(false)
            }
        }
    }

    /// Raw form of [`send_trigger_effects`](Self::send_trigger_effects). Parameter
    /// blocks longer than ten bytes are rejected with [`SessionError::InvalidArgument`].
    pub fn send_trigger_effects_raw(
        &mut self,
        left_type: u8,
        left_params: &[u8],
        right_type: u8,
        right_params: &[u8],
    ) -> Result<bool, SessionError> {
        self.live_device()?;
        let left = TriggerEffect::new(TriggerSide::Left, left_type, left_params)?;
        let right = TriggerEffect::new(TriggerSide::Right, right_type, right_params)?;
        self.send_trigger_effects(&left, &right)
    }

    /// Queues a packet of 3 kHz 16-bit little-endian PCM on the haptic audio channel.
    ///
    /// Returns false without side effects when haptics have not been negotiated, and
    /// false after recording the error when the audio output rejects the packet.
    pub fn send_haptic_audio(&mut self, pcm: &[u8]) -> Result<bool, SessionError> {
        self.live_device()?;
        if !self.dualsense_effects_enabled() {
            return Ok(false);
        }
        let sent = self.haptics.lock().send(pcm, &self.last_error);
        Ok(sent)
    }

    pub fn supports_touchpad(&self) -> bool {
        self.supports_touchpad
    }

    pub fn supports_sensors(&self) -> bool {
        self.supports_sensors
    }

    /// True once the haptic audio output is open.
    pub fn supports_haptics(&self) -> bool {
        self.haptics.lock().status() == HapticsStatus::Connected
    }

    pub fn haptics_status(&self) -> HapticsStatus {
        self.haptics.lock().status()
    }

    pub fn sony_features(&self) -> SonyControllerFeature {
        self.config.sony_features
    }

    /// Device family of the current connection, `Generic` when disconnected.
    pub fn device_family(&self) -> DeviceFamily {
        self.family
    }

    /// Human-readable description of the most recent backend failure.
    pub fn last_backend_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Number of fingers with a cached touch state.
    pub fn cached_touch_fingers(&self) -> usize {
        self.touch_states.len()
    }

    /// Whether a non-neutral trigger effect will be cleared on close.
    pub fn has_pending_trigger_clear(&self) -> bool {
        self.pending_trigger_clear
    }
}

impl<B: ControllerBackend> Drop for ControllerSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}
