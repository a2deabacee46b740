//! In-memory backend with scriptable devices
//!
//! Pads are plugged into slots, their inputs are set directly, and everything sent to them
//! (effect reports, rumble requests, haptic audio) is recorded for inspection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    AudioSink, AudioSpec, BackendError, ControllerBackend, DeviceId, MotionReading, TouchReading,
};
use crate::controller::types::{
    AxisId, ButtonId, PowerLevel, DUALSENSE_PRODUCT_ID, SONY_VENDOR_ID,
};

/// Simulated controller plugged into a slot.
#[derive(Debug, Clone)]
pub struct MockPad {
    pub name: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub buttons: [bool; ButtonId::COUNT],
    pub axes: [i16; AxisId::COUNT],
    pub touchpads: usize,
    pub fingers: HashMap<u32, TouchReading>,
    pub has_sensors: bool,
    pub motion: Option<MotionReading>,
    pub rumble: bool,
    pub effects: bool,
    pub player_index: Option<i32>,
    pub power_level: PowerLevel,
}

impl MockPad {
    /// Plain pad: buttons, axes and rumble only.
    pub fn generic(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            vendor_id: 0x045E,
            product_id: 0x02EA,
            buttons: [false; ButtonId::COUNT],
            axes: [0; AxisId::COUNT],
            touchpads: 0,
            fingers: HashMap::new(),
            has_sensors: false,
            motion: None,
            rumble: true,
            effects: false,
            player_index: None,
            power_level: PowerLevel::Wired,
        }
    }

    /// DualSense with touchpad, motion sensors and effect reports.
    pub fn dualsense() -> Self {
        Self {
            vendor_id: SONY_VENDOR_ID,
            product_id: DUALSENSE_PRODUCT_ID,
            touchpads: 1,
            has_sensors: true,
            effects: true,
            ..Self::generic("DualSense Wireless Controller")
        }
    }
}

#[derive(Debug)]
struct PluggedPad {
    pad: MockPad,
    attached: bool,
    generation: u64,
}

#[derive(Debug)]
struct OpenDevice {
    slot: u32,
    generation: u64,
}

/// Everything written to the audio sinks opened through a [`MockBackend`].
#[derive(Debug, Default)]
pub struct AudioLog {
    pub bytes: Vec<u8>,
    pub packets: usize,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    next_id: u64,
    slots: HashMap<u32, PluggedPad>,
    open: HashMap<DeviceId, OpenDevice>,
    audio_devices: Vec<String>,
    audio_open_failures: usize,
    audio_open_attempts: usize,
    audio_log: Arc<Mutex<AudioLog>>,
    reject_audio: Arc<AtomicBool>,
    sent_reports: Vec<(DeviceId, Vec<u8>)>,
    rumbles: Vec<(u16, u16, u32)>,
    updates: usize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugs `pad` into `slot`, replacing whatever was there.
    ///
    /// Connections opened before the replug stay detached; they must be reopened.
    pub fn plug(&mut self, slot: u32, pad: MockPad) {
        let generation = self.slots.get(&slot).map_or(0, |p| p.generation + 1);
        self.slots.insert(
            slot,
            PluggedPad {
                pad,
                attached: true,
                generation,
            },
        );
    }

    /// Simulates a hot-unplug: open connections to the slot report detached.
    pub fn unplug(&mut self, slot: u32) {
        if let Some(plugged) = self.slots.get_mut(&slot) {
            plugged.attached = false;
        }
    }

    /// Plugs the last pad of `slot` back in as a fresh device.
    pub fn replug(&mut self, slot: u32) {
        if let Some(plugged) = self.slots.get_mut(&slot) {
            plugged.attached = true;
            plugged.generation += 1;
        }
    }

    pub fn pad_mut(&mut self, slot: u32) -> Option<&mut MockPad> {
        self.slots.get_mut(&slot).map(|p| &mut p.pad)
    }

    pub fn set_button(&mut self, slot: u32, button: ButtonId, pressed: bool) {
        if let Some(pad) = self.pad_mut(slot) {
            pad.buttons[button.index()] = pressed;
        }
    }

    pub fn set_axis(&mut self, slot: u32, axis: AxisId, raw: i16) {
        if let Some(pad) = self.pad_mut(slot) {
            pad.axes[axis.index()] = raw;
        }
    }

    pub fn add_audio_device(&mut self, name: &str) {
        self.audio_devices.push(name.to_string());
    }

    /// Makes the next `count` audio output opens fail.
    pub fn fail_audio_opens(&mut self, count: usize) {
        self.audio_open_failures = count;
    }

    /// Makes every sink reject queued packets while `reject` is set.
    pub fn reject_audio(&self, reject: bool) {
        self.reject_audio.store(reject, Ordering::SeqCst);
    }

    pub fn audio_open_attempts(&self) -> usize {
        self.audio_open_attempts
    }

    pub fn audio_log(&self) -> Arc<Mutex<AudioLog>> {
        Arc::clone(&self.audio_log)
    }

    pub fn sent_reports(&self) -> &[(DeviceId, Vec<u8>)] {
        &self.sent_reports
    }

    pub fn rumbles(&self) -> &[(u16, u16, u32)] {
        &self.rumbles
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self, device: DeviceId) -> bool {
        self.open.contains_key(&device)
    }

    fn pad(&self, device: DeviceId) -> Option<&MockPad> {
        let open = self.open.get(&device)?;
        let plugged = self.slots.get(&open.slot)?;
        (plugged.attached && plugged.generation == open.generation).then_some(&plugged.pad)
    }
}

impl ControllerBackend for MockBackend {
    fn open(&mut self, slot: u32) -> Result<DeviceId, BackendError> {
        let generation = match self.slots.get(&slot) {
            Some(plugged) if plugged.attached => plugged.generation,
            _ => {
                return Err(BackendError::OpenFailed {
                    slot,
                    reason: "no controller attached".to_string(),
                })
            }
        };
        self.next_id += 1;
        let id = DeviceId::new(self.next_id).ok_or_else(|| BackendError::OpenFailed {
            slot,
            reason: "device id space exhausted".to_string(),
        })?;
        self.open.insert(id, OpenDevice { slot, generation });
        Ok(id)
    }

    fn close(&mut self, device: DeviceId) {
        self.open.remove(&device);
    }

    fn update(&mut self) {
        self.updates += 1;
    }

    fn is_attached(&self, device: DeviceId) -> bool {
        self.pad(device).is_some()
    }

    fn name(&self, device: DeviceId) -> Option<String> {
        self.pad(device).and_then(|p| p.name.clone())
    }

    fn vendor_id(&self, device: DeviceId) -> Option<u16> {
        self.pad(device).map(|p| p.vendor_id)
    }

    fn product_id(&self, device: DeviceId) -> Option<u16> {
        self.pad(device).map(|p| p.product_id)
    }

    fn button(&self, device: DeviceId, button: ButtonId) -> bool {
        self.pad(device).is_some_and(|p| p.buttons[button.index()])
    }

    fn has_button(&self, device: DeviceId, _button: ButtonId) -> bool {
        self.pad(device).is_some()
    }

    fn axis(&self, device: DeviceId, axis: AxisId) -> i16 {
        self.pad(device).map_or(0, |p| p.axes[axis.index()])
    }

    fn has_axis(&self, device: DeviceId, _axis: AxisId) -> bool {
        self.pad(device).is_some()
    }

    fn instance_id(&self, device: DeviceId) -> Option<i32> {
        self.pad(device)?;
        i32::try_from(device.get()).ok()
    }

    fn player_index(&self, device: DeviceId) -> Option<i32> {
        self.pad(device).and_then(|p| p.player_index)
    }

    fn set_player_index(&mut self, device: DeviceId, index: i32) -> Result<(), BackendError> {
        let slot = self
            .pad(device)
            .and(self.open.get(&device))
            .map(|o| o.slot)
            .ok_or(BackendError::Detached)?;
        if let Some(pad) = self.pad_mut(slot) {
            pad.player_index = Some(index);
        }
        Ok(())
    }

    fn power_level(&self, device: DeviceId) -> PowerLevel {
        self.pad(device).map_or(PowerLevel::Unknown, |p| p.power_level)
    }

    fn touchpad_count(&self, device: DeviceId) -> usize {
        self.pad(device).map_or(0, |p| p.touchpads)
    }

    fn touchpad_finger(&self, device: DeviceId, finger: u32) -> Option<TouchReading> {
        let pad = self.pad(device)?;
        if pad.touchpads == 0 {
            return None;
        }
        Some(pad.fingers.get(&finger).copied().unwrap_or_default())
    }

    fn enable_motion_sensors(&mut self, device: DeviceId) -> bool {
        self.pad(device).is_some_and(|p| p.has_sensors)
    }

    fn motion_reading(&self, device: DeviceId) -> Option<MotionReading> {
        self.pad(device).filter(|p| p.has_sensors)?.motion
    }

    fn has_rumble(&self, device: DeviceId) -> bool {
        self.pad(device).is_some_and(|p| p.rumble)
    }

    fn rumble(
        &mut self,
        device: DeviceId,
        low_frequency: u16,
        high_frequency: u16,
        duration_ms: u32,
    ) -> Result<(), BackendError> {
        match self.pad(device).map(|p| p.rumble) {
            Some(true) => {
                self.rumbles
                    .push((low_frequency, high_frequency, duration_ms));
                Ok(())
            }
            Some(false) => Err(BackendError::NotSupported("rumble".to_string())),
            None => Err(BackendError::Detached),
        }
    }

    fn send_effect(&mut self, device: DeviceId, report: &[u8]) -> Result<(), BackendError> {
        match self.pad(device).map(|p| p.effects) {
            Some(true) => {
                self.sent_reports.push((device, report.to_vec()));
                Ok(())
            }
            Some(false) => Err(BackendError::NotSupported("effect reports".to_string())),
            None => Err(BackendError::Detached),
        }
    }

    fn audio_output_devices(&self) -> Vec<String> {
        self.audio_devices.clone()
    }

    fn open_audio_output(
        &mut self,
        device_name: &str,
        spec: &AudioSpec,
    ) -> Result<Box<dyn AudioSink>, BackendError> {
        self.audio_open_attempts += 1;
        if self.audio_open_failures > 0 {
            self.audio_open_failures -= 1;
            return Err(BackendError::Audio(format!(
                "failed to open '{}'",
                device_name
            )));
        }
        if !self.audio_devices.iter().any(|d| d == device_name) {
            return Err(BackendError::Audio(format!(
                "unknown audio device '{}'",
                device_name
            )));
        }
        Ok(Box::new(MockAudioSink {
            spec: *spec,
            log: Arc::clone(&self.audio_log),
            reject: Arc::clone(&self.reject_audio),
        }))
    }
}

#[derive(Debug)]
struct MockAudioSink {
    spec: AudioSpec,
    log: Arc<Mutex<AudioLog>>,
    reject: Arc<AtomicBool>,
}

impl AudioSink for MockAudioSink {
    fn queue(&mut self, pcm: &[u8]) -> Result<(), BackendError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(BackendError::Audio("queue rejected".to_string()));
        }
        let frame_bytes = usize::from(self.spec.channels) * 2;
        if pcm.len() % frame_bytes != 0 {
            return Err(BackendError::Audio(format!(
                "{} bytes is not a whole number of {}-byte frames",
                pcm.len(),
                frame_bytes
            )));
        }
        let mut log = self.log.lock();
        log.bytes.extend_from_slice(pcm);
        log.packets += 1;
        Ok(())
    }
}
