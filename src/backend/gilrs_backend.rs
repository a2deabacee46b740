//! Backend on top of gilrs
//!
//! Slots index the connected gamepads in gilrs enumeration order. Button and axis ids
//! follow the usual game-controller layout (A, B, X, Y, Back, Guide, Start, ...); the
//! Y axes are flipped so that down is positive, and triggers report `0..=32767`.
//!
//! gilrs exposes neither touchpads, motion sensors, raw effect reports nor audio
//! outputs, so those capabilities stay at their "unsupported" defaults.

use std::collections::HashMap;

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, Gamepad, GamepadId, Gilrs, PowerInfo};
use tracing::{debug, error, info, warn};

use super::{BackendError, ControllerBackend, DeviceId};
use crate::controller::types::{AxisId, ButtonId, PowerLevel};

// Indexed by ButtonId
const BUTTON_MAP: [Option<Button>; ButtonId::COUNT] = [
    Some(Button::South),
    Some(Button::East),
    Some(Button::West),
    Some(Button::North),
    Some(Button::Select),
    Some(Button::Mode),
    Some(Button::Start),
    Some(Button::LeftThumb),
    Some(Button::RightThumb),
    Some(Button::LeftTrigger),
    Some(Button::RightTrigger),
    Some(Button::DPadUp),
    Some(Button::DPadDown),
    Some(Button::DPadLeft),
    Some(Button::DPadRight),
    // misc, four paddles, touchpad click
    None,
    None,
    None,
    None,
    None,
    None,
];

#[derive(Debug, Clone, Copy)]
enum AxisSource {
    Stick(Axis, bool),
    Trigger(Button),
}

// Indexed by AxisId
const AXIS_MAP: [AxisSource; AxisId::COUNT] = [
    AxisSource::Stick(Axis::LeftStickX, false),
    AxisSource::Stick(Axis::LeftStickY, true),
    AxisSource::Stick(Axis::RightStickX, false),
    AxisSource::Stick(Axis::RightStickY, true),
    AxisSource::Trigger(Button::LeftTrigger2),
    AxisSource::Trigger(Button::RightTrigger2),
];

pub struct GilrsBackend {
    gilrs: Gilrs,
    next_id: u64,
    open: HashMap<DeviceId, GamepadId>,
    rumble: HashMap<DeviceId, Effect>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, BackendError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            BackendError::OpenFailed {
                slot: 0,
                reason: e.to_string(),
            }
        })?;
        for (id, gamepad) in gilrs.gamepads() {
            info!("Found gamepad {}: {} ({})", id, gamepad.name(), gamepad.os_name());
        }
        Ok(Self {
            gilrs,
            next_id: 0,
            open: HashMap::new(),
            rumble: HashMap::new(),
        })
    }

    fn gamepad(&self, device: DeviceId) -> Option<Gamepad<'_>> {
        let id = *self.open.get(&device)?;
        self.gilrs.connected_gamepad(id)
    }
}

fn scale_stick(value: f32, invert: bool) -> i16 {
    let value = if invert { -value } else { value };
    (value.clamp(-1.0, 1.0) * 32767.0) as i16
}

fn power_level(info: PowerInfo) -> PowerLevel {
    match info {
        PowerInfo::Wired => PowerLevel::Wired,
        PowerInfo::Charged => PowerLevel::Full,
        PowerInfo::Discharging(pct) | PowerInfo::Charging(pct) => match pct {
            0..=5 => PowerLevel::Empty,
            6..=20 => PowerLevel::Low,
            21..=70 => PowerLevel::Medium,
            _ => PowerLevel::Full,
        },
        PowerInfo::Unknown => PowerLevel::Unknown,
    }
}

impl ControllerBackend for GilrsBackend {
    fn open(&mut self, slot: u32) -> Result<DeviceId, BackendError> {
        let gamepad_id = usize::try_from(slot)
            .ok()
            .and_then(|index| self.gilrs.gamepads().nth(index))
            .map(|(id, _)| id)
            .ok_or_else(|| BackendError::OpenFailed {
                slot,
                reason: "no gamepad at this index".to_string(),
            })?;

        self.next_id += 1;
        let device = DeviceId::new(self.next_id).ok_or_else(|| BackendError::OpenFailed {
            slot,
            reason: "device id space exhausted".to_string(),
        })?;
        debug!("Slot {} bound to gamepad {}", slot, gamepad_id);
        self.open.insert(device, gamepad_id);
        Ok(device)
    }

    fn close(&mut self, device: DeviceId) {
        if let Some(effect) = self.rumble.remove(&device) {
            if let Err(e) = effect.stop() {
                debug!("Stopping rumble failed: {}", e);
            }
        }
        self.open.remove(&device);
    }

    fn update(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            debug!("gilrs event: {:?}", event.event);
        }
        self.gilrs.inc();
    }

    fn is_attached(&self, device: DeviceId) -> bool {
        self.gamepad(device).is_some()
    }

    fn name(&self, device: DeviceId) -> Option<String> {
        self.gamepad(device)
            .map(|g| g.name().to_string())
            .filter(|name| !name.is_empty())
    }

    fn vendor_id(&self, device: DeviceId) -> Option<u16> {
        self.gamepad(device)?.vendor_id()
    }

    fn product_id(&self, device: DeviceId) -> Option<u16> {
        self.gamepad(device)?.product_id()
    }

    fn button(&self, device: DeviceId, button: ButtonId) -> bool {
        match (self.gamepad(device), BUTTON_MAP[button.index()]) {
            (Some(gamepad), Some(button)) => gamepad.is_pressed(button),
            _ => false,
        }
    }

    fn has_button(&self, device: DeviceId, button: ButtonId) -> bool {
        match (self.gamepad(device), BUTTON_MAP[button.index()]) {
            (Some(gamepad), Some(button)) => gamepad.button_code(button).is_some(),
            _ => false,
        }
    }

    fn axis(&self, device: DeviceId, axis: AxisId) -> i16 {
        let Some(gamepad) = self.gamepad(device) else {
            return 0;
        };
        match AXIS_MAP[axis.index()] {
            AxisSource::Stick(axis, invert) => scale_stick(gamepad.value(axis), invert),
            AxisSource::Trigger(button) => {
                let value = gamepad.button_data(button).map_or(0.0, |d| d.value());
                scale_stick(value.clamp(0.0, 1.0), false)
            }
        }
    }

    fn has_axis(&self, device: DeviceId, axis: AxisId) -> bool {
        let Some(gamepad) = self.gamepad(device) else {
            return false;
        };
        match AXIS_MAP[axis.index()] {
            AxisSource::Stick(axis, _) => gamepad.axis_code(axis).is_some(),
            AxisSource::Trigger(button) => gamepad.button_code(button).is_some(),
        }
    }

    fn instance_id(&self, device: DeviceId) -> Option<i32> {
        let id = *self.open.get(&device)?;
        i32::try_from(usize::from(id)).ok()
    }

    fn power_level(&self, device: DeviceId) -> PowerLevel {
        self.gamepad(device)
            .map_or(PowerLevel::Unknown, |g| power_level(g.power_info()))
    }

    fn has_rumble(&self, device: DeviceId) -> bool {
        self.gamepad(device).is_some_and(|g| g.is_ff_supported())
    }

    fn rumble(
        &mut self,
        device: DeviceId,
        low_frequency: u16,
        high_frequency: u16,
        duration_ms: u32,
    ) -> Result<(), BackendError> {
        let id = match self.gamepad(device) {
            Some(gamepad) if gamepad.is_ff_supported() => gamepad.id(),
            Some(_) => return Err(BackendError::NotSupported("rumble".to_string())),
            None => return Err(BackendError::Detached),
        };

        if let Some(previous) = self.rumble.remove(&device) {
            if let Err(e) = previous.stop() {
                debug!("Stopping previous rumble failed: {}", e);
            }
        }
        if low_frequency == 0 && high_frequency == 0 {
            return Ok(());
        }

        let scheduling = Replay {
            play_for: Ticks::from_ms(duration_ms),
            ..Default::default()
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: low_frequency,
                },
                scheduling,
                envelope: Default::default(),
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak {
                    magnitude: high_frequency,
                },
                scheduling,
                envelope: Default::default(),
            })
            .gamepads(&[id])
            .finish(&mut self.gilrs)
            .map_err(|e| BackendError::SendFailed(e.to_string()))?;
        effect.play().map_err(|e| {
            warn!("Failed to start rumble: {}", e);
            BackendError::SendFailed(e.to_string())
        })?;
        self.rumble.insert(device, effect);
        Ok(())
    }
}
