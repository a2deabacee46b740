//! Polled game-controller sessions with DualSense adaptive triggers and audio haptics

pub mod backend;
pub mod config;
pub mod controller;
pub mod haptics;
pub mod trigger;

pub use backend::{share, ControllerBackend, SharedBackend};
pub use config::{HapticsConfig, ManagerConfig, SessionConfig, SonyControllerFeature};
pub use controller::{ControllerManager, ControllerSession, SessionError};
pub use haptics::HapticsStatus;
pub use trigger::{TriggerEffect, TriggerEffectEncoder};
