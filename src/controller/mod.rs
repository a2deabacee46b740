//! Controller subsystem: per-slot sessions over a polled backend
//!
//! 1. [`session`] - connection lifecycle, queries and feedback for one slot
//! 2. [`input_state`] - button edge tracking, axis and vibration scaling
//! 3. [`manager`] - one session per slot
//! 4. [`types`] - identifiers and cached state types
//!
//! # Architecture
//!
//! ```text
//! Application ──query──► ControllerSession ──lock──► ControllerBackend
//!                              │
//!                              └──► HapticsChannel ◄── handshake task (tokio)
//! ```
//!
//! Nothing is pushed to the application; every value is read from the backend when the
//! application asks for it.

pub mod error;
pub mod input_state;
pub mod manager;
pub mod session;
pub mod types;

pub use error::SessionError;
pub use manager::ControllerManager;
pub use session::ControllerSession;
pub use types::{AxisId, ButtonId, DeviceFamily, PowerLevel, SensorState, TouchState};
