use thiserror::Error;

use crate::trigger::TriggerEffectError;

/// Errors surfaced synchronously by session queries and actions
///
/// Feature unavailability is not an error: trigger and haptic sends report it as `Ok(false)`,
/// and backend failures on best-effort paths are logged and recorded as the session's last
/// backend error instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session has no live connection, or the device was unplugged.
    #[error("Controller at slot {slot} is not connected")]
    DeviceNotConnected { slot: u32 },

    /// A caller-supplied value is out of its documented range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TriggerEffectError> for SessionError {
    fn from(err: TriggerEffectError) -> Self {
        SessionError::InvalidArgument(err.to_string())
    }
}
