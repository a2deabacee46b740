//! Manager for one session per controller slot

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use super::session::ControllerSession;
use crate::backend::{ControllerBackend, SharedBackend};
use crate::config::ManagerConfig;

/// Owns the shared backend and the sessions for slots `0..max_controllers`.
pub struct ControllerManager<B: ControllerBackend> {
    backend: SharedBackend<B>,
    config: ManagerConfig,
    sessions: Vec<ControllerSession<B>>,
}

impl<B: ControllerBackend> ControllerManager<B> {
    /// Opens every slot, using the ambient tokio runtime for haptics handshakes.
    pub fn new(backend: SharedBackend<B>, config: ManagerConfig) -> Self {
        Self::with_runtime(backend, config, Handle::try_current().ok())
    }

    pub fn with_runtime(
        backend: SharedBackend<B>,
        config: ManagerConfig,
        runtime: Option<Handle>,
    ) -> Self {
        info!(
            "Creating ControllerManager for {} slots",
            config.max_controllers
        );
        let session_config = config.session_config();
        let sessions = (0..config.max_controllers)
            .map(|slot| {
                ControllerSession::open_with_runtime(
                    slot,
                    Arc::clone(&backend),
                    session_config,
                    runtime.clone(),
                )
            })
            .collect();

        Self {
            backend,
            config,
            sessions,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn backend(&self) -> &SharedBackend<B> {
        &self.backend
    }

    pub fn session(&self, slot: u32) -> Option<&ControllerSession<B>> {
        self.sessions.get(usize::try_from(slot).ok()?)
    }

    pub fn session_mut(&mut self, slot: u32) -> Option<&mut ControllerSession<B>> {
        self.sessions.get_mut(usize::try_from(slot).ok()?)
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut ControllerSession<B>> {
        self.sessions.iter_mut()
    }

    /// Number of slots whose controller is currently attached.
    pub fn connected_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_connected()).count()
    }

    /// Reconnects every slot, picking up controllers plugged in since. Returns the number
    /// of connected slots afterwards.
    pub fn reconnect_all(&mut self) -> usize {
        let connected = self
            .sessions
            .iter_mut()
            .map(|s| s.reconnect())
            .filter(|c| *c)
            .count();
        debug!("{} controllers connected after reconnect", connected);
        connected
    }

    /// Reconnects only the slots whose controller is gone, leaving live sessions untouched.
    /// Returns the number of slots that came back.
    pub fn reconnect_disconnected(&mut self) -> usize {
        let recovered = self
            .sessions
            .iter_mut()
            .filter(|s| !s.is_connected())
            .map(|s| s.reconnect())
            .filter(|c| *c)
            .count();
        if recovered > 0 {
            info!("Reconnected {} controllers", recovered);
        }
        recovered
    }

    pub fn close_all(&mut self) {
        for session in &mut self.sessions {
            session.close();
        }
    }
}

impl<B: ControllerBackend> Drop for ControllerManager<B> {
    fn drop(&mut self) {
        debug!("Dropping ControllerManager, closing all sessions");
        self.close_all();
    }
}
