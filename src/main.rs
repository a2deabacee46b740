use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use padsession::backend::gilrs_backend::GilrsBackend;
use padsession::controller::{AxisId, ButtonId};
use padsession::{share, ControllerManager, ManagerConfig, TriggerEffect};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const POLL_INTERVAL_MS: u64 = 16;
const RECONNECT_INTERVAL_MS: u64 = 2_000;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = ManagerConfig::load_or_default();
    info!("Starting with {:?}", config);

    let backend = GilrsBackend::new().map_err(|e| eyre!("Failed to start backend: {}", e))?;
    let mut manager = ControllerManager::new(share(backend), config);
    info!("{} controllers connected", manager.connected_count());

    let south = ButtonId::new(0).ok_or_else(|| eyre!("invalid button id"))?;
    let east = ButtonId::new(1).ok_or_else(|| eyre!("invalid button id"))?;
    let left_x = AxisId::new(0).ok_or_else(|| eyre!("invalid axis id"))?;

    let mut poll = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
    let mut reconnect = tokio::time::interval(Duration::from_millis(RECONNECT_INTERVAL_MS));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            _ = reconnect.tick() => {
                manager.reconnect_disconnected();
            }
            _ = poll.tick() => {
                for session in manager.sessions_mut() {
                    if !session.is_connected() {
                        continue;
                    }
                    let slot = session.slot();
                    match session.button_just_pressed(south) {
                        Ok(true) => {
                            info!("Slot {}: south pressed", slot);
                            if let Err(e) = session.vibrate(0.5, 0.5, 200) {
                                warn!("Slot {}: {}", slot, e);
                            }
                            let effect = TriggerEffect::continuous(2, 6);
                            match session.send_trigger_effects(&effect, &effect) {
                                Ok(true) => {}
                                Ok(false) => debug!("Slot {}: no trigger effects", slot),
                                Err(e) => warn!("Slot {}: {}", slot, e),
                            }
                        }
                        Ok(false) => {}
                        Err(e) => warn!("{}", e),
                    }
                    if let Ok(true) = session.button_just_pressed(east) {
                        let neutral = TriggerEffect::NEUTRAL;
                        if let Err(e) = session.send_trigger_effects(&neutral, &neutral) {
                            warn!("Slot {}: {}", slot, e);
                        }
                    }
                    if let Ok(x) = session.axis(left_x) {
                        if x.abs() > 0.5 {
                            debug!("Slot {}: left stick x {:.2}", slot, x);
                        }
                    }
                }
            }
        }
    }

    manager.close_all();
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
