use std::sync::Arc;

use padsession::backend::mock::{MockBackend, MockPad};
use padsession::backend::{share, MotionReading, SharedBackend, TouchReading};
use padsession::controller::{AxisId, ButtonId, PowerLevel};
use padsession::{ControllerSession, SessionConfig, SessionError, SonyControllerFeature};

fn open(
    pad: MockPad,
    features: SonyControllerFeature,
) -> (SharedBackend<MockBackend>, ControllerSession<MockBackend>) {
    let mut backend = MockBackend::new();
    backend.plug(0, pad);
    let backend = share(backend);
    let config = SessionConfig {
        sony_features: features,
        ..SessionConfig::default()
    };
    let session = ControllerSession::open_with_runtime(0, Arc::clone(&backend), config, None);
    (backend, session)
}

fn not_connected() -> SessionError {
    SessionError::DeviceNotConnected { slot: 0 }
}

#[test]
fn queries_fail_after_unplug_until_reconnect() {
    let (backend, mut session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);
    let a = ButtonId::new(0).unwrap();
    let x = AxisId::new(0).unwrap();
    assert!(session.is_connected());

    backend.lock().unplug(0);
    assert!(!session.is_connected());
    assert_eq!(session.button(a), Err(not_connected()));
    assert_eq!(session.button_just_pressed(a), Err(not_connected()));
    assert_eq!(session.axis(x), Err(not_connected()));
    assert_eq!(session.name(), Err(not_connected()));
    assert_eq!(session.vibrate(0.1, 0.1, 10), Err(not_connected()));
    assert_eq!(session.power_level(), Err(not_connected()));
    assert_eq!(session.send_haptic_audio(&[0; 4]), Err(not_connected()));
    assert_eq!(session.sensor_state(), Err(not_connected()));
    assert_eq!(session.touch_state(2), Err(not_connected()));
    assert_eq!(session.is_button_available(a), Err(not_connected()));
    assert_eq!(session.is_axis_available(x), Err(not_connected()));
    assert_eq!(session.can_vibrate(), Err(not_connected()));
    assert_eq!(session.instance_id(), Err(not_connected()));
    assert_eq!(session.player_index(), Err(not_connected()));
    assert_eq!(session.set_player_index(1), Err(not_connected()));
    // a failed touch query leaves the cache alone
    assert_eq!(session.cached_touch_fingers(), 0);

    // the old connection stays dead even once the pad is back
    backend.lock().replug(0);
    assert!(!session.is_connected());
    assert_eq!(session.axis(x), Err(not_connected()));

    assert!(session.reconnect());
    assert_eq!(session.axis(x), Ok(0.0));
    assert_eq!(backend.lock().open_count(), 1);
}

#[test]
fn reconnect_resets_edge_state() {
    let (backend, mut session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);
    let a = ButtonId::new(3).unwrap();

    backend.lock().set_button(0, a, true);
    assert!(session.button_just_pressed(a).unwrap());
    assert!(session.reconnect());
    assert!(session.button_just_pressed(a).unwrap());
}

#[test]
fn reconnect_on_empty_slot_reports_false() {
    let (backend, mut session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);
    backend.lock().unplug(0);
    assert!(!session.reconnect());
    assert!(session.last_backend_error().is_some());
}

#[test]
fn axis_values_are_scaled() {
    let (backend, session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);
    let ly = AxisId::new(1).unwrap();

    backend.lock().set_axis(0, ly, i16::MAX);
    assert_eq!(session.axis(ly), Ok(1.0));
    backend.lock().set_axis(0, ly, i16::MIN);
    assert!(session.axis(ly).unwrap() < -1.0);
}

#[test]
fn vibration_scales_magnitudes_and_rejects_out_of_range() {
    let (backend, mut session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);

    assert_eq!(session.can_vibrate(), Ok(true));
    assert_eq!(session.vibrate(0.5, 1.0, 100), Ok(true));
    assert_eq!(session.vibrate(0.0, 0.0, 0), Ok(true));
    assert_eq!(backend.lock().rumbles(), &[(32767, 65535, 100), (0, 0, 0)]);

    assert!(matches!(
        session.vibrate(1.1, 0.0, 10),
        Err(SessionError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.vibrate(0.0, -0.1, 10),
        Err(SessionError::InvalidArgument(_))
    ));
    assert_eq!(backend.lock().rumbles().len(), 2);
}

#[test]
fn vibration_on_pad_without_motors_reports_false() {
    let mut pad = MockPad::generic("Pad");
    pad.rumble = false;
    let (_backend, mut session) = open(pad, SonyControllerFeature::None);

    assert_eq!(session.can_vibrate(), Ok(false));
    assert_eq!(session.vibrate(1.0, 1.0, 10), Ok(false));
    assert!(session.last_backend_error().is_some());
}

#[test]
fn sensor_state_is_a_cache_updated_in_place() {
    let mut pad = MockPad::dualsense();
    pad.motion = Some(MotionReading {
        accel: [0.0, 9.81, 0.0],
        gyro: [0.1, 0.2, 0.3],
    });
    let (backend, mut session) = open(pad, SonyControllerFeature::DualShockFeatures);
    assert!(session.supports_sensors());

    let first = *session.sensor_state().unwrap();
    assert_eq!(first.accel_y, 9.81);
    assert_eq!(first.gyro_z, 0.3);
    assert!(first.timestamp_us > 0);

    // a failed read keeps the previous values
    backend.lock().pad_mut(0).unwrap().motion = None;
    assert_eq!(*session.sensor_state().unwrap(), first);
}

#[test]
fn sensor_timestamps_never_go_backwards() {
    let mut pad = MockPad::dualsense();
    pad.motion = Some(MotionReading {
        accel: [0.0; 3],
        gyro: [0.0; 3],
    });
    let (_backend, mut session) = open(pad, SonyControllerFeature::DualShockFeatures);

    let first = session.sensor_state().unwrap().timestamp_us;
    let second = session.sensor_state().unwrap().timestamp_us;
    assert!(second >= first);

    assert!(session.reconnect());
    let after_reconnect = session.sensor_state().unwrap().timestamp_us;
    assert!(after_reconnect >= second);
}

#[test]
fn sensors_are_not_read_without_sony_features() {
    let mut pad = MockPad::dualsense();
    pad.motion = Some(MotionReading {
        accel: [1.0; 3],
        gyro: [1.0; 3],
    });
    let (_backend, mut session) = open(pad, SonyControllerFeature::None);

    assert!(!session.supports_sensors());
    assert!(!session.supports_touchpad());
    assert_eq!(session.sensor_state().unwrap().accel_x, 0.0);
    assert_eq!(session.sensor_state().unwrap().timestamp_us, 0);
}

#[test]
fn touch_states_are_cached_per_finger() {
    let mut pad = MockPad::dualsense();
    pad.fingers.insert(
        1,
        TouchReading {
            pressed: true,
            x: 0.25,
            y: 0.75,
        },
    );
    let (backend, mut session) = open(pad, SonyControllerFeature::DualSenseFeatures);
    assert!(session.supports_touchpad());

    let touch = *session.touch_state(1).unwrap();
    assert!(touch.pressed);
    assert_eq!((touch.x, touch.y), (0.25, 0.75));
    assert!(!session.touch_state(0).unwrap().pressed);
    assert_eq!(session.cached_touch_fingers(), 2);

    backend.lock().pad_mut(0).unwrap().fingers.insert(
        1,
        TouchReading {
            pressed: false,
            x: 0.5,
            y: 0.5,
        },
    );
    let moved = *session.touch_state(1).unwrap();
    assert!(!moved.pressed);
    assert_eq!(moved.x, 0.5);
}

#[test]
fn touch_query_without_touchpad_returns_default() {
    let (_backend, mut session) = open(
        MockPad::generic("Pad"),
        SonyControllerFeature::DualSenseFeatures,
    );
    assert!(!session.supports_touchpad());
    assert_eq!(*session.touch_state(0).unwrap(), Default::default());
}

#[test]
fn supplementary_queries() {
    let mut pad = MockPad::generic("Arcade Stick");
    pad.power_level = PowerLevel::Low;
    let (_backend, mut session) = open(pad, SonyControllerFeature::None);

    assert_eq!(session.name().unwrap(), "Arcade Stick");
    assert_eq!(session.power_level(), Ok(PowerLevel::Low));
    assert!(session.instance_id().unwrap().is_some());
    assert!(session.is_button_available(ButtonId::new(5).unwrap()).unwrap());
    assert!(session.is_axis_available(AxisId::new(5).unwrap()).unwrap());

    assert_eq!(session.player_index(), Ok(None));
    assert_eq!(session.set_player_index(2), Ok(true));
    assert_eq!(session.player_index(), Ok(Some(2)));
}

#[test]
fn dropping_a_session_releases_its_handle() {
    let (backend, session) = open(MockPad::generic("Pad"), SonyControllerFeature::None);
    assert_eq!(backend.lock().open_count(), 1);
    drop(session);
    assert_eq!(backend.lock().open_count(), 0);
}
