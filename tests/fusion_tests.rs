use kalman_ahrs::{
    Ahrs, AhrsConfig, AhrsError, CalibrationPlan, CalibrationStatus, Frame, Quaternion, SensorSample, Strategy,
    UpdateType,
};
use nalgebra::Vector3;

const DT: f32 = 0.01;

fn ned_at_rest() -> SensorSample {
    SensorSample::new(
        Vector3::zeros(),
        Vector3::new(0.0, 0.0, -9.81),
        Vector3::new(20.0, 0.0, 40.0),
        DT,
    )
}

fn enu_at_rest() -> SensorSample {
    SensorSample::new(
        Vector3::zeros(),
        Vector3::new(0.0, 0.0, 9.81),
        Vector3::new(0.0, 20.0, -40.0),
        DT,
    )
}

fn enu_config() -> AhrsConfig {
    AhrsConfig {
        frame: Frame::Enu,
        ..Default::default()
    }
}

/// Test the stationary ENU complementary scenario: level output and +g on z
#[test]
fn test_enu_complementary_stationary() {
    let mut ahrs = Ahrs::new(enu_config(), Strategy::Complementary).unwrap();
    for _ in 0..300 {
        ahrs.update(&enu_at_rest()).unwrap();
    }

    assert!(ahrs.quaternion().approx_eq(&Quaternion::identity(), 1e-3));
    let gravity = ahrs.gravity();
    assert!((gravity - Vector3::new(0.0, 0.0, 9.81)).norm() < 1e-2, "{gravity:?}");
}

/// Test the NED gravity convention at rest
#[test]
fn test_ned_gravity_points_down() {
    for strategy in [Strategy::Complementary, Strategy::Madgwick, Strategy::Mahony, Strategy::KalmanMadgwick] {
        let mut ahrs = Ahrs::new(AhrsConfig::default(), strategy).unwrap();
        for _ in 0..100 {
            ahrs.update(&ned_at_rest()).unwrap();
        }
        let gravity = ahrs.gravity();
        assert!((gravity - Vector3::new(0.0, 0.0, -9.81)).norm() < 1e-2, "{strategy:?}: {gravity:?}");
    }
}

/// Test yaw tracking from the gyroscope while gravity stays vertical
#[test]
fn test_kalman_complementary_tracks_yaw_rate() {
    let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::KalmanComplementary).unwrap();
    let mut sample = ned_at_rest();
    sample.gyroscope = Vector3::new(0.0, 0.0, 0.5);

    // two seconds at 0.5 rad/s
    for _ in 0..200 {
        ahrs.update(&sample).unwrap();
    }

    let yaw = ahrs.euler_angles().z;
    assert!((yaw.abs() - 1.0).abs() < 0.05, "yaw {yaw}");
    assert!((ahrs.gravity() - Vector3::new(0.0, 0.0, -9.81)).norm() < 1e-2);
}

/// Test the startup calibration timeline with the default 200/100 plan
#[test]
fn test_startup_calibration_timeline() {
    let mut ahrs = Ahrs::new(enu_config(), Strategy::ComplementaryMagnetic).unwrap();
    let plan = CalibrationPlan::default();
    assert_eq!(plan, CalibrationPlan { discard: 200, mean: 100 });

    for _ in 0..300 {
        assert_eq!(
            ahrs.calibrate(&enu_at_rest(), plan).unwrap(),
            CalibrationStatus::InProgress
        );
    }
    assert_eq!(ahrs.calibrate(&enu_at_rest(), plan).unwrap(), CalibrationStatus::Done);

    let diff = ahrs.diff();
    for _ in 0..50 {
        ahrs.update(&enu_at_rest()).unwrap();
    }
    assert_eq!(ahrs.diff(), diff);
    assert!(ahrs.quaternion().approx_eq(&Quaternion::identity(), 1e-3));
}

/// Test that a mounting tilt captured at startup is removed from the output
#[test]
fn test_startup_reference_removes_mounting_tilt() {
    let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::KalmanComplementary).unwrap();
    let mut sample = ned_at_rest();
    sample.accelerometer = Quaternion::from_y_rotation(0.15).rotate(sample.accelerometer);

    let plan = CalibrationPlan { discard: 100, mean: 50 };
    while ahrs.calibrate(&sample, plan).unwrap() == CalibrationStatus::InProgress {}

    for _ in 0..50 {
        ahrs.update(&sample).unwrap();
    }
    assert!(!ahrs.estimate().approx_eq(&Quaternion::identity(), 1e-2));
    assert!(ahrs.quaternion().approx_eq(&Quaternion::identity(), 1e-2));
}

/// Test construction and runtime errors
#[test]
fn test_configuration_errors() {
    let direct = AhrsConfig {
        update_type: UpdateType::Direct,
        ..Default::default()
    };
    for strategy in Strategy::ALL {
        let result = Ahrs::new(direct, strategy);
        assert_eq!(result.is_err(), strategy.requires_kalman(), "{strategy:?}");
    }

    assert!(matches!(
        Ahrs::new(enu_config(), Strategy::KalmanComplementaryMagnetic),
        Err(AhrsError::UnsupportedFrame { .. })
    ));

    let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::Mahony).unwrap();
    let mut sample = ned_at_rest();
    sample.delta_time = -1.0;
    assert_eq!(ahrs.update(&sample), Err(AhrsError::InvalidTimeStep(-1.0)));

    let plan = CalibrationPlan { discard: 5, mean: 0 };
    assert!(matches!(
        ahrs.calibrate(&ned_at_rest(), plan),
        Err(AhrsError::InvalidCalibrationPlan { .. })
    ));
}

/// Test that strategies can be swapped mid-stream without losing attitude
#[test]
fn test_strategy_swap_keeps_attitude() {
    let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::ComplementaryMagnetic).unwrap();
    let sample = ned_at_rest();

    for strategy in [
        Strategy::MadgwickMagnetic,
        Strategy::MahonyMagnetic,
        Strategy::KalmanComplementaryMagnetic,
        Strategy::KalmanMadgwick,
    ] {
        for _ in 0..50 {
            ahrs.update(&sample).unwrap();
        }
        ahrs.set_strategy(strategy).unwrap();
        assert_eq!(ahrs.strategy(), strategy);
    }
    for _ in 0..50 {
        ahrs.update(&sample).unwrap();
    }
    assert!((ahrs.gravity() - sample.accelerometer).norm() < 1e-2);
}

/// Test that engines share no state
#[test]
fn test_independent_instances() {
    let mut spinning = Ahrs::new(AhrsConfig::default(), Strategy::GyroscopeOnly).unwrap();
    let mut still = Ahrs::new(AhrsConfig::default(), Strategy::GyroscopeOnly).unwrap();

    let mut sample = ned_at_rest();
    sample.gyroscope = Vector3::new(0.3, 0.0, 0.0);
    for _ in 0..100 {
        spinning.update(&sample).unwrap();
        still.update(&ned_at_rest()).unwrap();
    }

    assert!(!spinning.quaternion().approx_eq(&Quaternion::identity(), 1e-2));
    assert_eq!(still.quaternion(), Quaternion::identity());
}

/// Test that configured hard-iron offset and biases are removed before fusion
#[test]
fn test_sensor_corrections_applied() {
    let offset = Vector3::new(12.0, -7.0, 3.0);
    let accel_bias = Vector3::new(0.05, -0.02, 0.1);
    let corrected = AhrsConfig {
        hard_iron_offset: offset,
        accelerometer_bias: accel_bias,
        ..Default::default()
    };

    let mut clean = Ahrs::new(AhrsConfig::default(), Strategy::ComplementaryMagnetic).unwrap();
    let mut distorted = Ahrs::new(corrected, Strategy::ComplementaryMagnetic).unwrap();

    let mut raw = ned_at_rest();
    raw.magnetometer += offset;
    raw.accelerometer -= accel_bias;

    for _ in 0..20 {
        clean.update(&ned_at_rest()).unwrap();
        distorted.update(&raw).unwrap();
    }
    assert!(clean.quaternion().approx_eq(&distorted.quaternion(), 1e-5));
}

/// Test reset after fusion returns every output to its initial value
#[test]
fn test_reset_after_motion() {
    let mut ahrs = Ahrs::new(AhrsConfig::default(), Strategy::KalmanComplementaryMagnetic).unwrap();
    let mut sample = ned_at_rest();
    sample.gyroscope = Vector3::new(0.1, 0.2, -0.1);
    for _ in 0..100 {
        ahrs.update(&sample).unwrap();
    }

    ahrs.reset().unwrap();
    assert_eq!(ahrs.quaternion(), Quaternion::identity());
    assert_eq!(ahrs.gravity(), Vector3::zeros());
    assert_eq!(ahrs.linear_acceleration(), Vector3::zeros());
    assert_eq!(ahrs.magnetic_reference(), Vector3::zeros());
}
