use kalman_ahrs::{QUATERNION_EPSILON, Quaternion};
use nalgebra::{UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

fn random_unit(rng: &mut Pcg64) -> Quaternion {
    Quaternion::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
    .normalize()
}

fn random_vector(rng: &mut Pcg64) -> Vector3<f32> {
    Vector3::new(
        rng.random_range(-10.0..10.0),
        rng.random_range(-10.0..10.0),
        rng.random_range(-10.0..10.0),
    )
}

/// Test that products of unit quaternions stay unit and conjugates invert
#[test]
fn test_unit_products_and_inverse() {
    let mut rng = Pcg64::seed_from_u64(1);
    for _ in 0..100 {
        let a = random_unit(&mut rng);
        let b = random_unit(&mut rng);

        assert!(((a * b).norm() - 1.0).abs() < QUATERNION_EPSILON);
        assert!((a * a.conjugate()).approx_eq(&Quaternion::identity(), QUATERNION_EPSILON));
        assert!((a * b).conjugate().approx_eq(&(b.conjugate() * a.conjugate()), QUATERNION_EPSILON));
    }
}

/// Test that rotation agrees with nalgebra and preserves length
#[test]
fn test_rotation_matches_nalgebra() {
    let mut rng = Pcg64::seed_from_u64(2);
    for _ in 0..100 {
        let q = random_unit(&mut rng);
        let v = random_vector(&mut rng);

        let expected = UnitQuaternion::from_quaternion(q.into()) * v;
        let rotated = q.rotate(v);
        assert!((rotated - expected).norm() < 1e-3, "{q:?} {v:?}");
        assert!((rotated.norm() - v.norm()).abs() < 1e-3);
    }
}

/// Test that composing rotations equals rotating twice
#[test]
fn test_composition_order() {
    let mut rng = Pcg64::seed_from_u64(3);
    let a = random_unit(&mut rng);
    let b = random_unit(&mut rng);
    let v = random_vector(&mut rng);

    let twice = a.rotate(b.rotate(v));
    let composed = (a * b).rotate(v);
    assert!((twice - composed).norm() < 1e-3);
}

/// Test slerp endpoints and constant angular speed
#[test]
fn test_slerp_properties() {
    let start = Quaternion::from_z_rotation(0.2);
    let end = Quaternion::from_z_rotation(1.4);

    assert!(start.slerp(&end, 0.0).approx_eq(&start, QUATERNION_EPSILON));
    assert!(start.slerp(&end, 1.0).approx_eq(&end, QUATERNION_EPSILON));

    for t in [0.25, 0.5, 0.75] {
        let q = start.slerp(&end, t);
        let expected = Quaternion::from_z_rotation(0.2 + 1.2 * t);
        assert!(q.approx_eq(&expected, QUATERNION_EPSILON), "t {t}: {q:?}");
        assert!((q.norm() - 1.0).abs() < QUATERNION_EPSILON);
    }
}

/// Test axis-angle and Euler conversions against construction
#[test]
fn test_conversions() {
    let axis = Vector3::new(1.0, 2.0, -2.0).normalize();
    let q = Quaternion::from_axis_angle(axis, 0.8);
    let (recovered_axis, angle) = q.to_axis_angle();
    assert!((angle - 0.8).abs() < QUATERNION_EPSILON);
    assert!((recovered_axis - axis).norm() < 1e-3);

    let euler = Vector3::new(0.3, -0.4, 1.1);
    let q = Quaternion::from_euler_zyx(euler);
    assert!((q.to_euler_zyx() - euler).norm() < 1e-3);

    let (roll, pitch, yaw) = q.to_unit().euler_angles();
    assert!((Vector3::new(roll, pitch, yaw) - euler).norm() < 1e-3);
}

/// Test the angle between orientations
#[test]
fn test_angle_between() {
    let a = Quaternion::from_x_rotation(0.1);
    let b = Quaternion::from_x_rotation(0.7);
    // acos of the dot is half the relative rotation
    assert!((a.angle_between(&b) - 0.3).abs() < 1e-3);
    assert!(a.angle_between(&a).abs() < 1e-2);
}
