#![deny(clippy::all)]

//! # Polargraph Kinematics
//!
//! Pure functions mapping pen position to string lengths and back (spec
//! §4.1). These never touch I/O, locks, or timing — they are the same kind
//! of leaf-level translation `motion::kinematics::Kinematics` performs for a
//! Cartesian printer, specialized to the two-string polargraph geometry.

pub mod error;
pub mod geometry;

pub use error::KinematicsError;
pub use geometry::BoardGeometry;

/// A pen-tip position in board coordinates, millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The two string lengths from motor anchors to gondola attachment points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lengths {
    pub left_mm: f64,
    pub right_mm: f64,
}

/// Computes the two string lengths for a target pen position (spec §4.1
/// "Inverse kinematics").
///
/// Fails when `x < 0`, `y < 0`, or either resulting length is non-finite.
pub fn inverse_kinematics(
    geometry: &BoardGeometry,
    target: Position,
) -> Result<Lengths, KinematicsError> {
    if target.x < 0.0 || target.y < 0.0 {
        return Err(KinematicsError::OutOfBounds {
            x: target.x,
            y: target.y,
        });
    }

    let d = geometry.pen_offset_mm;
    let h = geometry.motor_offset_mm;
    let w = geometry.width_mm;

    let left_attach_x = target.x - d;
    let right_attach_x = target.x + d;
    let motor_relative_y = target.y + h;

    let left_mm = ((left_attach_x).powi(2) + motor_relative_y.powi(2)).sqrt();
    let right_mm = ((w - right_attach_x).powi(2) + motor_relative_y.powi(2)).sqrt();

    if !left_mm.is_finite() || !right_mm.is_finite() {
        return Err(KinematicsError::NonFiniteLength);
    }

    Ok(Lengths { left_mm, right_mm })
}

/// Recovers a pen position from the two string lengths (spec §4.1 "Forward
/// kinematics"). Used for status reporting only; the motion path carries
/// lengths as the source of truth.
///
/// Fails when the junction denominator is near zero or the radicand under
/// the square root is negative.
pub fn forward_kinematics(
    geometry: &BoardGeometry,
    lengths: Lengths,
) -> Result<Position, KinematicsError> {
    let d = geometry.pen_offset_mm;
    let h = geometry.motor_offset_mm;
    let w_prime = geometry.width_mm - d;

    let denominator = 2.0 * (d - w_prime);
    if denominator.abs() < 1e-9 {
        return Err(KinematicsError::DegenerateGeometry);
    }

    let l1 = lengths.left_mm;
    let l2 = lengths.right_mm;

    let x = (l2.powi(2) - l1.powi(2) + d.powi(2) - w_prime.powi(2)) / denominator;

    let radicand = l1.powi(2) - (x - d).powi(2);
    if radicand < 0.0 {
        return Err(KinematicsError::UnreachableLengths { l1, l2 });
    }

    let y = radicand.sqrt() - h;

    Ok(Position { x, y })
}

/// Validates that a signed step delta fits the pulse engine's 32-bit range
/// (spec §4.2 "Edge cases").
pub fn checked_step_delta(delta: i64) -> Result<i32, KinematicsError> {
    i32::try_from(delta).map_err(|_| KinematicsError::StepDeltaOverflow(delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn geometry() -> BoardGeometry {
        BoardGeometry {
            width_mm: 1150.0,
            height_mm: 830.0,
            pen_offset_mm: 50.0,
            motor_offset_mm: 100.0,
            spool_diameter_mm: 12.0,
            steps_per_rev: 200,
            microsteps: 16,
        }
    }

    #[test]
    fn inverse_kinematics_rejects_negative_coordinates() {
        let g = geometry();
        assert!(matches!(
            inverse_kinematics(&g, Position { x: -1.0, y: 10.0 }),
            Err(KinematicsError::OutOfBounds { .. })
        ));
        assert!(matches!(
            inverse_kinematics(&g, Position { x: 10.0, y: -1.0 }),
            Err(KinematicsError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn inverse_kinematics_matches_hand_worked_example() {
        let g = geometry();
        let lengths = inverse_kinematics(&g, Position { x: 575.0, y: 365.0 }).unwrap();
        // left: dx = 575 - 50 = 525, dy = 365 + 100 = 465
        let expected_left = (525.0_f64.powi(2) + 465.0_f64.powi(2)).sqrt();
        // right: dx = 1150 - (575 + 50) = 525, dy = 465
        let expected_right = (525.0_f64.powi(2) + 465.0_f64.powi(2)).sqrt();
        assert!((lengths.left_mm - expected_left).abs() < 1e-9);
        assert!((lengths.right_mm - expected_right).abs() < 1e-9);
    }

    #[test]
    fn forward_kinematics_rejects_unreachable_lengths() {
        let g = geometry();
        let err = forward_kinematics(
            &g,
            Lengths {
                left_mm: 1.0,
                right_mm: 1.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, KinematicsError::UnreachableLengths { .. }));
    }

    #[test]
    fn checked_step_delta_rejects_overflow() {
        assert!(checked_step_delta(i64::from(i32::MAX) + 1).is_err());
        assert!(checked_step_delta(-(i64::from(i32::MAX) + 2)).is_err());
        assert_eq!(checked_step_delta(42).unwrap(), 42);
    }

    proptest! {
        /// Spec §8 property 2: round-trip through inverse then forward
        /// kinematics reproduces the original point to within 0.01 mm, for
        /// any point within the board's reachable strip.
        #[test]
        fn kinematic_round_trip(
            x in 50.0_f64..1100.0,
            y in 0.0_f64..800.0,
        ) {
            let g = geometry();
            let target = Position { x, y };
            let lengths = inverse_kinematics(&g, target).unwrap();
            let back = forward_kinematics(&g, lengths).unwrap();
            prop_assert!((back.x - target.x).abs() < 0.01);
            prop_assert!((back.y - target.y).abs() < 0.01);
        }
    }
}
