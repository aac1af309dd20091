//! Error types for the kinematics crate.

use thiserror::Error;

/// Reasons the kinematic model refuses a point.
#[derive(Debug, Error, Clone, Copy)]
pub enum KinematicsError {
    /// `x` or `y` was negative; the pen cannot travel off the board.
    #[error("target ({x}, {y}) is outside the board")]
    OutOfBounds { x: f64, y: f64 },
    /// A computed string length was not finite (NaN or infinite).
    #[error("computed string length was not finite")]
    NonFiniteLength,
    /// Forward kinematics: the junction denominator was too close to zero to
    /// invert reliably.
    #[error("forward kinematics denominator near zero")]
    DegenerateGeometry,
    /// Forward kinematics: the radicand under the square root went negative,
    /// meaning the two lengths are not mutually consistent.
    #[error("lengths ({l1}, {l2}) do not describe a reachable point")]
    UnreachableLengths { l1: f64, l2: f64 },
    /// A signed step delta exceeded the 32-bit range the pulse engine accepts.
    #[error("step delta {0} exceeds i32 range")]
    StepDeltaOverflow(i64),
}
