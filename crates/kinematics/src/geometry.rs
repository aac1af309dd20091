//! Board geometry constants (spec §3 "Board geometry constants").

/// Fixed physical layout of a polargraph board and gondola.
///
/// All distances are in millimetres. The origin is the top-left corner of
/// the drawable board; `+x` is right, `+y` is down.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardGeometry {
    /// Board width, anchor to anchor.
    pub width_mm: f64,
    /// Board height.
    pub height_mm: f64,
    /// Half the distance between the gondola's two string attachment
    /// points, symmetric about the pen (`CONNECTION_TO_PEN_DISTANCE`).
    pub pen_offset_mm: f64,
    /// Vertical offset of both motors above the board's top edge.
    pub motor_offset_mm: f64,
    /// Spool diameter, for converting string length to motor revolutions.
    pub spool_diameter_mm: f64,
    /// Full steps per motor revolution (before microstepping).
    pub steps_per_rev: u32,
    /// Microstepping multiplier.
    pub microsteps: u32,
}

impl BoardGeometry {
    /// `STEPS_PER_MM = (STEPS_PER_REV * MICROSTEPS) / (pi * SPOOL_DIAMETER_MM)`.
    pub fn steps_per_mm(&self) -> f64 {
        (self.steps_per_rev as f64 * self.microsteps as f64)
            / (std::f64::consts::PI * self.spool_diameter_mm)
    }

    /// `round(length_mm * steps_per_mm)` as a 64-bit integer (spec §4.1
    /// "Length-to-steps").
    pub fn length_to_steps(&self, length_mm: f64) -> i64 {
        (length_mm * self.steps_per_mm()).round() as i64
    }

    /// Inverse of [`Self::length_to_steps`], for reporting string length
    /// back from the integer step-count truth.
    pub fn steps_to_length(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_mm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn steps_per_mm_matches_formula() {
        let g = geometry();
        let expected = (200.0 * 16.0) / (std::f64::consts::PI * 12.0);
        assert!((g.steps_per_mm() - expected).abs() < 1e-9);
    }

    #[test]
    fn length_to_steps_round_trips_through_steps_to_length() {
        let g = geometry();
        let steps = g.length_to_steps(500.0);
        let back = g.steps_to_length(steps);
        assert!((back - 500.0).abs() < 0.01);
    }
}
