//! Machine State
//!
//! Defines `MachineState`, the authoritative physical pose (spec §3). It is
//! shared behind a single mutex; the motion task is the sole writer after
//! startup, the HTTP task reads it for status and writes it only during
//! initialization.

use polargraph_kinematics::{forward_kinematics, BoardGeometry, Lengths};
use serde::Serialize;

/// The authoritative physical pose of the machine.
///
/// Invariant: after every successful move, `left_steps ==
/// round(left_len_mm * STEPS_PER_MM)` (and the same for the right side), and
/// `(x_mm, y_mm)` is consistent with `(left_len_mm, right_len_mm)` to within
/// a rounding tolerance (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct MachineState {
    pub x_mm: f64,
    pub y_mm: f64,
    pub left_len_mm: f64,
    pub right_len_mm: f64,
    pub left_steps: i64,
    pub right_steps: i64,
    pub pen_down: bool,
    pub initialized: bool,
}

impl MachineState {
    /// The machine boots uninitialized: no pose is known until a
    /// `start_position` is accepted (spec §6.1, §6.4 "Persistence").
    pub fn uninitialized() -> Self {
        Self {
            x_mm: 0.0,
            y_mm: 0.0,
            left_len_mm: 0.0,
            right_len_mm: 0.0,
            left_steps: 0,
            right_steps: 0,
            pen_down: false,
            initialized: false,
        }
    }

    /// Declares the current physical pose from lengths, synchronizing the
    /// integer step counters and pose without any physical motion (spec
    /// §6.1 "start_position... does not move to it").
    pub fn set_from_lengths(&mut self, geometry: &BoardGeometry, lengths: Lengths, pen_down: bool) {
        self.left_len_mm = lengths.left_mm;
        self.right_len_mm = lengths.right_mm;
        self.left_steps = geometry.length_to_steps(lengths.left_mm);
        self.right_steps = geometry.length_to_steps(lengths.right_mm);
        if let Ok(pos) = forward_kinematics(geometry, lengths) {
            self.x_mm = pos.x;
            self.y_mm = pos.y;
        }
        self.pen_down = pen_down;
        self.initialized = true;
    }

    /// Commits the result of a completed move (spec §4.4 scheduler step 6).
    pub fn commit_move(
        &mut self,
        geometry: &BoardGeometry,
        left_steps: i64,
        right_steps: i64,
        pen_down: bool,
    ) {
        self.left_steps = left_steps;
        self.right_steps = right_steps;
        self.left_len_mm = geometry.steps_to_length(left_steps);
        self.right_len_mm = geometry.steps_to_length(right_steps);
        if let Ok(pos) = forward_kinematics(
            geometry,
            Lengths {
                left_mm: self.left_len_mm,
                right_mm: self.right_len_mm,
            },
        ) {
            self.x_mm = pos.x;
            self.y_mm = pos.y;
        }
        self.pen_down = pen_down;
    }
}
