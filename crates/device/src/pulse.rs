//! Dual-Stepper Pulse Engine
//!
//! Drives both motors so that signed step counts `(delta_left, delta_right)`
//! finish simultaneously, producing a straight diagonal in step space (spec
//! §4.2). This is Bresenham's line algorithm run in step space rather than
//! pixel space — the same technique `motion::planner`'s `bresenham_step`
//! helper uses to interleave multiple axes, simplified here to the fixed
//! cadence spec §4.2 calls for (no acceleration profiling).
//!
//! The loop runs on a dedicated blocking thread (spec §9 "Async vs
//! dedicated-thread motion"); it holds neither the queue lock nor the state
//! lock while pulsing, so the HTTP task can keep accepting submissions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PulseError {
    #[error("cancelled mid-move")]
    Cancelled,
}

/// A single step line. Pulsing means one rising edge held high for
/// `MIN_PULSE_US` then returned low.
pub trait StepPin: Send {
    fn pulse(&mut self, min_pulse: Duration);
    fn disable(&mut self);
}

/// A single direction line.
pub trait DirPin: Send {
    /// `true` means the positive-delta polarity for this pin. Spec §9 open
    /// question 1: the correct electrical level for "positive" is
    /// hardware-dependent; `invert` makes that configurable per motor.
    fn set(&mut self, positive: bool);
}

/// A direction pin that logs what it was set to; the electrical polarity for
/// "positive" is supplied at construction so hardware variants with
/// `HIGH`-for-positive or `LOW`-for-positive wiring are both representable.
pub struct LoggingDirPin {
    label: &'static str,
    invert: bool,
}

impl LoggingDirPin {
    pub fn new(label: &'static str, invert: bool) -> Self {
        Self { label, invert }
    }
}

impl DirPin for LoggingDirPin {
    fn set(&mut self, positive: bool) {
        let level = positive ^ self.invert;
        tracing::trace!(pin = self.label, level, "dir pin set");
    }
}

/// A step pin that logs each pulse. Used when `--mock-gpio` stands in for
/// real silicon.
pub struct LoggingStepPin {
    label: &'static str,
}

impl LoggingStepPin {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl StepPin for LoggingStepPin {
    fn pulse(&mut self, min_pulse: Duration) {
        tracing::trace!(pin = self.label, "step pulse");
        sleep(min_pulse);
    }

    fn disable(&mut self) {
        tracing::debug!(pin = self.label, "step output disabled");
    }
}

/// Speed policy constants and clamping (spec §4.2 "Speed policy").
pub const MIN_PULSE_US: u64 = 5;

pub fn clamp_speed(requested: u32, max_speed: u32, default_speed: u32) -> u32 {
    if requested == 0 {
        default_speed.clamp(1, max_speed)
    } else {
        requested.clamp(1, max_speed)
    }
}

/// If the move is pen-up, the effective speed is raised to at least
/// `travel_speed` so rapid repositioning is fast (spec §4.2, testable
/// property 6).
pub fn effective_speed(requested_speed: u32, pen_down: bool, travel_speed: u32) -> u32 {
    if pen_down {
        requested_speed
    } else {
        requested_speed.max(travel_speed)
    }
}

pub struct PulseEngine {
    left_step: Box<dyn StepPin>,
    left_dir: Box<dyn DirPin>,
    right_step: Box<dyn StepPin>,
    right_dir: Box<dyn DirPin>,
    min_pulse: Duration,
    cancel_requested: Arc<AtomicBool>,
}

impl PulseEngine {
    pub fn new(
        left_step: Box<dyn StepPin>,
        left_dir: Box<dyn DirPin>,
        right_step: Box<dyn StepPin>,
        right_dir: Box<dyn DirPin>,
        min_pulse_us: u64,
        cancel_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            left_step,
            left_dir,
            right_step,
            right_dir,
            min_pulse: Duration::from_micros(min_pulse_us),
            cancel_requested,
        }
    }

    /// Disables both step outputs. Called on cancel and on pulse-engine
    /// failure (spec §4.2 step 1, §7 "Motion aborts").
    pub fn disable_outputs(&mut self) {
        self.left_step.disable();
        self.right_step.disable();
    }

    /// Drives both motors through their signed step deltas, finishing
    /// simultaneously (spec §4.2 "Algorithm").
    ///
    /// Returns `Ok(())` on completion, or `Err(PulseError::Cancelled)` if
    /// `cancel_requested` was observed mid-move; in that case outputs are
    /// already disabled before returning.
    pub fn drive(
        &mut self,
        delta_left: i32,
        delta_right: i32,
        target_speed: u32,
    ) -> Result<(), PulseError> {
        let n_l = delta_left.unsigned_abs();
        let n_r = delta_right.unsigned_abs();
        let n = n_l.max(n_r);

        self.left_dir.set(delta_left >= 0);
        self.right_dir.set(delta_right >= 0);

        if n == 0 {
            return Ok(());
        }

        let step_delay = Duration::from_micros(
            (1_000_000u64 / target_speed.max(1) as u64).max(4 * MIN_PULSE_US),
        );

        let mut left_acc: u32 = 0;
        let mut right_acc: u32 = 0;

        for i in 0..n {
            if self.cancel_requested.load(Ordering::SeqCst) {
                self.disable_outputs();
                return Err(PulseError::Cancelled);
            }

            left_acc += n_l;
            right_acc += n_r;

            if left_acc >= n {
                left_acc -= n;
                self.left_step.pulse(self.min_pulse);
            }
            if right_acc >= n {
                right_acc -= n;
                self.right_step.pulse(self.min_pulse);
            }

            sleep(step_delay);

            if i % 100 == 0 {
                std::thread::yield_now();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc as StdArc, Mutex};

    struct CountingStepPin {
        count: StdArc<Mutex<u32>>,
    }
    impl StepPin for CountingStepPin {
        fn pulse(&mut self, _min_pulse: Duration) {
            *self.count.lock().unwrap() += 1;
        }
        fn disable(&mut self) {}
    }
    struct NullDirPin;
    impl DirPin for NullDirPin {
        fn set(&mut self, _positive: bool) {}
    }

    fn engine_with_counters() -> (PulseEngine, StdArc<Mutex<u32>>, StdArc<Mutex<u32>>) {
        let left_count = StdArc::new(Mutex::new(0));
        let right_count = StdArc::new(Mutex::new(0));
        let engine = PulseEngine::new(
            Box::new(CountingStepPin {
                count: left_count.clone(),
            }),
            Box::new(NullDirPin),
            Box::new(CountingStepPin {
                count: right_count.clone(),
            }),
            Box::new(NullDirPin),
            0,
            Arc::new(AtomicBool::new(false)),
        );
        (engine, left_count, right_count)
    }

    #[test]
    fn emits_exact_pulse_counts_regardless_of_ratio() {
        let (mut engine, left_count, right_count) = engine_with_counters();
        engine.drive(700, -130, 100_000).unwrap();
        assert_eq!(*left_count.lock().unwrap(), 700);
        assert_eq!(*right_count.lock().unwrap(), 130);
    }

    #[test]
    fn zero_delta_move_succeeds_with_no_pulses() {
        let (mut engine, left_count, right_count) = engine_with_counters();
        engine.drive(0, 0, 1000).unwrap();
        assert_eq!(*left_count.lock().unwrap(), 0);
        assert_eq!(*right_count.lock().unwrap(), 0);
    }

    #[test]
    fn cancel_halts_before_completion() {
        let cancel = Arc::new(AtomicBool::new(false));
        let left_count = StdArc::new(Mutex::new(0));
        let right_count = StdArc::new(Mutex::new(0));
        let mut engine = PulseEngine::new(
            Box::new(CountingStepPin {
                count: left_count.clone(),
            }),
            Box::new(NullDirPin),
            Box::new(CountingStepPin {
                count: right_count.clone(),
            }),
            Box::new(NullDirPin),
            0,
            cancel.clone(),
        );
        cancel.store(true, Ordering::SeqCst);
        let result = engine.drive(1000, 1000, 100_000);
        assert_eq!(result, Err(PulseError::Cancelled));
        assert_eq!(*left_count.lock().unwrap(), 0);
    }

    #[test]
    fn effective_speed_enforces_travel_floor_only_when_pen_up() {
        assert_eq!(effective_speed(500, false, 2500), 2500);
        assert_eq!(effective_speed(3000, false, 2500), 3000);
        assert_eq!(effective_speed(500, true, 2500), 500);
    }

    #[test]
    fn clamp_speed_uses_default_for_zero_and_clamps_range() {
        assert_eq!(clamp_speed(0, 4000, 1500), 1500);
        assert_eq!(clamp_speed(999_999, 4000, 1500), 4000);
        assert_eq!(clamp_speed(100, 4000, 1500), 100);
    }
}
