//! Pen Actuator
//!
//! A single-channel servo abstraction with debounced state (spec §4.3).
//! The `Servo` trait is the seam real PWM hardware would plug into; the
//! `--mock-gpio` run path uses `LoggingServo` in its place.

use std::thread::sleep;
use std::time::Duration;

/// Current pen actuator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenState {
    Up,
    Down,
}

/// Anything that can move to an absolute servo angle, in degrees.
pub trait Servo: Send {
    fn set_angle(&mut self, degrees: f64);
}

/// A servo that only logs the angle it was asked to reach. Used when no
/// physical pen lift hardware is wired up.
pub struct LoggingServo {
    label: &'static str,
}

impl LoggingServo {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl Servo for LoggingServo {
    fn set_angle(&mut self, degrees: f64) {
        tracing::debug!(servo = self.label, degrees, "servo angle set");
    }
}

/// Two angles and a settle delay, plus the actuator's cached state so
/// repeated same-state commands are no-ops (spec §4.3, testable property 8).
pub struct PenActuator {
    servo: Box<dyn Servo>,
    up_angle_deg: f64,
    down_angle_deg: f64,
    settle_delay: Duration,
    state: PenState,
}

impl PenActuator {
    pub fn new(
        servo: Box<dyn Servo>,
        up_angle_deg: f64,
        down_angle_deg: f64,
        settle_delay: Duration,
    ) -> Self {
        // The actuator starts in the `Up` state: the physical servo is
        // assumed parked at rest until the first command moves it.
        Self {
            servo,
            up_angle_deg,
            down_angle_deg,
            settle_delay,
            state: PenState::Up,
        }
    }

    pub fn state(&self) -> PenState {
        self.state
    }

    /// Transitions to the requested state. A transition to the already
    /// current state is a no-op and does not consume the settle delay.
    pub fn set_state(&mut self, target: PenState) {
        if target == self.state {
            return;
        }
        let angle = match target {
            PenState::Up => self.up_angle_deg,
            PenState::Down => self.down_angle_deg,
        };
        self.servo.set_angle(angle);
        sleep(self.settle_delay);
        self.state = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingServo {
        angles: Arc<Mutex<Vec<f64>>>,
    }
    impl Servo for RecordingServo {
        fn set_angle(&mut self, degrees: f64) {
            self.angles.lock().unwrap().push(degrees);
        }
    }

    #[test]
    fn repeated_same_state_command_is_a_no_op() {
        let angles = Arc::new(Mutex::new(Vec::new()));
        let servo = RecordingServo {
            angles: angles.clone(),
        };
        let mut actuator = PenActuator::new(
            Box::new(servo),
            90.0,
            0.0,
            Duration::from_millis(0),
        );

        actuator.set_state(PenState::Up); // already Up: no-op
        assert_eq!(angles.lock().unwrap().len(), 0);

        actuator.set_state(PenState::Down);
        assert_eq!(angles.lock().unwrap().len(), 1);

        actuator.set_state(PenState::Down); // already Down: no-op
        assert_eq!(angles.lock().unwrap().len(), 1);

        actuator.set_state(PenState::Up);
        assert_eq!(angles.lock().unwrap().len(), 2);
    }
}
