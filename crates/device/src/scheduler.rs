//! Scheduler Loop
//!
//! The single motion worker: dequeues one point at a time and drives the
//! pulse engine to reach it (spec §4.4 "Scheduler loop"). Runs on its own
//! OS thread rather than as a tokio task, so its timing is never at the
//! mercy of the async runtime's scheduler (spec §9 "Async vs
//! dedicated-thread motion") — the same reasoning `klipper-host` applies by
//! giving the MCU client its own `tokio::spawn`paired task, taken one step
//! further here because the pulse loop is latency-sensitive in a way pure
//! async I/O is not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use parking_lot::Mutex;
use polargraph_kinematics::{checked_step_delta, inverse_kinematics, BoardGeometry, Lengths, Position};
use tracing::{info, warn};

use crate::config::MotionLimits;
use crate::control::{ControlCommand, ControlError, ControlRequest, JogMotor};
use crate::pen::{PenActuator, PenState};
use crate::pulse::{clamp_speed, effective_speed, PulseEngine, PulseError};
use crate::queue::{JobQueue, Target};
use crate::state::MachineState;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Scheduler {
    queue: Arc<Mutex<JobQueue>>,
    state: Arc<Mutex<MachineState>>,
    geometry: BoardGeometry,
    limits: MotionLimits,
    cancel_requested: Arc<AtomicBool>,
    pulse_engine: PulseEngine,
    pen: PenActuator,
    control_rx: Receiver<ControlRequest>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<Mutex<JobQueue>>,
        state: Arc<Mutex<MachineState>>,
        geometry: BoardGeometry,
        limits: MotionLimits,
        cancel_requested: Arc<AtomicBool>,
        pulse_engine: PulseEngine,
        pen: PenActuator,
        control_rx: Receiver<ControlRequest>,
    ) -> Self {
        Self {
            queue,
            state,
            geometry,
            limits,
            cancel_requested,
            pulse_engine,
            pen,
            control_rx,
        }
    }

    /// Runs forever. Call from a dedicated `std::thread::spawn`, not a
    /// tokio task.
    pub fn run(mut self) -> ! {
        info!("motion scheduler started");
        loop {
            self.tick();
        }
    }

    fn tick(&mut self) {
        // Polled at the top of every scheduler iteration (spec §5
        // "Cancellation"), so a cancel arriving while idle (or between
        // batches) is still honored promptly.
        if self.cancel_requested.swap(false, Ordering::SeqCst) {
            self.handle_cancel();
            return;
        }

        if let Ok(request) = self.control_rx.try_recv() {
            self.handle_control(request);
            return;
        }

        let point = {
            let mut q = self.queue.lock();
            if q.is_executing() && !q.is_empty() {
                q.pop_front()
            } else {
                None
            }
        };

        let Some(point) = point else {
            // The queue can empty out before `endOfJob` arrives (the last
            // point finishes driving before the closing `/api/path` call
            // lands), so idle ticks must also watch for that transition —
            // not just the tick that just popped the final point.
            let mut q = self.queue.lock();
            if q.is_executing() && q.is_empty() && q.end_of_job() {
                q.set_executing(false);
                q.set_end_of_job(false);
                info!("job complete: queue drained at end_of_job");
            }
            drop(q);
            sleep(IDLE_POLL_INTERVAL);
            return;
        };

        let (current_left, current_right) = {
            let s = self.state.lock();
            (s.left_steps, s.right_steps)
        };

        let lengths = match point.target {
            Target::Lengths { l1, l2 } => Lengths {
                left_mm: l1,
                right_mm: l2,
            },
            Target::Position { x, y } => {
                match inverse_kinematics(&self.geometry, Position { x, y }) {
                    Ok(lengths) => lengths,
                    Err(err) => {
                        warn!(%err, "kinematic failure resolving queued point; aborting job");
                        self.abort_job();
                        return;
                    }
                }
            }
        };

        let target_left_steps = self.geometry.length_to_steps(lengths.left_mm);
        let target_right_steps = self.geometry.length_to_steps(lengths.right_mm);

        let (delta_left, delta_right) = match (
            checked_step_delta(target_left_steps - current_left),
            checked_step_delta(target_right_steps - current_right),
        ) {
            (Ok(l), Ok(r)) => (l, r),
            _ => {
                warn!("step delta overflow resolving queued point; aborting job");
                self.abort_job();
                return;
            }
        };

        let target_pen_down = point.pen_down;
        let pen_currently_down = self.pen.state() == PenState::Down;
        if target_pen_down != pen_currently_down {
            self.pen.set_state(if target_pen_down {
                PenState::Down
            } else {
                PenState::Up
            });
        }

        let speed = clamp_speed(point.speed, self.limits.max_speed, self.limits.travel_speed);
        let speed = effective_speed(speed, target_pen_down, self.limits.travel_speed);

        match self.pulse_engine.drive(delta_left, delta_right, speed) {
            Ok(()) => {
                {
                    let mut s = self.state.lock();
                    s.commit_move(
                        &self.geometry,
                        target_left_steps,
                        target_right_steps,
                        target_pen_down,
                    );
                }
                let mut q = self.queue.lock();
                if q.is_empty() && q.end_of_job() {
                    q.set_executing(false);
                    q.set_end_of_job(false);
                    info!("job complete: queue drained at end_of_job");
                }
            }
            Err(PulseError::Cancelled) => {
                self.handle_cancel();
            }
        }
    }

    /// Services one `/api/move` or `/api/pen` request. Run inline with the
    /// scheduler tick so it never races the pulse engine or pen actuator
    /// those HTTP handlers don't own (spec §9 open question 3).
    fn handle_control(&mut self, request: ControlRequest) {
        let result = match request.command {
            ControlCommand::Jog { motor, steps, speed } => {
                if self.queue.lock().is_executing() {
                    Err(ControlError::Busy)
                } else {
                    let (delta_left, delta_right) = match motor {
                        JogMotor::Left => (steps, 0),
                        JogMotor::Right => (0, steps),
                    };
                    // A diagnostic jog never touches MachineState: it is a
                    // raw motor test, not a drawing move (spec §4.5).
                    let _ = self.pulse_engine.drive(delta_left, delta_right, speed);
                    Ok(())
                }
            }
            ControlCommand::Pen { pen_down } => {
                self.pen
                    .set_state(if pen_down { PenState::Down } else { PenState::Up });
                Ok(())
            }
        };
        let _ = request.reply.send(result);
    }

    fn abort_job(&mut self) {
        let mut q = self.queue.lock();
        q.clear();
        warn!("queue cleared after kinematic failure; executing=false");
    }

    fn handle_cancel(&mut self) {
        self.pulse_engine.disable_outputs();
        self.pen.set_state(PenState::Up);
        let mut q = self.queue.lock();
        q.clear();
        self.cancel_requested.store(false, Ordering::SeqCst);
        warn!("motion cancelled: outputs disabled, pen up, queue cleared");
    }
}
