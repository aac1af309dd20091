//! Synchronous Control Channel
//!
//! `POST /api/move` (single-motor jog) and `POST /api/pen` are synchronous
//! diagnostic/actuator commands (spec §4.5, §9 open question 3), but the
//! pulse engine and pen actuator they touch are owned by the scheduler
//! thread, not the HTTP task. The HTTP handler hands the command across this
//! channel and blocks for the reply — the same shape `klipper-host::gcode`
//! uses to hand parsed commands from the API task to the MCU client task,
//! with a reply leg added since these two calls need their outcome
//! synchronously rather than fire-and-forget.

use std::sync::mpsc::{Receiver, Sender};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("motor is busy executing a queued job")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogMotor {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub enum ControlCommand {
    Jog {
        motor: JogMotor,
        steps: i32,
        speed: u32,
    },
    Pen {
        pen_down: bool,
    },
}

pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: Sender<Result<(), ControlError>>,
}

pub fn channel() -> (Sender<ControlRequest>, Receiver<ControlRequest>) {
    std::sync::mpsc::channel()
}
