#![deny(clippy::all)]

//! # Polargraph Wire Protocol
//!
//! Shared JSON types for the device HTTP surface (§6.1 of the controller
//! specification) and the supervisor's job envelope (§6.2). Both the
//! `device` and `supervisor` crates depend on this crate so that the wire
//! shape cannot drift between the two sides of the protocol.
//!
//! This crate holds only data definitions: no parsing logic, no kinematics,
//! no state machines. Those live in `kinematics`, `device`, and `supervisor`.

pub mod device;
pub mod job;

pub use device::*;
pub use job::*;
