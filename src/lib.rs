//! padmapper - game controller to keyboard/mouse mapping
//!
//! The crate is split into two subsystems:
//!
//! 1. [`controller`] - gilrs-backed event source plus the analog signal
//!    conditioning (radial deadzone, trigger hysteresis)
//! 2. [`mapping`] - binding tables, repeat scheduling, stick translation and the
//!    [`mapping::MappingEngine`] that decides which synthetic events to emit
//!
//! [`config`] turns a TOML file into the in-memory structures the engine consumes.

pub mod config;
pub mod controller;
pub mod mapping;
