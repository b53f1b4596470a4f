//! # Model Module
//!
//! The phasing engine boundary and the parameters it consumes.

pub mod engine;
pub mod parameters;

pub use engine::{IupacEngine, PhasedStream, PhasingEngine, ENGINE_ID_SEPARATOR};
pub use parameters::{ParamValue, Parameter, ParameterSet, PhaseParameters};
