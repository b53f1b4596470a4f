//! # Phasing Parameters
//!
//! The five numeric settings handed verbatim to the phasing engine.
//!
//! User edits are stored in a [`ParameterSet`] as optional overrides. Unset
//! values fall back to the declared default only when
//! [`ParameterSet::effective`] is called at job start, so defaults stay
//! late-bound until the last moment.

use std::fmt;

use crate::error::{RephaseError, Result};

/// Declared value type of a parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    /// Integer with an inclusive lower bound
    Integer { min: u32 },
    /// Real number within an inclusive range
    Real { min: f64, max: f64 },
}

/// A parameter value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Integer(u32),
    Real(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Real(v) => write!(f, "{}", v),
        }
    }
}

/// The named phasing parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    NumberOfIterations,
    ThinningInterval,
    BurnIn,
    PhaseThreshold,
    AlleleThreshold,
}

impl Parameter {
    pub fn key(self) -> &'static str {
        match self {
            Parameter::NumberOfIterations => "number_of_iterations",
            Parameter::ThinningInterval => "thinning_interval",
            Parameter::BurnIn => "burn_in",
            Parameter::PhaseThreshold => "phase_threshold",
            Parameter::AlleleThreshold => "allele_threshold",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Parameter::NumberOfIterations => "Number of iterations",
            Parameter::ThinningInterval => "Thinning interval",
            Parameter::BurnIn => "Burn-in",
            Parameter::PhaseThreshold => "Phase threshold",
            Parameter::AlleleThreshold => "Allele threshold",
        }
    }

    pub fn kind(self) -> ParamKind {
        match self {
            Parameter::NumberOfIterations | Parameter::ThinningInterval => {
                ParamKind::Integer { min: 1 }
            }
            Parameter::BurnIn => ParamKind::Integer { min: 0 },
            Parameter::PhaseThreshold | Parameter::AlleleThreshold => {
                ParamKind::Real { min: 0.0, max: 1.0 }
            }
        }
    }

    pub fn default_value(self) -> ParamValue {
        match self {
            Parameter::NumberOfIterations => ParamValue::Integer(100),
            Parameter::ThinningInterval => ParamValue::Integer(1),
            Parameter::BurnIn => ParamValue::Integer(100),
            Parameter::PhaseThreshold => ParamValue::Real(0.9),
            Parameter::AlleleThreshold => ParamValue::Real(0.9),
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Check a value against the declared type and bounds
    pub fn validate(self, value: ParamValue) -> Result<ParamValue> {
        match (self.kind(), value) {
            (ParamKind::Integer { min }, ParamValue::Integer(v)) if v >= min => Ok(value),
            (ParamKind::Integer { min }, ParamValue::Integer(v)) => Err(RephaseError::config(
                format!("{} must be at least {}, got {}", self.label(), min, v),
            )),
            (ParamKind::Real { min, max }, ParamValue::Real(v))
                if v.is_finite() && v >= min && v <= max =>
            {
                Ok(value)
            }
            (ParamKind::Real { min, max }, ParamValue::Real(v)) => Err(RephaseError::config(
                format!("{} must be within [{}, {}], got {}", self.label(), min, max, v),
            )),
            (_, value) => Err(RephaseError::config(format!(
                "{} has the wrong type: {:?}",
                self.label(),
                value
            ))),
        }
    }
}

/// User-editable parameter overrides
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    values: [Option<ParamValue>; 5],
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an override after validating it
    pub fn set(&mut self, param: Parameter, value: ParamValue) -> Result<()> {
        self.values[param.index()] = Some(param.validate(value)?);
        Ok(())
    }

    /// Remove an override so the default applies again
    pub fn unset(&mut self, param: Parameter) {
        self.values[param.index()] = None;
    }

    pub fn get(&self, param: Parameter) -> Option<ParamValue> {
        self.values[param.index()]
    }

    /// Override if set, otherwise the declared default
    pub fn effective_value(&self, param: Parameter) -> ParamValue {
        self.get(param).unwrap_or_else(|| param.default_value())
    }

    /// Resolve every parameter. Called once per run, at start.
    pub fn effective(&self) -> PhaseParameters {
        let int = |p: Parameter| match self.effective_value(p) {
            ParamValue::Integer(v) => v,
            ParamValue::Real(v) => v as u32,
        };
        let real = |p: Parameter| match self.effective_value(p) {
            ParamValue::Real(v) => v,
            ParamValue::Integer(v) => v as f64,
        };
        PhaseParameters {
            number_of_iterations: int(Parameter::NumberOfIterations),
            thinning_interval: int(Parameter::ThinningInterval),
            burn_in: int(Parameter::BurnIn),
            phase_threshold: real(Parameter::PhaseThreshold),
            allele_threshold: real(Parameter::AlleleThreshold),
        }
    }
}

/// Fully resolved parameters consumed by the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseParameters {
    pub number_of_iterations: u32,
    pub thinning_interval: u32,
    pub burn_in: u32,
    pub phase_threshold: f64,
    pub allele_threshold: f64,
}

impl Default for PhaseParameters {
    fn default() -> Self {
        ParameterSet::new().effective()
    }
}
