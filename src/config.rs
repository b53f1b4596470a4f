//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation.
//!
//! ## Validation
//! - Input file must exist
//! - Grouping separator must be `|` or `.`
//! - Phasing parameters must be within their declared bounds
//! - Thread count must be positive
//!
//! ## Example CLI
//! ```bash
//! rephase --input samples.tsv --format fasta --concatenate --out samples.fas
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::error::{RephaseError, Result};
use crate::io::output::{OutputMode, OutputOptions};
use crate::model::{ParamValue, Parameter, ParameterSet};
use crate::utils::threading::available_threads;
use crate::utils::workspace::default_root;

/// Phase diploid sequences and reassemble per-haplotype records
#[derive(Parser, Debug, Clone)]
#[command(name = "rephase", version, about)]
pub struct Config {
    /// Input file (tab-delimited with header row, or FASTA)
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Where to save the phased file (default: <input stem>.phased<ext>)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputMode::Mimic)]
    pub format: OutputMode,

    /// FASTA grouping separator for fasta output ('|' or '.')
    #[arg(long)]
    pub separator: Option<char>,

    /// Concatenate extra tabular columns into FASTA identifiers
    #[arg(long)]
    pub concatenate: bool,

    /// Number of MCMC iterations
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Thinning interval
    #[arg(long)]
    pub thinning: Option<u32>,

    /// Burn-in iterations
    #[arg(long)]
    pub burn_in: Option<u32>,

    /// Phase-call probability threshold
    #[arg(long)]
    pub phase_threshold: Option<f64>,

    /// Allele-call probability threshold
    #[arg(long)]
    pub allele_threshold: Option<f64>,

    /// Accept scan warnings without asking
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Scan the input, report, and exit
    #[arg(long)]
    pub scan_only: bool,

    /// Root for run working directories
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Print span timings
    #[arg(long)]
    pub profile: bool,

    /// Number of worker threads (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl Config {
    /// Parse command-line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(RephaseError::FileNotFound {
                path: self.input.clone(),
            });
        }
        if self.threads == Some(0) {
            return Err(RephaseError::config("--threads must be at least 1"));
        }
        self.output_options()?;
        self.parameter_set()?;
        Ok(())
    }

    /// Parameter overrides given on the command line
    pub fn parameter_set(&self) -> Result<ParameterSet> {
        let mut params = ParameterSet::new();
        let overrides = [
            (Parameter::NumberOfIterations, self.iterations.map(ParamValue::Integer)),
            (Parameter::ThinningInterval, self.thinning.map(ParamValue::Integer)),
            (Parameter::BurnIn, self.burn_in.map(ParamValue::Integer)),
            (Parameter::PhaseThreshold, self.phase_threshold.map(ParamValue::Real)),
            (Parameter::AlleleThreshold, self.allele_threshold.map(ParamValue::Real)),
        ];
        for (param, value) in overrides {
            if let Some(value) = value {
                params.set(param, value)?;
            }
        }
        Ok(params)
    }

    pub fn output_options(&self) -> Result<OutputOptions> {
        let mut options = OutputOptions::new(self.format);
        options.fasta_concatenate = self.concatenate;
        if let Some(sep) = self.separator {
            options.set_fasta_separator(sep)?;
        }
        Ok(options)
    }

    pub fn nthreads(&self) -> usize {
        self.threads.unwrap_or_else(available_threads)
    }

    pub fn work_root(&self) -> PathBuf {
        self.workdir.clone().unwrap_or_else(default_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let config = Config::try_parse_from([
            "rephase",
            "--input",
            "in.tsv",
            "--format",
            "fasta",
            "--separator",
            ".",
            "--concatenate",
            "--burn-in",
            "0",
            "--phase-threshold",
            "0.5",
        ])
        .unwrap();
        assert_eq!(config.format, OutputMode::Fasta);

        let options = config.output_options().unwrap();
        assert_eq!(options.fasta_separator(), '.');
        assert!(options.fasta_concatenate);

        let params = config.parameter_set().unwrap().effective();
        assert_eq!(params.burn_in, 0);
        assert_eq!(params.phase_threshold, 0.5);
        assert_eq!(params.number_of_iterations, 100);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config =
            Config::try_parse_from(["rephase", "-i", "in.tsv", "--separator", ","]).unwrap();
        assert!(config.output_options().is_err());

        let config =
            Config::try_parse_from(["rephase", "-i", "in.tsv", "--allele-threshold", "1.5"])
                .unwrap();
        assert!(config.parameter_set().is_err());

        let config =
            Config::try_parse_from(["rephase", "-i", "in.tsv", "--iterations", "0"]).unwrap();
        assert!(config.parameter_set().is_err());
    }

    #[test]
    fn test_missing_input_fails_validation() {
        let config = Config::try_parse_from(["rephase", "-i", "/no/such/input.tsv"]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(RephaseError::FileNotFound { .. })
        ));
    }
}
