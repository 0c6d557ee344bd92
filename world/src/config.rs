//! Run configuration loaded from TOML.

use evacsim_system_congestion::CongestionTuning;
use evacsim_system_potential::{PotentialSolver, SolverTuning};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_SEED: u64 = 0x5eed_e7ac_0000_0001;

/// Parameters that fix the behaviour of one evacuation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed of the random stream used for congestion updates.
    pub seed: u64,
    /// Step costs used when solving static potentials.
    pub solver: SolverTuning,
    /// Probabilities applied by the congestion field.
    pub congestion: CongestionTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            solver: SolverTuning::default(),
            congestion: CongestionTuning::default(),
        }
    }
}

/// Failure to read a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid TOML or has the wrong shape.
    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A congestion probability lies outside `[0, 1]`.
    #[error("congestion {name} probability {value} must lie within [0, 1]")]
    Probability {
        /// Name of the offending probability.
        name: &'static str,
        /// Value found in the document.
        value: f64,
    },
    /// The cell length is not a positive, finite number of metres.
    #[error("solver cell length {0} must be a positive finite number")]
    CellLength(f64),
}

impl SimulationConfig {
    /// Parses a configuration; missing keys fall back to the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        for (name, value) in [
            ("diffusion", config.congestion.diffusion),
            ("decay", config.congestion.decay),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        let cell_length = config.solver.cell_length;
        if !cell_length.is_finite() || cell_length <= 0.0 {
            return Err(ConfigError::CellLength(cell_length));
        }
        Ok(config)
    }

    /// Creates a solver using the configured step costs.
    #[must_use]
    pub fn solver(&self) -> PotentialSolver {
        PotentialSolver::new(self.solver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SimulationConfig::from_toml_str("").expect("parse");
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn partial_tables_override_selected_values() {
        let config = SimulationConfig::from_toml_str(
            r#"
            seed = 42

            [congestion]
            decay = 0.5
            "#,
        )
        .expect("parse");

        assert_eq!(config.seed, 42);
        assert_eq!(config.congestion.decay, 0.5);
        assert_eq!(config.congestion.diffusion, CongestionTuning::default().diffusion);
        assert_eq!(config.solver, SolverTuning::default());
        assert_eq!(config.solver().tuning().orthogonal_cost, 10);
    }

    #[test]
    fn rejects_probabilities_outside_unit_interval() {
        let error = SimulationConfig::from_toml_str("[congestion]\ndiffusion = 1.5\n").unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Probability {
                name: "diffusion",
                ..
            }
        ));
        assert!(SimulationConfig::from_toml_str("seed = \"x\"").is_err());
    }

    #[test]
    fn rejects_degenerate_cell_lengths() {
        for document in [
            "[solver]\ncell_length = 0.0\n",
            "[solver]\ncell_length = -0.4\n",
            "[solver]\ncell_length = nan\n",
            "[solver]\ncell_length = inf\n",
        ] {
            let error = SimulationConfig::from_toml_str(document).unwrap_err();
            assert!(matches!(error, ConfigError::CellLength(_)), "{document}: {error}");
        }
        let config = SimulationConfig::from_toml_str("[solver]\ncell_length = 0.5\n").expect("parse");
        assert_eq!(config.solver.cell_length, 0.5);
    }
}
