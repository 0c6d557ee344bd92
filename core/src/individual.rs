//! Immutable description of the people being evacuated.

use serde::{Deserialize, Serialize};

use crate::{IndividualId, InvalidArgument};

/// Reasons an individual may die during an evacuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathCause {
    /// No exit could be reached from the individual's position.
    ExitUnreachable,
    /// The evacuation time ran out before the individual reached safety.
    NotEnoughTime,
}

/// Static parameters established once when an individual is created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    /// Age in years.
    pub age: u8,
    /// Maximum walking speed in metres per second.
    pub max_speed: f64,
    /// How strongly the individual reacts to panic triggers, in `[0, 1]`.
    pub panic_factor: f64,
    /// Tendency to dawdle instead of moving, in `[0, 1]`.
    pub slackness: f64,
    /// How quickly the individual tires, in `[0, 1]`.
    pub exhaustion_factor: f64,
    /// Familiarity with the building, in `[0, 1]`.
    pub familiarity: f64,
    /// Seconds between the alarm and the start of movement.
    pub reaction_time: f64,
}

impl Default for Biometrics {
    fn default() -> Self {
        Self {
            age: 30,
            max_speed: 1.5,
            panic_factor: 0.5,
            slackness: 0.2,
            exhaustion_factor: 0.3,
            familiarity: 0.8,
            reaction_time: 0.0,
        }
    }
}

impl Biometrics {
    /// Checks every parameter against its admissible range.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if !(self.max_speed > 0.0 && self.max_speed.is_finite()) {
            return Err(InvalidArgument::OutOfRange {
                name: "max_speed",
                value: self.max_speed,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        for (name, value) in [
            ("panic_factor", self.panic_factor),
            ("slackness", self.slackness),
            ("exhaustion_factor", self.exhaustion_factor),
            ("familiarity", self.familiarity),
        ] {
            unit_interval(name, value)?;
        }
        if !(self.reaction_time >= 0.0 && self.reaction_time.is_finite()) {
            return Err(InvalidArgument::OutOfRange {
                name: "reaction_time",
                value: self.reaction_time,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }
}

/// Identity plus biometrics of a single evacuee. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    id: IndividualId,
    biometrics: Biometrics,
}

impl Individual {
    /// Creates an individual after validating its biometrics.
    pub fn new(id: IndividualId, biometrics: Biometrics) -> Result<Self, InvalidArgument> {
        biometrics.validate()?;
        Ok(Self { id, biometrics })
    }

    /// Identifier of the individual.
    #[must_use]
    pub const fn id(&self) -> IndividualId {
        self.id
    }

    /// Static parameters of the individual.
    #[must_use]
    pub const fn biometrics(&self) -> &Biometrics {
        &self.biometrics
    }

    /// Maximum walking speed in metres per second.
    #[must_use]
    pub const fn max_speed(&self) -> f64 {
        self.biometrics.max_speed
    }
}

/// Decision inputs consumed by a step driver.
///
/// Rule sets plug different formulas in here; the kernel itself never calls
/// these methods, it only stores the values the driver hands back through the
/// controller.
pub trait Computation {
    /// Panic after observing the local situation, in `[0, 1]`.
    fn panic(&self, individual: &Individual, panic: f64, congestion: f64) -> f64;

    /// Exhaustion after a step, in `[0, 1]`.
    fn exhaustion(&self, individual: &Individual, exhaustion: f64, moved: bool) -> f64;

    /// Speed for the next step, in `(0, max_speed]`.
    fn relative_speed(&self, individual: &Individual, panic: f64, exhaustion: f64) -> f64;
}

pub(crate) fn unit_interval(name: &'static str, value: f64) -> Result<(), InvalidArgument> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidArgument::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}
