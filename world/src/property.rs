//! Mutable per-individual simulation properties.

use std::sync::Arc;

use evacsim_core::{CellId, DeathCause, IllegalState, IndividualId, Step};
use evacsim_system_potential::StaticPotential;

/// Value that can be assigned at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WriteOnce<T>(Option<T>);

impl<T> Default for WriteOnce<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Copy> WriteOnce<T> {
    pub(crate) const fn get(&self) -> Option<T> {
        self.0
    }

    pub(crate) const fn is_set(&self) -> bool {
        self.0.is_some()
    }

    fn set(&mut self, value: T) {
        debug_assert!(self.0.is_none(), "write-once value assigned twice");
        self.0 = Some(value);
    }
}

/// Simulation state attached to one individual.
///
/// Every field is written by the state controller only. Death cause, safety
/// time and evacuation time are write-once.
#[derive(Clone, Debug)]
pub struct IndividualProperty {
    pub(crate) cell: Option<CellId>,
    pub(crate) static_potential: Option<Arc<StaticPotential>>,
    pub(crate) panic: f64,
    pub(crate) exhaustion: f64,
    pub(crate) relative_speed: f64,
    pub(crate) alarmed: bool,
    pub(crate) death_cause: WriteOnce<DeathCause>,
    pub(crate) safety_time: WriteOnce<Step>,
    pub(crate) evacuation_time: WriteOnce<Step>,
    pub(crate) step_start_time: f64,
    pub(crate) step_end_time: f64,
}

impl IndividualProperty {
    pub(crate) fn new(
        cell: CellId,
        static_potential: Option<Arc<StaticPotential>>,
        relative_speed: f64,
    ) -> Self {
        Self {
            cell: Some(cell),
            static_potential,
            panic: 0.0,
            exhaustion: 0.0,
            relative_speed,
            alarmed: false,
            death_cause: WriteOnce::default(),
            safety_time: WriteOnce::default(),
            evacuation_time: WriteOnce::default(),
            step_start_time: 0.0,
            step_end_time: 0.0,
        }
    }

    /// Cell the individual stands on; `None` once dead or evacuated.
    #[must_use]
    pub const fn cell(&self) -> Option<CellId> {
        self.cell
    }

    /// Static potential the individual follows.
    #[must_use]
    pub fn static_potential(&self) -> Option<&Arc<StaticPotential>> {
        self.static_potential.as_ref()
    }

    /// Current panic in `[0, 1]`.
    #[must_use]
    pub const fn panic(&self) -> f64 {
        self.panic
    }

    /// Current exhaustion in `[0, 1]`.
    #[must_use]
    pub const fn exhaustion(&self) -> f64 {
        self.exhaustion
    }

    /// Speed used for the next movement.
    #[must_use]
    pub const fn relative_speed(&self) -> f64 {
        self.relative_speed
    }

    /// Reports whether the individual noticed the alarm and reacts.
    #[must_use]
    pub const fn is_alarmed(&self) -> bool {
        self.alarmed
    }

    /// Cause of death, if the individual died.
    #[must_use]
    pub const fn death_cause(&self) -> Option<DeathCause> {
        self.death_cause.get()
    }

    /// Step at which the individual became safe.
    #[must_use]
    pub const fn safety_time(&self) -> Option<Step> {
        self.safety_time.get()
    }

    /// Step at which the individual left the building.
    #[must_use]
    pub const fn evacuation_time(&self) -> Option<Step> {
        self.evacuation_time.get()
    }

    /// Time in seconds at which the current movement started.
    #[must_use]
    pub const fn step_start_time(&self) -> f64 {
        self.step_start_time
    }

    /// Time in seconds at which the current movement ends.
    #[must_use]
    pub const fn step_end_time(&self) -> f64 {
        self.step_end_time
    }

    /// Reports whether the individual is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.death_cause.is_set()
    }

    /// Reports whether the individual reached safety.
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        self.safety_time.is_set()
    }

    /// Reports whether the individual left the building.
    #[must_use]
    pub const fn is_evacuated(&self) -> bool {
        self.evacuation_time.is_set()
    }

    pub(crate) fn check_can_die(&self, id: IndividualId) -> Result<(), IllegalState> {
        if self.is_dead() {
            return Err(IllegalState::AlreadyDead(id));
        }
        if self.is_safe() || self.is_evacuated() {
            return Err(IllegalState::NotActive(id));
        }
        Ok(())
    }

    pub(crate) fn die(&mut self, cause: DeathCause) {
        self.death_cause.set(cause);
        self.cell = None;
    }

    /// Checks that the safety time can become `step`. Returns `false` when the
    /// same step was already recorded.
    pub(crate) fn check_safety_time(
        &self,
        id: IndividualId,
        step: Step,
    ) -> Result<bool, IllegalState> {
        if self.is_dead() {
            return Err(IllegalState::AlreadyDead(id));
        }
        match self.safety_time.get() {
            None => Ok(true),
            Some(existing) if existing == step => Ok(false),
            Some(existing) => Err(IllegalState::SafetyTimeConflict {
                individual: id,
                existing,
                requested: step,
            }),
        }
    }

    pub(crate) fn set_safety_time(&mut self, step: Step) {
        self.safety_time.set(step);
    }

    pub(crate) fn check_evacuation(&self, id: IndividualId, step: Step) -> Result<(), IllegalState> {
        if self.is_dead() {
            return Err(IllegalState::AlreadyDead(id));
        }
        if self.is_evacuated() {
            return Err(IllegalState::AlreadyEvacuated(id));
        }
        if let Some(safety) = self.safety_time.get() {
            if step < safety {
                return Err(IllegalState::EvacuationBeforeSafety {
                    individual: id,
                    evacuation: step,
                    safety,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn evacuate(&mut self, step: Step) {
        self.evacuation_time.set(step);
        if !self.safety_time.is_set() {
            self.safety_time.set(step);
        }
        self.cell = None;
    }
}
