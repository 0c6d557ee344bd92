use anyhow::{bail, Context, Result};
use evacsim_core::{
    Biometrics, CellCoord, CellGraph, CellId, CellKind, Computation, DeathCause, Individual,
    IndividualId, Step,
};
use evacsim_system_potential::ExitGroup;
use evacsim_world::{query, EvacuationState, EvacuationStateController, Floor, SimulationConfig};

const CELL_LENGTH: f64 = 0.4;
const STEP_LIMIT: u64 = 20;

/// Panic grows with congestion, exhaustion with movement.
struct Steady;

impl Computation for Steady {
    fn panic(&self, individual: &Individual, panic: f64, congestion: f64) -> f64 {
        (panic + 0.01 * congestion * individual.biometrics().panic_factor).min(1.0)
    }

    fn exhaustion(&self, individual: &Individual, exhaustion: f64, moved: bool) -> f64 {
        if moved {
            (exhaustion + 0.1 * individual.biometrics().exhaustion_factor).min(1.0)
        } else {
            (exhaustion - 0.05).max(0.0)
        }
    }

    fn relative_speed(&self, individual: &Individual, _panic: f64, exhaustion: f64) -> f64 {
        individual.max_speed() * (1.0 - 0.5 * exhaustion)
    }
}

fn controller(floor: Floor, people: &[(u32, CellCoord)]) -> Result<EvacuationStateController> {
    let config = SimulationConfig::default();
    let mut builder = EvacuationState::builder(floor);
    let exits = builder.floor().cells_of_kind(CellKind::Exit);
    let potential = config
        .solver()
        .solve_exit_group(builder.floor(), &ExitGroup::new("exits", exits))?;
    let potential = builder.add_potential(potential)?;
    for &(id, coord) in people {
        let cell = builder
            .floor()
            .cell_at(coord)
            .with_context(|| format!("no cell at {coord:?}"))?;
        let person = Individual::new(IndividualId::new(id), Biometrics::default())?;
        builder.add_individual(person, cell, Some(potential))?;
    }
    Ok(EvacuationStateController::new(builder.build(), &config))
}

/// Downhill walker: every individual steps to the free neighbour with the
/// lowest static potential, leaves the building on exit cells and dies when
/// no exit can be reached.
fn run(controller: &mut EvacuationStateController, computation: &impl Computation) -> Result<()> {
    while !query::is_finished(controller.state()) {
        if controller.step().get() >= STEP_LIMIT {
            bail!("evacuation did not finish within {STEP_LIMIT} steps");
        }
        let clock = controller.step().get() as f64;
        let people: Vec<IndividualId> = controller.state().remaining().iter().copied().collect();

        for id in people {
            let state = controller.state();
            let property = state.property(id).context("unknown individual")?;
            let cell = property.cell().context("remaining individual without a cell")?;
            let floor = state.floor();

            if floor.kind(cell) == Some(CellKind::Exit) {
                controller.evacuate(id)?;
                continue;
            }
            let Some(current) = query::static_potential_at(state, id) else {
                controller.die(id, DeathCause::ExitUnreachable)?;
                continue;
            };
            let potential = property.static_potential().context("potential")?.clone();
            let target = query::free_neighbours(state, cell)
                .into_iter()
                .filter_map(|neighbour| {
                    let value = match floor.kind(neighbour) {
                        Some(CellKind::Exit) => Some(0),
                        _ => potential.potential(neighbour),
                    }?;
                    (value < current).then_some((value, neighbour))
                })
                .min()
                .map(|(_, neighbour)| neighbour);

            let individual = state.individual(id).context("individual")?.clone();
            let (panic, exhaustion, speed) = (
                property.panic(),
                property.exhaustion(),
                property.relative_speed(),
            );
            let congestion = f64::from(query::congestion_at(state, cell));

            if let Some(target) = target {
                let _ = controller.move_individual(cell, target)?;
                controller.increase_dynamic_potential(cell)?;
                controller.set_step_timing(id, clock, clock + CELL_LENGTH / speed)?;
            }
            let panic = computation.panic(&individual, panic, congestion);
            let exhaustion = computation.exhaustion(&individual, exhaustion, target.is_some());
            let speed = computation.relative_speed(&individual, panic, exhaustion);
            controller.change_state(id, panic, exhaustion, speed)?;
        }

        let _ = controller.step_dynamic_potential()?;
        let _ = controller.advance_step();
    }
    Ok(())
}

#[test]
fn single_individual_walks_out_of_a_corridor() -> Result<()> {
    let floor = Floor::grid(3, 1, |coord| {
        Some(if coord.column() == 2 {
            CellKind::Exit
        } else {
            CellKind::Floor
        })
    });
    let mut controller = controller(floor, &[(0, CellCoord::new(0, 0))])?;

    run(&mut controller, &Steady)?;

    let state = controller.state();
    let property = state.property(IndividualId::new(0)).context("property")?;
    assert_eq!(property.evacuation_time(), Some(Step::new(2)));
    assert_eq!(property.safety_time(), Some(Step::new(2)));
    assert!(property.exhaustion() > 0.0);
    assert!(property.step_end_time() > property.step_start_time());
    let outcome = query::outcome(state);
    assert_eq!(outcome.evacuated, 1);
    assert_eq!(outcome.dead, 0);
    assert!(outcome.is_consistent());
    assert_eq!(state.floor().occupied_count(), 0);
    Ok(())
}

#[test]
fn pair_in_a_three_cell_corridor_leaves_in_arrival_order() -> Result<()> {
    let floor = Floor::grid(3, 1, |coord| {
        Some(if coord.column() == 0 {
            CellKind::Exit
        } else {
            CellKind::Floor
        })
    });
    let mut controller = controller(
        floor,
        &[(1, CellCoord::new(1, 0)), (2, CellCoord::new(2, 0))],
    )?;

    let state = controller.state();
    let potential = state
        .property(IndividualId::new(1))
        .and_then(|property| property.static_potential())
        .context("assigned potential")?
        .clone();
    let values = (0..3)
        .map(|column| {
            state
                .floor()
                .cell_at(CellCoord::new(column, 0))
                .and_then(|cell| potential.potential(cell))
        })
        .collect::<Vec<_>>();
    assert_eq!(values, [Some(0), Some(10), Some(20)]);

    run(&mut controller, &Steady)?;

    let state = controller.state();
    let time = |id: u32| {
        state
            .property(IndividualId::new(id))
            .and_then(|property| property.evacuation_time())
    };
    assert_eq!(time(1), Some(Step::new(1)));
    assert_eq!(time(2), Some(Step::new(2)));
    assert!(state.remaining().is_empty());
    assert!(state.evacuated().contains(&IndividualId::new(1)));
    assert!(state.evacuated().contains(&IndividualId::new(2)));
    assert_eq!(state.floor().occupied_count(), 0);
    Ok(())
}

#[test]
fn individuals_cut_off_from_every_exit_die() -> Result<()> {
    let floor = Floor::grid(4, 1, |coord| match coord.column() {
        1 => None,
        3 => Some(CellKind::Exit),
        _ => Some(CellKind::Floor),
    });
    let mut controller = controller(
        floor,
        &[(0, CellCoord::new(0, 0)), (1, CellCoord::new(2, 0))],
    )?;

    run(&mut controller, &Steady)?;

    let state = controller.state();
    assert_eq!(
        state
            .property(IndividualId::new(0))
            .and_then(|property| property.death_cause()),
        Some(DeathCause::ExitUnreachable)
    );
    assert!(state.evacuated().contains(&IndividualId::new(1)));
    assert_eq!(state.floor().occupant(CellId::new(0)), None);
    let outcome = query::outcome(state);
    assert_eq!((outcome.dead, outcome.evacuated, outcome.remaining), (1, 1, 0));
    Ok(())
}

#[test]
fn queued_individuals_leave_one_after_another() -> Result<()> {
    let floor = Floor::grid(4, 1, |coord| {
        Some(if coord.column() == 3 {
            CellKind::Exit
        } else {
            CellKind::Floor
        })
    });
    let mut controller = controller(
        floor,
        &[(0, CellCoord::new(0, 0)), (1, CellCoord::new(1, 0))],
    )?;

    run(&mut controller, &Steady)?;

    let state = controller.state();
    let time = |id: u32| {
        state
            .property(IndividualId::new(id))
            .and_then(|property| property.evacuation_time())
    };
    let (first, second) = (time(1).context("leader")?, time(0).context("follower")?);
    assert!(first < second);
    assert!(query::outcome(state).is_consistent());
    Ok(())
}
