//! Integration tests for peridyn-solver.

use std::collections::HashMap;

use glam::DVec3;
use peridyn_discretization::generators::uniform_box;
use peridyn_discretization::{find_bonds, Body, PartitionStrategy};
use peridyn_material::{BondModel, Fracture, MaterialSpec};
use peridyn_solver::{
    exchange_halo_to_loc, exchange_loc_to_halo, Axis, BodyChunk, BondForce, BoundaryConditions, ChunkStorage,
    ConditionValue, DataHandler, DynamicRelaxation, Execution, Exporter, ForceDensity, GlobalField,
    MemoryExporter, PointCondition, PointField, RunOptions, SolverConfig, TimeSolver, VelocityVerlet,
};
use peridyn_telemetry::{EventBus, EventKind, VecSink};
use peridyn_types::{ChunkId, PeridynError, PeridynResult, PointId};

// ─── Fixtures ─────────────────────────────────────────────────

fn steel(horizon: f64, fracture: Fracture) -> MaterialSpec {
    MaterialSpec {
        name: "steel".into(),
        horizon,
        density: 8000.0,
        youngs_modulus: 210.0e9,
        fracture,
    }
}

/// The four-point tetrahedron corner cloud with a load set on point 0.
fn tetra() -> Body {
    let position = vec![
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
    ];
    let mut body = Body::new("tetra", position, vec![1.0; 4]).unwrap();
    body.set_material(&steel(2.0, Fracture::EnergyReleaseRate(55.0))).unwrap();
    body.add_point_set("load", vec![0]).unwrap();
    body
}

/// An 8 × 4 × 2 plate with `left` and `right` end sets.
fn plate(fracture: Fracture) -> Body {
    let spacing = 0.125;
    let cloud = uniform_box(1.0, 0.5, 0.25, spacing, DVec3::ZERO).unwrap();
    let mut body = Body::from_cloud("plate", cloud).unwrap();
    body.set_material(&steel(3.015 * spacing, fracture)).unwrap();
    body.point_set_where("left", |p| p.x < -0.4).unwrap();
    body.point_set_where("right", |p| p.x > 0.4).unwrap();
    body
}

/// Pulls the plate ends apart at `speed`.
fn pull(speed: f64) -> BoundaryConditions {
    BoundaryConditions::new()
        .velocity(PointCondition::new("left", Axis::X, ConditionValue::Constant(-speed)))
        .velocity(PointCondition::new("right", Axis::X, ConditionValue::Constant(speed)))
}

fn dr(steps: u32) -> TimeSolver {
    TimeSolver::from(DynamicRelaxation::with_steps(steps).unwrap())
}

fn vv(steps: u32) -> TimeSolver {
    TimeSolver::from(VelocityVerlet::with_steps(steps).unwrap())
}

fn handler(body: &Body, chunks: usize, solver: &TimeSolver) -> DataHandler {
    DataHandler::new(body, chunks, PartitionStrategy::GraphGrowing, solver).unwrap()
}

// ─── Storage Tests ────────────────────────────────────────────

#[test]
fn storage_allocates_only_requested_fields() {
    let reference = vec![DVec3::ONE; 4];
    let storage = ChunkStorage::new(
        2,
        3,
        &[PointField::Position, PointField::Velocity, PointField::Damage],
        &[GlobalField::DampingCoefficient],
        &reference,
    );

    assert_eq!(storage.n_loc(), 2);
    assert_eq!(storage.n_points(), 4);
    assert_eq!(storage.position, reference);
    assert_eq!(storage.velocity.len(), 4);
    assert!(storage.b_int.is_empty());
    assert_eq!(storage.bond_active, vec![true; 3]);
    assert_eq!(storage.global(GlobalField::DampingCoefficient), Some(0.0));

    assert!(storage.vector(PointField::Velocity).is_ok());
    assert!(storage.vector(PointField::BInt).is_err());
    assert!(storage.vector(PointField::Damage).is_err());
}

#[test]
fn storage_ensure_reports_missing_fields() {
    let storage = ChunkStorage::new(1, 0, &[PointField::Position], &[], &[DVec3::ZERO]);
    assert!(storage.ensure(&[PointField::Position], &[]).is_ok());
    assert!(matches!(
        storage.ensure(&[PointField::BInt], &[]),
        Err(PeridynError::Consistency(_))
    ));
    assert!(matches!(
        storage.ensure(&[], &[GlobalField::DampingCoefficient]),
        Err(PeridynError::Consistency(_))
    ));
}

// ─── Data Handler Tests ───────────────────────────────────────

#[test]
fn tetra_splits_into_two_fully_connected_chunks() {
    let data = handler(&tetra(), 2, &dr(1));
    assert_eq!(data.n_chunks(), 2);
    assert_eq!(data.n_points(), 4);

    let c0 = &data.chunks()[0];
    let c1 = &data.chunks()[1];
    assert_eq!(c0.handler.loc_point_ids(), &[PointId(0), PointId(1)]);
    assert_eq!(c0.handler.halo_point_ids(), &[PointId(2), PointId(3)]);
    assert_eq!(c1.handler.loc_point_ids(), &[PointId(2), PointId(3)]);
    assert_eq!(c1.handler.halo_point_ids(), &[PointId(0), PointId(1)]);

    for chunk in data.chunks() {
        assert_eq!(chunk.system.n_neighbors, vec![3, 3]);
        assert_eq!(chunk.storage.n_active_bonds[..2], [3, 3]);
    }
    assert_eq!(data.bodies()[0].cut_bonds, 8);
    assert_eq!(data.plan().len(), 2);
    assert_eq!(data.plan().halo_volume(), 4);
}

#[test]
fn single_chunk_matches_whole_body_bonds() {
    let body = plate(Fracture::Unbreakable);
    let global = find_bonds(&body).unwrap();
    let data = handler(&body, 1, &vv(1));

    let chunk = &data.chunks()[0];
    assert_eq!(chunk.n_halo(), 0);
    assert_eq!(chunk.system.n_neighbors, global.n_neighbors);
    assert_eq!(chunk.system.bond_ids, global.bond_ids);
    assert_eq!(chunk.system.bonds, global.bonds);
    assert!(data.plan().is_empty());
}

#[test]
fn multibody_chunk_ids_are_run_wide() {
    let a = plate(Fracture::Unbreakable);
    let mut b = tetra();
    b.name = "other".into();
    let solver = vv(1);
    let data = DataHandler::multibody(&[(&a, 3), (&b, 2)], PartitionStrategy::GraphGrowing, &solver).unwrap();

    assert_eq!(data.n_chunks(), 5);
    for (c, chunk) in data.chunks().iter().enumerate() {
        assert_eq!(chunk.id(), ChunkId::from(c));
    }
    assert_eq!(data.bodies()[0].chunks, 0..3);
    assert_eq!(data.bodies()[1].chunks, 3..5);
    assert_eq!(data.chunks()[3].body_name, "other");
    assert_eq!(data.chunks()[4].handler.halo_by_src.keys().copied().collect::<Vec<_>>(), vec![ChunkId(3)]);

    let (chunk, local) = data.locate("other", PointId(3)).unwrap();
    assert_eq!(chunk, ChunkId(4));
    assert_eq!(data.chunks()[4].handler.global_id(local), PointId(3));
}

#[test]
fn duplicate_body_names_are_rejected() {
    let a = tetra();
    let b = tetra();
    let solver = vv(1);
    let err = DataHandler::multibody(&[(&a, 1), (&b, 1)], PartitionStrategy::GraphGrowing, &solver).unwrap_err();
    assert!(matches!(err, PeridynError::InvalidConfig(_)));
}

#[test]
fn too_many_chunks_is_a_decomposition_error() {
    let err = DataHandler::new(&tetra(), 5, PartitionStrategy::GraphGrowing, &dr(1)).unwrap_err();
    assert!(matches!(err, PeridynError::Decomposition(_)));
}

// ─── Halo Exchange Tests ──────────────────────────────────────

fn tag(pid: PointId) -> DVec3 {
    let g = pid.0 as f64;
    DVec3::new(g, 2.0 * g, -g)
}

#[test]
fn loc_to_halo_copies_owner_values() {
    let body = plate(Fracture::Unbreakable);
    for strategy in [PartitionStrategy::GraphGrowing, PartitionStrategy::Contiguous] {
        let mut data = DataHandler::new(&body, 4, strategy, &vv(1)).unwrap();
        for chunk in data.chunks_mut() {
            for local in 0..chunk.n_loc() {
                chunk.storage.velocity[local] = tag(chunk.handler.global_id(local));
            }
        }

        let (chunks, plan) = data.chunks_and_plan();
        exchange_loc_to_halo(chunks, plan, PointField::Velocity).unwrap();

        for chunk in data.chunks() {
            assert!(chunk.n_halo() > 0);
            for local in chunk.handler.halo_points.clone() {
                assert_eq!(chunk.storage.velocity[local], tag(chunk.handler.global_id(local)));
            }
        }
    }
}

#[test]
fn halo_to_loc_accumulates_into_owners() {
    let body = plate(Fracture::Unbreakable);
    let mut data = handler(&body, 3, &vv(1));

    let mut copies: HashMap<PointId, f64> = HashMap::new();
    for chunk in data.chunks_mut() {
        for &pid in chunk.handler.halo_point_ids() {
            *copies.entry(pid).or_default() += 1.0;
        }
        let halo = chunk.handler.halo_points.clone();
        chunk.storage.b_int[halo].fill(DVec3::ONE);
    }

    let (chunks, plan) = data.chunks_and_plan();
    exchange_halo_to_loc(chunks, plan, PointField::BInt).unwrap();

    for chunk in data.chunks() {
        for local in chunk.handler.loc_points.clone() {
            let n = copies.get(&chunk.handler.global_id(local)).copied().unwrap_or(0.0);
            assert_eq!(chunk.storage.b_int[local], DVec3::splat(n));
        }
        for local in chunk.handler.halo_points.clone() {
            assert_eq!(chunk.storage.b_int[local], DVec3::ZERO);
        }
    }
}

#[test]
fn exchange_of_unallocated_field_fails() {
    let mut data = handler(&tetra(), 2, &vv(1));
    let (chunks, plan) = data.chunks_and_plan();
    let err = exchange_loc_to_halo(chunks, plan, PointField::DensityMatrix).unwrap_err();
    assert!(matches!(err, PeridynError::Consistency(_)));
}

// ─── Dynamic Relaxation Tests ─────────────────────────────────

#[test]
fn first_relaxation_step_is_undamped() {
    let load = 1.0e6;
    let conditions =
        BoundaryConditions::new().force_density(PointCondition::new("load", Axis::X, ConditionValue::Constant(load)));
    let solver = DynamicRelaxation::with_steps(1).unwrap();
    let time_solver = TimeSolver::from(solver.clone());
    let mut data = handler(&tetra(), 2, &time_solver);

    let options = RunOptions {
        conditions: &conditions,
        ..RunOptions::default()
    };
    let summary = time_solver.run(&mut data, &options).unwrap();
    assert_eq!(summary.first_step_branches, 1);
    assert_eq!(summary.damped_steps, 0);
    assert_eq!(summary.max_damping, 0.0);

    let (chunk, local) = data.locate("tetra", PointId(0)).unwrap();
    let chunk = data.chunk(chunk).unwrap();
    let p = chunk.params(local);
    let mass = solver.fictitious_mass(p.bulk_modulus, p.horizon);
    let expected = 0.5 * solver.stepsize * load / mass;

    let vh = chunk.storage.velocity_half[local];
    assert!((vh.x - expected).abs() <= 1e-12 * expected.abs());
    assert_eq!(vh.y, 0.0);
    assert_eq!(vh.z, 0.0);
    assert_eq!(chunk.storage.velocity_half_old[local], vh);

    let unloaded = data.collect_vector("tetra", PointField::VelocityHalf).unwrap();
    assert_eq!(&unloaded[1..], &[DVec3::ZERO; 3]);
}

#[test]
fn fictitious_mass_covers_halo_rows() {
    let solver = DynamicRelaxation::with_steps(1).unwrap();
    let time_solver = TimeSolver::from(solver.clone());
    let mut data = handler(&tetra(), 2, &time_solver);
    time_solver.run(&mut data, &RunOptions::default()).unwrap();

    for chunk in data.chunks() {
        let p = chunk.params(0);
        let m = solver.fictitious_mass(p.bulk_modulus, p.horizon);
        assert!(chunk.storage.density_matrix.iter().all(|&d| d == DVec3::splat(m)));
    }
}

#[test]
fn damping_coefficient_stays_bounded() {
    let body = plate(Fracture::Unbreakable);
    let solver = dr(40);
    let mut data = handler(&body, 3, &solver);

    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    let conditions = BoundaryConditions::new()
        .velocity(PointCondition::new("left", Axis::X, ConditionValue::Ramp { rate: -1.0e-4 }))
        .velocity(PointCondition::new("right", Axis::X, ConditionValue::Ramp { rate: 1.0e-4 }));

    let options = RunOptions {
        conditions: &conditions,
        events: bus.emitter(),
        ..RunOptions::default()
    };
    let summary = solver.run(&mut data, &options).unwrap();
    bus.shutdown();

    assert_eq!(summary.first_step_branches, 1);
    assert_eq!(summary.damped_steps, 39);
    assert!((0.0..=1.9).contains(&summary.max_damping));

    let coefficients: Vec<f64> = sink
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Damping { coefficient, .. } => Some(coefficient),
            _ => None,
        })
        .collect();
    assert_eq!(coefficients.len(), 39 * 3);
    assert!(coefficients.iter().all(|cn| (0.0..=1.9).contains(cn)));

    for chunk in data.chunks() {
        let cn = chunk.storage.global(GlobalField::DampingCoefficient).unwrap();
        assert!((0.0..=1.9).contains(&cn));
    }
}

#[test]
fn relaxation_is_deterministic() {
    let body = plate(Fracture::CriticalStretch(0.002));
    let conditions = pull(1.0e-3);
    let options = RunOptions {
        conditions: &conditions,
        ..RunOptions::default()
    };

    let solver = dr(30);
    let mut a = handler(&body, 3, &solver);
    let mut b = handler(&body, 3, &solver);
    let sa = solver.run(&mut a, &options).unwrap();
    let sb = solver.run(&mut b, &options).unwrap();

    assert_eq!(sa.broken_bonds, sb.broken_bonds);
    assert_eq!(
        a.collect_vector("plate", PointField::Displacement).unwrap(),
        b.collect_vector("plate", PointField::Displacement).unwrap()
    );
    assert_eq!(a.collect_damage("plate").unwrap(), b.collect_damage("plate").unwrap());
}

// ─── Velocity Verlet Tests ────────────────────────────────────

#[test]
fn explicit_step_size_from_time_span() {
    let solver = TimeSolver::from(VelocityVerlet::with_time(1.0e-5).unwrap().stepsize(3.0e-6).unwrap());
    let mut data = handler(&tetra(), 1, &solver);
    let summary = solver.run(&mut data, &RunOptions::default()).unwrap();
    assert_eq!(summary.steps, 4);
    assert!((summary.stepsize - 2.5e-6).abs() < 1e-18);
    assert!((summary.final_time - 1.0e-5).abs() < 1e-18);
}

#[test]
fn derived_step_size_uses_safety_factor() {
    let body = plate(Fracture::Unbreakable);
    let solver = vv(1);
    let mut data = handler(&body, 2, &solver);
    let critical = data
        .chunks()
        .iter()
        .map(|c| BondForce::bond_based().critical_time_step(c))
        .fold(f64::INFINITY, f64::min);
    let summary = solver.run(&mut data, &RunOptions::default()).unwrap();
    assert_eq!(summary.stepsize, critical * 0.7);
}

#[test]
fn explicit_results_do_not_depend_on_chunk_count() {
    let body = plate(Fracture::CriticalStretch(0.002));
    let conditions = pull(50.0);
    let options = RunOptions {
        conditions: &conditions,
        ..RunOptions::default()
    };
    let solver = TimeSolver::from(VelocityVerlet::with_steps(25).unwrap().stepsize(1.0e-6).unwrap());

    let mut one = handler(&body, 1, &solver);
    let mut four = handler(&body, 4, &solver);
    let s1 = solver.run(&mut one, &options).unwrap();
    let s4 = solver.run(&mut four, &options).unwrap();

    assert_eq!(s1.broken_bonds, s4.broken_bonds);
    assert_eq!(
        one.collect_vector("plate", PointField::Displacement).unwrap(),
        four.collect_vector("plate", PointField::Displacement).unwrap()
    );
    assert_eq!(
        one.collect_vector("plate", PointField::Velocity).unwrap(),
        four.collect_vector("plate", PointField::Velocity).unwrap()
    );
}

#[test]
fn broken_bonds_never_heal() {
    let body = plate(Fracture::CriticalStretch(0.01));
    let conditions = pull(100.0);
    let options = RunOptions {
        conditions: &conditions,
        ..RunOptions::default()
    };
    let solver = vv(1);
    let mut data = handler(&body, 2, &solver);

    let mut previous: Vec<Vec<bool>> = data.chunks().iter().map(|c| c.storage.bond_active.clone()).collect();
    let mut previous_damage = data.collect_damage("plate").unwrap();
    let mut broken = 0;
    for _ in 0..20 {
        broken += solver.run(&mut data, &options).unwrap().broken_bonds;
        for (chunk, before) in data.chunks().iter().zip(&previous) {
            for (now, was) in chunk.storage.bond_active.iter().zip(before) {
                assert!(*was || !*now, "a broken bond became active again");
            }
        }
        let damage = data.collect_damage("plate").unwrap();
        assert!(damage.iter().zip(&previous_damage).all(|(d, p)| d >= p));
        previous = data.chunks().iter().map(|c| c.storage.bond_active.clone()).collect();
        previous_damage = damage;
    }

    assert!(broken > 0);
    let inactive: usize = data
        .chunks()
        .iter()
        .map(|c| c.storage.bond_active.iter().filter(|a| !**a).count())
        .sum();
    assert_eq!(inactive as u64, broken);
}

#[test]
fn no_failure_set_keeps_its_bonds() {
    let mut body = plate(Fracture::CriticalStretch(0.01));
    body.no_failure("left").unwrap();
    let conditions = pull(100.0);
    let options = RunOptions {
        conditions: &conditions,
        ..RunOptions::default()
    };
    let solver = vv(20);
    let mut data = handler(&body, 2, &solver);
    solver.run(&mut data, &options).unwrap();

    let left = body.point_set("left").unwrap();
    let damage = data.collect_damage("plate").unwrap();
    assert!(left.iter().all(|&i| damage[i] == 0.0));
}

// ─── Execution Tests ──────────────────────────────────────────

#[test]
fn rank_execution_matches_pooled() {
    let body = plate(Fracture::CriticalStretch(0.002));
    let conditions = pull(50.0);
    let solvers = [
        TimeSolver::from(VelocityVerlet::with_steps(15).unwrap().stepsize(1.0e-6).unwrap()),
        dr(15),
    ];

    for solver in &solvers {
        let mut reference = handler(&body, 4, solver);
        let pooled = RunOptions {
            conditions: &conditions,
            ..RunOptions::default()
        };
        let expected = solver.run(&mut reference, &pooled).unwrap();

        for execution in [
            Execution::Ranks { ranks: 1 },
            Execution::Ranks { ranks: 2 },
            Execution::Ranks { ranks: 4 },
            Execution::Pooled { threads: Some(2) },
        ] {
            let mut data = handler(&body, 4, solver);
            let options = RunOptions {
                execution,
                ..pooled.clone()
            };
            let summary = solver.run(&mut data, &options).unwrap();
            assert_eq!(summary.broken_bonds, expected.broken_bonds, "{execution:?}");
            assert_eq!(summary.max_damping, expected.max_damping, "{execution:?}");
            assert_eq!(
                data.collect_vector("plate", PointField::Displacement).unwrap(),
                reference.collect_vector("plate", PointField::Displacement).unwrap(),
                "{execution:?}"
            );
            assert_eq!(
                data.collect_damage("plate").unwrap(),
                reference.collect_damage("plate").unwrap(),
                "{execution:?}"
            );
        }
    }
}

/// Pairwise force that writes half of every bond force into the
/// neighbor's row, halo rows included, so owners need the halo sums.
struct HalfBondForce;

impl ForceDensity for HalfBondForce {
    fn loc_to_halo_fields(&self) -> &[PointField] {
        &[PointField::Position]
    }

    fn halo_to_loc_fields(&self) -> &[PointField] {
        &[PointField::BInt]
    }

    fn compute_force_density(&self, chunk: &mut BodyChunk) -> PeridynResult<u64> {
        let model = *BondForce::bond_based().model();
        let n_loc = chunk.n_loc();
        let BodyChunk {
            system,
            storage,
            parameters,
            ..
        } = chunk;

        storage.b_int.fill(DVec3::ZERO);
        for i in 0..n_loc {
            let params = parameters.get(i);
            for bond in system.bonds_of(i) {
                let j = bond.neighbor;
                let delta = storage.position[j] - storage.position[i];
                let length = delta.length();
                let stretch = (length - bond.length) / bond.length;
                let f = model.bond_force(params, stretch, length) * delta;
                storage.b_int[i] += 0.5 * f * system.volume[j];
                storage.b_int[j] -= 0.5 * f * system.volume[i];
            }
        }
        Ok(0)
    }

    fn critical_time_step(&self, chunk: &BodyChunk) -> f64 {
        BondForce::bond_based().critical_time_step(chunk)
    }

    fn name(&self) -> &str {
        "half_bond"
    }
}

#[test]
fn halo_contributions_reach_owners_in_every_mode() {
    let body = plate(Fracture::Unbreakable);
    let conditions = pull(50.0);
    let solver = TimeSolver::from(VelocityVerlet::with_steps(5).unwrap().stepsize(1.0e-6).unwrap());

    let mut reference = handler(&body, 4, &solver);
    let pooled = RunOptions {
        force: &HalfBondForce,
        conditions: &conditions,
        ..RunOptions::default()
    };
    solver.run(&mut reference, &pooled).unwrap();
    let expected = reference.collect_vector("plate", PointField::Displacement).unwrap();

    // Interior points only move through bond forces, some of them
    // computed on a neighboring chunk.
    assert!(body
        .position()
        .iter()
        .zip(&expected)
        .any(|(p, u)| p.x.abs() < 0.1 && *u != DVec3::ZERO));

    for execution in [Execution::Ranks { ranks: 2 }, Execution::Ranks { ranks: 4 }] {
        let mut data = handler(&body, 4, &solver);
        let options = RunOptions {
            execution,
            ..pooled.clone()
        };
        solver.run(&mut data, &options).unwrap();
        assert_eq!(
            data.collect_vector("plate", PointField::Displacement).unwrap(),
            expected,
            "{execution:?}"
        );
    }
}

#[test]
fn more_ranks_than_chunks_is_rejected() {
    let solver = dr(1);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        execution: Execution::Ranks { ranks: 3 },
        ..RunOptions::default()
    };
    let err = solver.run(&mut data, &options).unwrap_err();
    assert!(matches!(err, PeridynError::InvalidConfig(_)));
}

/// Bond force that fails on one chunk.
struct FailingOn(ChunkId);

impl ForceDensity for FailingOn {
    fn loc_to_halo_fields(&self) -> &[PointField] {
        &[PointField::Position]
    }

    fn halo_to_loc_fields(&self) -> &[PointField] {
        &[]
    }

    fn compute_force_density(&self, chunk: &mut BodyChunk) -> PeridynResult<u64> {
        if chunk.id() == self.0 {
            return Err(PeridynError::InvariantViolation("injected failure".into()));
        }
        BondForce::bond_based().compute_force_density(chunk)
    }

    fn critical_time_step(&self, chunk: &BodyChunk) -> f64 {
        BondForce::bond_based().critical_time_step(chunk)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Bond force that panics on one chunk.
struct PanickingOn(ChunkId);

impl ForceDensity for PanickingOn {
    fn loc_to_halo_fields(&self) -> &[PointField] {
        &[PointField::Position]
    }

    fn halo_to_loc_fields(&self) -> &[PointField] {
        &[]
    }

    fn compute_force_density(&self, chunk: &mut BodyChunk) -> PeridynResult<u64> {
        if chunk.id() == self.0 {
            panic!("injected panic");
        }
        BondForce::bond_based().compute_force_density(chunk)
    }

    fn critical_time_step(&self, chunk: &BodyChunk) -> f64 {
        BondForce::bond_based().critical_time_step(chunk)
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

#[test]
fn failing_rank_aborts_every_rank() {
    let force = FailingOn(ChunkId(1));
    let solver = dr(5);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        force: &force,
        execution: Execution::Ranks { ranks: 2 },
        ..RunOptions::default()
    };
    let err = solver.run(&mut data, &options).unwrap_err();
    assert!(matches!(err, PeridynError::InvariantViolation(_)), "{err}");
}

#[test]
fn failing_chunk_aborts_pooled_run() {
    let force = FailingOn(ChunkId(0));
    let solver = dr(5);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        force: &force,
        ..RunOptions::default()
    };
    let err = solver.run(&mut data, &options).unwrap_err();
    assert!(matches!(err, PeridynError::InvariantViolation(_)));
}

#[test]
fn panicking_rank_aborts_every_rank() {
    let force = PanickingOn(ChunkId(0));
    let solver = vv(5);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        force: &force,
        execution: Execution::Ranks { ranks: 2 },
        ..RunOptions::default()
    };
    let err = solver.run(&mut data, &options).unwrap_err();
    assert!(matches!(err, PeridynError::WorkerFailure { .. }), "{err}");
}

// ─── Export Tests ─────────────────────────────────────────────

#[test]
fn export_cadence_includes_initial_state() {
    let exporter = MemoryExporter::new();
    let solver = dr(5);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        export_every: 2,
        exporter: &exporter,
        ..RunOptions::default()
    };
    let summary = solver.run(&mut data, &options).unwrap();

    assert_eq!(summary.exports, 6);
    let steps: Vec<(u32, u32)> = exporter.snapshots().iter().map(|s| (s.step, s.chunk)).collect();
    assert_eq!(steps, vec![(0, 0), (0, 1), (2, 0), (2, 1), (4, 0), (4, 1)]);
    assert!(exporter.snapshots().iter().all(|s| s.len() == 2 && s.damage.len() == 2));
}

#[test]
fn export_disabled_by_default() {
    let exporter = MemoryExporter::new();
    let solver = dr(3);
    let mut data = handler(&tetra(), 1, &solver);
    let options = RunOptions {
        exporter: &exporter,
        ..RunOptions::default()
    };
    assert_eq!(solver.run(&mut data, &options).unwrap().exports, 0);
    assert!(exporter.is_empty());
}

struct BrokenDisk;

impl Exporter for BrokenDisk {
    fn export_results(&self, _chunk: &BodyChunk, _step: u32, _t: f64) -> PeridynResult<()> {
        Err(PeridynError::Export("disk full".into()))
    }
}

#[test]
fn export_failure_is_not_fatal() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    let solver = dr(2);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        export_every: 1,
        exporter: &BrokenDisk,
        execution: Execution::Ranks { ranks: 2 },
        events: bus.emitter(),
        ..RunOptions::default()
    };
    let summary = solver.run(&mut data, &options).unwrap();
    bus.shutdown();

    assert_eq!(summary.steps, 2);
    assert_eq!(summary.exports, 0);
    assert_eq!(summary.export_failures, 6);
    let failures = sink
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::ExportFailed { .. }))
        .count();
    assert_eq!(failures, 6);
}

#[test]
fn run_events_bracket_the_steps() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    let solver = dr(3);
    let mut data = handler(&tetra(), 2, &solver);
    let options = RunOptions {
        events: bus.emitter(),
        execution: Execution::Ranks { ranks: 2 },
        ..RunOptions::default()
    };
    solver.run(&mut data, &options).unwrap();
    bus.shutdown();

    let events = sink.events();
    assert!(matches!(events.first().map(|e| &e.kind), Some(EventKind::RunBegin { chunks: 2, points: 4, .. })));
    assert!(matches!(events.last().map(|e| &e.kind), Some(EventKind::RunEnd { .. })));
    let begins = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TimestepBegin { .. }))
        .count();
    assert_eq!(begins, 3);
}

// ─── Configuration Tests ──────────────────────────────────────

#[test]
fn invalid_parameters_fail_at_construction() {
    assert!(matches!(
        VelocityVerlet::new(Some(1), Some(1.0), None, 0.7),
        Err(PeridynError::InvalidConfig(_))
    ));
    assert!(VelocityVerlet::new(None, None, None, 0.7).is_err());
    assert!(VelocityVerlet::new(Some(0), None, None, 0.7).is_err());
    assert!(VelocityVerlet::new(Some(1), None, None, 1.5).is_err());
    assert!(VelocityVerlet::with_steps(1).unwrap().stepsize(-1.0).is_err());
    assert!(DynamicRelaxation::new(0, 1.0, 1.0).is_err());
    assert!(DynamicRelaxation::new(1, 0.0, 1.0).is_err());
    assert!(DynamicRelaxation::new(1, 1.0, -2.0).is_err());

    let config = SolverConfig::DynamicRelaxation {
        steps: 10,
        stepsize: f64::NAN,
        damping_factor: 1.0,
    };
    assert!(matches!(TimeSolver::from_config(&config), Err(PeridynError::InvalidConfig(_))));
}

#[test]
fn parameters_corrupted_after_construction_fail_the_run() {
    let mut solver = DynamicRelaxation::with_steps(2).unwrap();
    solver.stepsize = -1.0;
    let solver = TimeSolver::from(solver);
    let mut data = handler(&tetra(), 2, &solver);
    let err = solver.run(&mut data, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, PeridynError::Consistency(_)));

    let mut solver = VelocityVerlet::with_steps(2).unwrap();
    solver.time = Some(1.0);
    let solver = TimeSolver::from(solver);
    let err = solver.run(&mut data, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, PeridynError::Consistency(_)));
}

#[test]
fn missing_solver_fields_fail_the_run() {
    let body = tetra();
    let mut data = DataHandler::build(
        &[(&body, 2)],
        PartitionStrategy::GraphGrowing,
        VelocityVerlet::REQUIRED_POINT_FIELDS,
        VelocityVerlet::REQUIRED_GLOBAL_FIELDS,
    )
    .unwrap();
    let err = dr(1).run(&mut data, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, PeridynError::Consistency(_)));
}

#[test]
fn solver_config_from_toml() {
    let config: SolverConfig = toml::from_str("kind = \"dynamic_relaxation\"\nsteps = 500\n").unwrap();
    assert_eq!(
        config,
        SolverConfig::DynamicRelaxation {
            steps: 500,
            stepsize: 1.0,
            damping_factor: 1.0
        }
    );

    let config: SolverConfig = toml::from_str("kind = \"velocity_verlet\"\ntime = 0.001\n").unwrap();
    let solver = TimeSolver::from_config(&config).unwrap();
    assert_eq!(solver.name(), "velocity_verlet");
    assert_eq!(
        solver,
        TimeSolver::VelocityVerlet(VelocityVerlet::with_time(0.001).unwrap())
    );
}

#[test]
fn solver_config_json_round_trip() {
    let config = SolverConfig::debug();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"kind\":\"velocity_verlet\""));
    let back: SolverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn required_fields_follow_the_solver() {
    assert!(dr(1).required_point_fields().contains(&PointField::DensityMatrix));
    assert!(!vv(1).required_point_fields().contains(&PointField::DensityMatrix));
    assert_eq!(dr(1).required_global_fields(), &[GlobalField::DampingCoefficient]);
    assert!(vv(1).required_global_fields().is_empty());
}
