//! Run driver — options, execution modes, and the time loop.
//!
//! [`execute`] validates a scheme, resolves its schedule, initializes the
//! chunks, and then steps them either on the rayon pool or on one thread
//! per worker rank.
//!
//! Rank 0 is the coordinator: it alone logs progress and emits run-level
//! events. A pooled run is a single coordinator context.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use peridyn_telemetry::{EventEmitter, EventKind, SimulationEvent};
use peridyn_types::{PeridynError, PeridynResult};

use crate::chunk::BodyChunk;
use crate::conditions::{Conditions, NoConditions};
use crate::data_handler::DataHandler;
use crate::export::{Exporter, NoExport};
use crate::force::{BondForce, ForceDensity};
use crate::halo::ExchangePlan;
use crate::strategy::{Schedule, StepReport, StepScheme};
use crate::worker::{RankLink, Worker};

static BOND_BASED: BondForce = BondForce::bond_based();
static NO_CONDITIONS: NoConditions = NoConditions;
static NO_EXPORT: NoExport = NoExport;

/// How chunks are mapped onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Execution {
    /// Rayon parallel phases over all chunks.
    ///
    /// `threads` selects a dedicated pool size; `None` uses the global pool.
    Pooled {
        #[serde(default)]
        threads: Option<usize>,
    },
    /// One thread per worker rank; chunk `c` belongs to rank `c mod ranks`.
    Ranks { ranks: usize },
}

impl Default for Execution {
    fn default() -> Self {
        Execution::Pooled { threads: None }
    }
}

impl Execution {
    /// Checks the mode against the chunk count.
    pub fn validate(&self, n_chunks: usize) -> PeridynResult<()> {
        match *self {
            Execution::Pooled { threads: Some(0) } => Err(PeridynError::InvalidConfig(
                "pooled execution needs at least one thread".into(),
            )),
            Execution::Ranks { ranks } if ranks == 0 || ranks > n_chunks => {
                Err(PeridynError::InvalidConfig(format!(
                    "{ranks} worker ranks requested for {n_chunks} chunks"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Number of execution contexts.
    pub fn n_ranks(&self) -> usize {
        match *self {
            Execution::Pooled { .. } => 1,
            Execution::Ranks { ranks } => ranks,
        }
    }
}

/// Identity of one execution context within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// Rank of this context.
    pub rank: usize,
    /// Number of contexts in the run.
    pub n_ranks: usize,
}

impl RunContext {
    /// The only context of a single-context run.
    pub fn single() -> Self {
        Self { rank: 0, n_ranks: 1 }
    }

    /// Returns true for the coordinator (rank 0).
    #[inline]
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

/// Collaborators and execution settings of a run.
#[derive(Clone)]
pub struct RunOptions<'a> {
    /// Export every n-th step, plus the initial state. 0 disables export.
    pub export_every: u32,
    /// Thread mapping.
    pub execution: Execution,
    /// Internal force density.
    pub force: &'a dyn ForceDensity,
    /// Boundary and initial conditions.
    pub conditions: &'a dyn Conditions,
    /// Snapshot sink.
    pub exporter: &'a dyn Exporter,
    /// Telemetry producer, if any.
    pub events: Option<EventEmitter>,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            export_every: 0,
            execution: Execution::default(),
            force: &BOND_BASED,
            conditions: &NO_CONDITIONS,
            exporter: &NO_EXPORT,
            events: None,
        }
    }
}

impl std::fmt::Debug for RunOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("export_every", &self.export_every)
            .field("execution", &self.execution)
            .field("force", &self.force.name())
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl RunOptions<'_> {
    #[inline]
    fn exports_at(&self, step: u32) -> bool {
        self.export_every > 0 && step % self.export_every == 0
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Time solver name.
    pub solver: String,
    /// Steps taken.
    pub steps: u32,
    /// Time step used.
    pub stepsize: f64,
    /// Simulation time after the last step.
    pub final_time: f64,
    /// Bonds broken during the run.
    pub broken_bonds: u64,
    /// Largest point damage at the end of the run.
    pub max_damage: f64,
    /// Steps that took the undamped start-up branch.
    pub first_step_branches: u32,
    /// Steps that took the damped recurrence.
    pub damped_steps: u32,
    /// Largest damping coefficient applied.
    pub max_damping: f64,
    /// Chunk snapshots written.
    pub exports: u64,
    /// Chunk snapshots that failed.
    pub export_failures: u64,
    /// Wall-clock time of the stepping loop (seconds).
    pub wall_time: f64,
}

impl RunSummary {
    fn absorb(&mut self, report: &StepReport) {
        self.broken_bonds += report.broken_bonds;
        self.max_damage = self.max_damage.max(report.max_damage);
        self.first_step_branches += u32::from(report.first_step);
        self.damped_steps += u32::from(report.damped);
        if let Some(cn) = report.max_damping {
            self.max_damping = self.max_damping.max(cn);
        }
    }

    /// Combines the partial summaries of the ranks of one run.
    fn merge(mut self, other: RunSummary) -> Self {
        self.broken_bonds += other.broken_bonds;
        self.max_damage = self.max_damage.max(other.max_damage);
        self.first_step_branches = self.first_step_branches.max(other.first_step_branches);
        self.damped_steps = self.damped_steps.max(other.damped_steps);
        self.max_damping = self.max_damping.max(other.max_damping);
        self.exports += other.exports;
        self.export_failures += other.export_failures;
        self
    }
}

/// Runs `scheme` over every chunk of `data`.
pub(crate) fn execute<S: StepScheme>(
    scheme: &S,
    data: &mut DataHandler,
    options: &RunOptions<'_>,
) -> PeridynResult<RunSummary> {
    scheme.check()?;
    for chunk in data.chunks() {
        chunk
            .storage
            .ensure(scheme.required_point_fields(), scheme.required_global_fields())?;
    }
    options.execution.validate(data.n_chunks())?;
    let schedule = scheme.schedule(data, options.force)?;

    let conditions = options.conditions;
    data.chunks_mut().par_iter_mut().try_for_each(|chunk| {
        conditions.apply_initial(chunk);
        scheme.init_chunk(chunk, &schedule)
    })?;

    tracing::info!(
        solver = scheme.name(),
        chunks = data.n_chunks(),
        points = data.n_points(),
        steps = schedule.steps,
        stepsize = schedule.stepsize,
        execution = ?options.execution,
        "run starting"
    );
    if let Some(events) = &options.events {
        events.emit(SimulationEvent::new(
            0,
            EventKind::RunBegin {
                solver: scheme.name().to_string(),
                chunks: data.n_chunks() as u32,
                points: data.n_points() as u64,
                steps: schedule.steps,
                stepsize: schedule.stepsize,
            },
        ));
    }

    let start = Instant::now();
    let (chunks, plan) = data.chunks_and_plan();
    let mut summary = match options.execution {
        Execution::Pooled { threads } => {
            let mut run = move || {
                let mut worker = Worker::pooled(chunks, plan, options.events.clone());
                drive(scheme, &mut worker, &schedule, options)
            };
            match threads {
                Some(n) => rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| PeridynError::InvalidConfig(format!("cannot build thread pool: {e}")))?
                    .install(run)?,
                None => run()?,
            }
        }
        Execution::Ranks { ranks } => run_ranks(scheme, chunks, plan, ranks, &schedule, options)?,
    };

    summary.solver = scheme.name().to_string();
    summary.steps = schedule.steps;
    summary.stepsize = schedule.stepsize;
    summary.final_time = schedule.end_time();
    summary.wall_time = start.elapsed().as_secs_f64();

    tracing::info!(
        steps = summary.steps,
        broken_bonds = summary.broken_bonds,
        max_damage = summary.max_damage,
        wall_time = summary.wall_time,
        "run finished"
    );
    if let Some(events) = &options.events {
        events.emit(SimulationEvent::new(
            schedule.steps,
            EventKind::RunEnd {
                wall_time: summary.wall_time,
            },
        ));
    }
    Ok(summary)
}

fn run_ranks<S: StepScheme>(
    scheme: &S,
    chunks: &mut [BodyChunk],
    plan: &ExchangePlan,
    ranks: usize,
    schedule: &Schedule,
    options: &RunOptions<'_>,
) -> PeridynResult<RunSummary> {
    let mut owned: Vec<Vec<&mut BodyChunk>> = (0..ranks).map(|_| Vec::new()).collect();
    for (c, chunk) in chunks.iter_mut().enumerate() {
        owned[c % ranks].push(chunk);
    }
    let links = RankLink::mesh(ranks);

    let results: Vec<PeridynResult<RunSummary>> = std::thread::scope(|scope| {
        let handles: Vec<_> = owned
            .into_iter()
            .zip(links)
            .enumerate()
            .map(|(rank, (chunks, link))| {
                let events = options.events.clone();
                scope.spawn(move || {
                    let ctx = RunContext { rank, n_ranks: ranks };
                    let mut signal = link.abort_signal();
                    let mut worker = Worker::rank(ctx, chunks, plan, link, events);
                    let result = drive(scheme, &mut worker, schedule, options);
                    match &result {
                        Ok(_) | Err(PeridynError::WorkerFailure { .. }) => signal.disarm(),
                        Err(e) => signal.set_reason(e.to_string()),
                    }
                    result
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(PeridynError::WorkerFailure {
                        rank,
                        reason: "worker panicked".into(),
                    })
                })
            })
            .collect()
    });

    // Report the failure that started the abort, not its echoes.
    let mut echo = None;
    let mut summary: Option<RunSummary> = None;
    for result in results {
        match result {
            Ok(s) => {
                summary = Some(match summary {
                    Some(acc) => acc.merge(s),
                    None => s,
                })
            }
            Err(e @ PeridynError::WorkerFailure { .. }) => echo = echo.or(Some(e)),
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = echo {
        return Err(e);
    }
    summary.ok_or_else(|| PeridynError::Consistency("run had no worker ranks".into()))
}

/// The time loop of one worker.
fn drive<S: StepScheme>(
    scheme: &S,
    worker: &mut Worker<'_>,
    schedule: &Schedule,
    options: &RunOptions<'_>,
) -> PeridynResult<RunSummary> {
    let coordinator = worker.context().is_coordinator();
    let mut summary = RunSummary::default();

    if options.exports_at(0) {
        export(worker, options, 0, 0.0, &mut summary)?;
    }

    for n in 1..=schedule.steps {
        worker.poll_abort()?;
        let t = schedule.time_at(n);
        let started = Instant::now();
        if coordinator {
            worker.emit(n, EventKind::TimestepBegin { sim_time: t });
        }

        let report = scheme.step(worker, n, schedule, options)?;
        summary.absorb(&report);

        if options.exports_at(n) {
            export(worker, options, n, t, &mut summary)?;
        }

        if coordinator {
            tracing::debug!(
                step = n,
                time = t,
                broken_bonds = report.broken_bonds,
                max_damage = report.max_damage,
                damping = ?report.max_damping,
                "step done"
            );
            worker.emit(
                n,
                EventKind::TimestepEnd {
                    wall_time: started.elapsed().as_secs_f64(),
                },
            );
        }
    }

    Ok(summary)
}

fn export(
    worker: &mut Worker<'_>,
    options: &RunOptions<'_>,
    step: u32,
    t: f64,
    summary: &mut RunSummary,
) -> PeridynResult<()> {
    let exporter = options.exporter;
    let failures = worker.map_chunks(|chunk| {
        Ok(exporter
            .export_results(chunk, step, t)
            .err()
            .map(|e| (chunk.id(), e.to_string())))
    })?;

    for failure in &failures {
        match failure {
            None => summary.exports += 1,
            Some((chunk, message)) => {
                summary.export_failures += 1;
                tracing::warn!(chunk = chunk.0, step, %message, "export failed");
                worker.emit(
                    step,
                    EventKind::ExportFailed {
                        chunk: chunk.0,
                        message: message.clone(),
                    },
                );
            }
        }
    }
    Ok(())
}
