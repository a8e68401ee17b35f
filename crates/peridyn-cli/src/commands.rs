//! CLI command implementations.

use std::path::{Path, PathBuf};

use peridyn_io::{validate_job, Job, JobConfig, JsonExporter};
use peridyn_material::MaterialDatabase;
use peridyn_telemetry::{EventBus, TracingSink};

/// Run a job from its config file.
pub fn simulate(config_path: &Path, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Peridyn Simulation");
    println!("──────────────────");
    println!("Config: {}", config_path.display());

    let mut config = JobConfig::from_file(config_path)?;
    if output.is_some() {
        config.output = output;
    }
    let job = Job::from_config(config)?;

    println!("Job:    {}", job.config().name);
    println!("Solver: {}", job.solver().name());
    for body in job.bodies() {
        println!("Body:   {} ({} points)", body.name, body.n_points());
    }
    println!();

    let mut bus = EventBus::new();
    bus.add_sink(Box::new(TracingSink::new()));
    let result = job.run(bus.emitter());
    bus.shutdown();
    let report = result?;
    let summary = &report.summary;

    println!("  Steps:         {}", summary.steps);
    println!("  Step size:     {:.4e}", summary.stepsize);
    println!("  Final time:    {:.4e}", summary.final_time);
    println!("  Broken bonds:  {}", summary.broken_bonds);
    println!("  Max damage:    {:.4}", summary.max_damage);
    if summary.damped_steps > 0 {
        println!("  Max damping:   {:.4}", summary.max_damping);
    }
    println!("  Snapshots:     {} ({} failed)", summary.exports, summary.export_failures);
    println!("  Wall time:     {:.3}s", summary.wall_time);

    if let Some(path) = &report.summary_path {
        println!();
        println!("Summary written to: {}", path.display());
    }
    Ok(())
}

/// Validate a job config.
pub fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Peridyn Validator");
    println!("─────────────────");
    println!();

    println!("Validating config: {}", path.display());
    let config = JobConfig::from_file(path)?;
    validate_job(&config)?;
    println!("✅ Config is valid.");
    println!("  Bodies:  {}", config.bodies.len());
    println!("  Chunks:  {}", config.total_chunks());
    println!("  Solver:  {}", config.solver.name());
    Ok(())
}

/// Decompose every body of a job and print the chunk layout.
pub fn decompose(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Peridyn Decomposition");
    println!("─────────────────────");
    println!();

    let job = Job::from_file(config_path)?;
    let data = job.decompose()?;

    for body in data.bodies() {
        println!(
            "{}: {} points, {} bonds, {} cut",
            body.name, body.n_points, body.n_bonds, body.cut_bonds
        );
        for chunk in &data.chunks()[body.chunks.clone()] {
            println!(
                "  chunk {:>3}  loc {:>7}  halo {:>6}  bonds {:>8}",
                chunk.id().0,
                chunk.n_loc(),
                chunk.n_halo(),
                chunk.system.n_bonds()
            );
        }
    }
    println!();
    println!("Exchange routes: {}", data.plan().len());
    println!("Halo rows:       {}", data.plan().halo_volume());
    Ok(())
}

/// Inspect a chunk snapshot.
pub fn inspect(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Peridyn Snapshot Inspector");
    println!("──────────────────────────");
    println!();

    let snapshot = JsonExporter::read_snapshot(path)?;

    println!("Body:         {}", snapshot.body);
    println!("Chunk:        {}", snapshot.chunk);
    println!("Step:         {}", snapshot.step);
    println!("Time:         {:.4e}", snapshot.time);
    println!("Points:       {}", snapshot.len());

    if !snapshot.is_empty() {
        let max_displacement = snapshot
            .displacement
            .iter()
            .map(|u| (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt())
            .fold(0.0_f64, f64::max);
        let max_damage = snapshot.damage.iter().copied().fold(0.0_f64, f64::max);
        let damaged = snapshot.damage.iter().filter(|&&d| d > 0.0).count();
        println!("Max |u|:      {max_displacement:.4e}");
        println!("Max damage:   {max_damage:.4}");
        println!("Damaged:      {damaged}");
    }
    Ok(())
}

/// List the material presets.
pub fn materials() -> Result<(), Box<dyn std::error::Error>> {
    println!("Peridyn Materials");
    println!("─────────────────");
    println!();

    let db = MaterialDatabase::with_defaults();
    for name in db.names() {
        let Some(spec) = db.get(name) else { continue };
        println!(
            "  {:<10} ρ = {:>8.1}  E = {:.3e}  {:?}",
            name, spec.density, spec.youngs_modulus, spec.fracture
        );
    }
    Ok(())
}
