use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use nalgebra::{Point2, Vector2};
use pvf_core::PathVectorField;

/// Padding, in node-spacing multiples, added around the combined bounding
/// box of all trajectories when extents are derived automatically.
const AUTO_PADDING: f64 = 3.0;

#[derive(Debug, Parser)]
#[command(name = "pvf", version, about = "Train and query path vector fields", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest trajectories and write the resulting model
    Train(TrainArgs),
    /// Synthesize a pseudo-average trajectory from a trained model
    Synthesize(SynthesizeArgs),
    /// Print summary statistics for a trained model
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Spacing between adjacent lattice nodes
    #[clap(long)]
    spacing: f64,
    /// Explicit grid extents "Ex,Ey"; derived automatically if omitted
    #[clap(long, value_parser = parse_pair)]
    extents: Option<(f64, f64)>,
    /// Path to write the trained model to
    #[clap(short, long)]
    output: PathBuf,
    /// One or more trajectory files, in task space
    trajectories: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct SynthesizeArgs {
    /// Path to a trained model
    #[clap(long)]
    model: PathBuf,
    /// Starting point "X,Y" in task space
    #[clap(long, value_parser = parse_pair)]
    start: (f64, f64),
    /// Path to write the synthesized trajectory to
    #[clap(short, long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Path to a trained model
    #[clap(long)]
    model: PathBuf,
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let x = a.trim().parse().map_err(|_| format!("invalid number: {a:?}"))?;
    let y = b.trim().parse().map_err(|_| format!("invalid number: {b:?}"))?;
    Ok((x, y))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Train(args) => train(args).map(|()| ExitCode::SUCCESS),
        Command::Synthesize(args) => synthesize(args),
        Command::Inspect(args) => inspect(args).map(|()| ExitCode::SUCCESS),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    if args.trajectories.is_empty() {
        bail!("at least one trajectory file is required");
    }

    let raw_trajs: Vec<Vec<Point2<f64>>> = args
        .trajectories
        .iter()
        .map(|p| pvf_io::read_trajectory(p).with_context(|| format!("reading {}", p.display())))
        .collect::<Result<_>>()?;

    let (extents, shift) = match args.extents {
        Some(extents) => (extents, Vector2::zeros()),
        None => derive_shared_extents(&raw_trajs, args.spacing),
    };

    let mut field = PathVectorField::new(args.spacing).context("constructing field")?;
    field.set_extents(extents).context("setting extents")?;
    field.set_task_shift(shift);

    for (path, traj) in args.trajectories.iter().zip(&raw_trajs) {
        let shifted: Vec<Point2<f64>> = traj.iter().map(|p| p - shift).collect();
        let fixed = match pvf_io::check_extents(&shifted, extents) {
            Ok(fixed) => fixed,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        if let Err(e) = field.update_grid(&fixed) {
            warn!("skipping {}: {e}", path.display());
            continue;
        }
        info!("trained on {}", path.display());
    }

    pvf_io::save_model(&args.output, &field)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote model to {}", args.output.display());
    Ok(())
}

/// Combines the bounding boxes of every trajectory and pads by
/// `AUTO_PADDING` node spacings, mirroring the single-trajectory
/// derivation in `pvf_io::to_grid_space` but across the whole training set.
fn derive_shared_extents(trajs: &[Vec<Point2<f64>>], spacing: f64) -> ((f64, f64), Vector2<f64>) {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for traj in trajs {
        for p in traj {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
    }
    let y_fact = pvf_core::Y_FACT;
    let ex = (max.x - min.x) + 2.0 * AUTO_PADDING * spacing;
    let ey = (max.y - min.y) + 2.0 * AUTO_PADDING * spacing * y_fact;
    let shift = Vector2::new(min.x - AUTO_PADDING * spacing, min.y - AUTO_PADDING * spacing * y_fact);
    ((ex, ey), shift)
}

fn synthesize(args: SynthesizeArgs) -> Result<ExitCode> {
    let mut field = pvf_io::open_model(&args.model)
        .with_context(|| format!("reading {}", args.model.display()))?
        .with_context(|| format!("no model found at {}", args.model.display()))?;

    let (ex, ey) = field.extents().context("model has no extents")?;
    let shift = field.task_shift();
    let start_task = Point2::new(args.start.0, args.start.1);
    let start_grid = start_task - shift;
    if start_grid.x <= 0.0 || start_grid.y <= 0.0 || start_grid.x >= ex || start_grid.y >= ey {
        bail!("start point {:?} lies outside grid extents ({ex}, {ey})", args.start);
    }

    match field.av_traj(start_grid) {
        Some(traj_grid) => {
            let traj_task = pvf_io::to_task_space(&traj_grid, shift);
            pvf_io::write_trajectory(&args.output, &traj_task)
                .with_context(|| format!("writing {}", args.output.display()))?;
            info!("synthesized {} point(s) to {}", traj_task.len(), args.output.display());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!("coverage failure: start trident is entirely unvisited");
            Ok(ExitCode::from(2))
        }
    }
}

fn inspect(args: InspectArgs) -> Result<()> {
    let field = pvf_io::open_model(&args.model)
        .with_context(|| format!("reading {}", args.model.display()))?
        .with_context(|| format!("no model found at {}", args.model.display()))?;

    let (nx, ny) = field.dims();
    println!("node_spacing:        {}", field.node_spacing());
    if let Some((ex, ey)) = field.extents() {
        println!("grid_extents:         ({ex}, {ey})");
    }
    println!("grid_dimensions:      {nx} x {ny}");
    let shift = field.task_shift();
    println!("task_shift:           ({}, {})", shift.x, shift.y);
    println!("grid_update_count:    {}", field.update_count());
    println!("average_path_length:  {}", field.average_path_length());
    println!("max_coord_count:      {}", field.max_coord_count());
    println!("shortest_segment:     {}", field.shortest_segment());
    Ok(())
}
