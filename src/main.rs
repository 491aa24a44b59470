mod config;
mod fs_tree;


use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use plan::cluster::ClusterDescriptor;
use plan::decode::RasterDecoder;
use plan::doc::SurfaceType;
use plan::engine::{Action, EngineCore};
use plan::export::marker_file_name;
use plan::input::Mode;
use plan::session::{Session, SessionError};
use plan::store::MemoryStore;
use plan::transform::Point;
use serde::Serialize;

use crate::config::HostConfig;
use crate::fs_tree::{DirectoryPackager, FsError, read_tree};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reading photo {path}: {source}")]
    Photo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("the press at ({x}, {y}) does not land on the plan")]
    OffPlan { x: f64, y: f64 },
    #[error("no marker with sequence number {0}")]
    NoSuchSeq(u32),
}

#[derive(Parser, Debug)]
#[command(name = "firestop", about = "Fire-stop floor-plan survey tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the project name, plans and marker counts.
    Summary {
        /// Unpacked project archive directory.
        project: PathBuf,
    },
    /// Print the pins shown on one plan.
    Clusters {
        project: PathBuf,
        #[arg(long, default_value_t = 0)]
        plan: usize,
        /// Merge distance in screen pixels; defaults to FIRESTOP_UI_CLUSTER_PX.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Long-press a screen point on a plan and save a new marker.
    Mark(MarkArgs),
    /// Delete the marker with a sequence number.
    Delete {
        project: PathBuf,
        #[arg(long)]
        seq: u32,
        /// Directory to write the updated project archive into.
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the photo and marked-map report.
    Export {
        project: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct MarkArgs {
    project: PathBuf,
    #[arg(long, default_value_t = 0)]
    plan: usize,
    /// Finger position in container pixels at the fitted view.
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    #[arg(long)]
    photo: PathBuf,
    /// Defaults to the location of the newest marker.
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    floor: Option<String>,
    #[arg(long, default_value_t = false)]
    mezzanine: bool,
    /// Treated surface label, e.g. 倒吊面.
    #[arg(long, value_parser = parse_surface)]
    surface: Option<SurfaceType>,
    /// Directory to write the updated project archive into.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Serialize)]
struct Summary<'a> {
    name: &'a str,
    plans: Vec<PlanSummary<'a>>,
    markers: usize,
    next_seq: u32,
}

#[derive(Serialize)]
struct PlanSummary<'a> {
    name: &'a str,
    width: u32,
    height: u32,
    markers: usize,
}

#[derive(Serialize)]
struct Placed {
    seq: u32,
    x: f64,
    y: f64,
    photo: String,
    archive: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = HostConfig::from_env();

    match cli.command {
        Command::Summary { project } => run_summary(&project).await,
        Command::Clusters { project, plan, threshold } => {
            run_clusters(&project, plan, threshold.unwrap_or(config.ui_cluster_px)).await
        }
        Command::Mark(args) => run_mark(&config, args).await,
        Command::Delete { project, seq, out } => run_delete(&project, seq, &out).await,
        Command::Export { project, out } => run_export(&project, &out).await,
    }
}

async fn open(project: &Path) -> Result<Session<MemoryStore>, CliError> {
    let tree = read_tree(project).await?;
    let mut session = Session::new(MemoryStore::new());
    session.restore().await?;
    session.load_archive(&tree, &RasterDecoder).await?;
    Ok(session)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_summary(project: &Path) -> Result<(), CliError> {
    let session = open(project).await?;
    let plans = session
        .project()
        .floor_plans
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let size = p.size.unwrap_or_default();
            PlanSummary { name: &p.name, width: size.width, height: size.height, markers: session.markers().for_plan(i).count() }
        })
        .collect();
    print_json(&Summary {
        name: &session.project().name,
        plans,
        markers: session.markers().len(),
        next_seq: session.markers().next_seq(),
    })
}

async fn run_clusters(project: &Path, plan: usize, threshold: f64) -> Result<(), CliError> {
    let mut session = open(project).await?;
    session.select_plan(plan)?;
    let pins: Vec<ClusterDescriptor> = session.visible_clusters(threshold);
    print_json(&pins)
}

async fn run_mark(config: &HostConfig, args: MarkArgs) -> Result<(), CliError> {
    let mut session = open(&args.project).await?;
    session.select_plan(args.plan)?;
    let size = session.plan_size(args.plan, &RasterDecoder)?;

    let mut engine = EngineCore::with_config(config.gestures());
    engine.load_plan(config.container_width, size);
    engine.set_mode(Mode::Mark);
    let at = press_and_hold(&mut engine, Point::new(args.x, args.y)).ok_or(CliError::OffPlan { x: args.x, y: args.y })?;

    let photo = tokio::fs::read(&args.photo)
        .await
        .map_err(|source| CliError::Photo { path: args.photo.clone(), source })?;
    let mut draft = session.draft_marker(args.plan, at, now_ms())?;
    draft.photo = Some(photo.into());
    if let Some(location) = args.location {
        draft.data.location = location;
    }
    if let Some(floor) = args.floor {
        draft.data.floor = floor;
    }
    draft.data.is_mezzanine = args.mezzanine;
    if let Some(surface) = args.surface {
        draft.data.surface_type = surface;
    }
    let marker = session.save_marker(draft).await?;

    let archive = session.save_archive(&DirectoryPackager::new(&args.out)).await?;
    print_json(&Placed { seq: marker.seq, x: at.x, y: at.y, photo: marker_file_name(&marker), archive })
}

fn parse_surface(text: &str) -> Result<SurfaceType, String> {
    SurfaceType::from_label(text).ok_or_else(|| {
        let labels: Vec<&str> = SurfaceType::ALL.iter().map(|s| s.label()).collect();
        format!("expected one of {}", labels.join(", "))
    })
}

/// Touch down, let the long-press timer fire, and lift. Returns the placed point.
fn press_and_hold(engine: &mut EngineCore, finger: Point) -> Option<Point> {
    let gesture = engine.on_touch_start(&[finger]).into_iter().find_map(|a| match a {
        Action::ArmLongPress { gesture, .. } => Some(gesture),
        _ => None,
    })?;
    engine.on_long_press_elapsed(gesture);
    engine.on_touch_end().into_iter().find_map(|a| match a {
        Action::PlaceMarker { at } => Some(at),
        _ => None,
    })
}

async fn run_delete(project: &Path, seq: u32, out: &Path) -> Result<(), CliError> {
    let mut session = open(project).await?;
    let id = session.markers().iter().find(|m| m.seq == seq).map(|m| m.id).ok_or(CliError::NoSuchSeq(seq))?;
    session.delete_marker(id).await?;
    let archive = session.save_archive(&DirectoryPackager::new(out)).await?;
    println!("{archive}");
    Ok(())
}

async fn run_export(project: &Path, out: &Path) -> Result<(), CliError> {
    let session = open(project).await?;
    let skipped = session.export_report(&RasterDecoder, &DirectoryPackager::new(out)).await?;
    for name in &skipped {
        tracing::warn!(plan = %name, "map skipped");
    }
    println!("{}", plan::export::report_file_name(&session.project().name));
    Ok(())
}

fn now_ms() -> i64 {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
