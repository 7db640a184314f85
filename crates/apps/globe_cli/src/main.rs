use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use foundation::time::Time;
use globe::engine::RenderSession;
use globe::headless::HeadlessBackend;
use globe::profile::DeviceProfile;
use globe::{GlobeConfig, GlobeViewer, SessionStatus};
use scene::cluster::resolve_display_points;
use scene::points::{PointId, PointRecord};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_SECS: f64 = 1.0 / 60.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mentor globe layout and headless simulation")]
struct Args {
    /// JSON config file (defaults plus GLOBE_* environment overrides if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device profile override: desktop or mobile
    #[arg(long)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration as JSON
    Config,

    /// Resolve display coordinates for a record file
    Layout {
        /// JSON array of mentor records
        #[arg(long)]
        input: PathBuf,
    },

    /// Drive a headless globe through bootstrap, marker creation and hover
    Simulate {
        /// JSON array of mentor records
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value_t = 1280.0)]
        width: f64,

        #[arg(long, default_value_t = 720.0)]
        height: f64,

        /// Number of renderer constructions that fail before one succeeds
        #[arg(long, default_value_t = 0)]
        fail_first: u32,

        /// Simulate a device without hardware rendering
        #[arg(long)]
        no_capability: bool,

        /// Upper bound on simulated frames
        #[arg(long, default_value_t = 600)]
        max_frames: u32,

        /// Hover the marker with this id once markers are built
        #[arg(long)]
        hover: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.profile.as_deref())?;

    match args.command {
        Command::Config => print_json(&config),
        Command::Layout { input } => cmd_layout(&config, &input),
        Command::Simulate {
            input,
            width,
            height,
            fail_first,
            no_capability,
            max_frames,
            hover,
        } => {
            let mut backend = HeadlessBackend::new().failing_first(fail_first);
            if no_capability {
                backend = backend.without_capability();
            }
            let opts = SimOptions {
                width,
                height,
                max_frames,
                hover: hover.map(PointId::new),
            };
            cmd_simulate(config, backend, &input, &opts)
        }
    }
}

fn load_config(path: Option<&Path>, profile: Option<&str>) -> Result<GlobeConfig, String> {
    let mut config = match path {
        Some(p) => GlobeConfig::from_json_file(p),
        None => GlobeConfig::from_env(),
    }
    .map_err(|e| e.to_string())?;

    if let Some(raw) = profile {
        config.profile =
            DeviceProfile::parse(raw).ok_or_else(|| format!("unknown profile: {raw}"))?;
    }
    Ok(config)
}

fn read_records(path: &Path) -> Result<Vec<PointRecord>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("parse {path:?}: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| format!("encode json: {e}"))?;
    println!("{out}");
    Ok(())
}

#[derive(Serialize)]
struct LayoutRow {
    id: String,
    lat: f64,
    lng: f64,
    cluster_key: String,
    cluster_index: usize,
    cluster_size: usize,
}

fn cmd_layout(config: &GlobeConfig, input: &Path) -> Result<(), String> {
    let records = read_records(input)?;
    let points = resolve_display_points(&records, config.cluster_base_radius_deg);
    if points.len() < records.len() {
        warn!(
            skipped = records.len() - points.len(),
            "records without coordinates skipped"
        );
    }
    let rows: Vec<LayoutRow> = points
        .iter()
        .map(|p| LayoutRow {
            id: p.id().to_string(),
            lat: p.position.lat,
            lng: p.position.lng,
            cluster_key: p.cluster_key.to_string(),
            cluster_index: p.cluster_index,
            cluster_size: p.cluster_size,
        })
        .collect();
    print_json(&rows)
}

struct SimOptions {
    width: f64,
    height: f64,
    max_frames: u32,
    hover: Option<PointId>,
}

#[derive(Serialize)]
struct SimReport {
    status: String,
    profile: String,
    construction_attempts: u32,
    retry_count: u32,
    failure: Option<String>,
    records: usize,
    markers: usize,
    drawn: usize,
    build_steps: u32,
    frames: u64,
    hovered: Option<String>,
    hover_label: Option<String>,
    events: Vec<String>,
}

fn cmd_simulate(
    config: GlobeConfig,
    backend: HeadlessBackend,
    input: &Path,
    opts: &SimOptions,
) -> Result<(), String> {
    let records = read_records(input)?;
    let mut viewer = GlobeViewer::new(backend, config).map_err(|e| e.to_string())?;
    viewer.set_points(&records);

    let mut now = 0.0;
    viewer.on_container_resize(opts.width, opts.height, Time(now));

    for _ in 0..opts.max_frames {
        now += FRAME_SECS;
        viewer.on_frame(Time(now));
        let settled = match viewer.status() {
            SessionStatus::Ready => viewer.entities().pending_count() == 0,
            SessionStatus::Failed | SessionStatus::Destroyed => true,
            _ => false,
        };
        if settled {
            break;
        }
    }

    let mut hovered = None;
    if let Some(id) = &opts.hover {
        let at = viewer.session().and_then(|s| s.marker_screen_position(id));
        match at {
            Some(px) => {
                now += 1.0;
                viewer.on_pointer_move(px.x, px.y, Time(now));
                viewer.on_frame(Time(now + FRAME_SECS));
                hovered = viewer.is_hovered(id).then(|| id.to_string());
            }
            None => warn!(id = %id, "marker not on screen; hover skipped"),
        }
    }

    let report = SimReport {
        status: viewer.status().to_string(),
        profile: viewer.profile().profile.to_string(),
        construction_attempts: viewer.backend().construction_attempts(),
        retry_count: viewer.retry_count(),
        failure: viewer.failure().map(|f| f.user_message()),
        records: records.len(),
        markers: viewer.session().map(|s| s.marker_count()).unwrap_or(0),
        drawn: viewer
            .session()
            .map(|s| s.drawn_markers().len())
            .unwrap_or(0),
        build_steps: viewer.entities().build_steps(),
        frames: viewer.frame().map(|f| f.index + 1).unwrap_or(0),
        hover_label: opts.hover.as_ref().and_then(|id| viewer.hover_label(id)),
        hovered,
        events: viewer
            .events()
            .events()
            .iter()
            .map(|e| format!("{:.3}s {}: {}", e.at.as_secs(), e.kind, e.message))
            .collect(),
    };
    info!(status = %report.status, markers = report.markers, "simulation finished");

    viewer.teardown(Time(now));
    print_json(&report)
}
