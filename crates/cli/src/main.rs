use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use reident_core::config::engine_config::EngineConfig;
use reident_core::lifecycle::identity_lifecycle_manager::IdentityLifecycleManager;
use reident_core::pipeline::identity_report::ResolutionReport;
use reident_core::pipeline::infrastructure::jsonl_label_writer::JsonlLabelWriter;
use reident_core::pipeline::infrastructure::jsonl_observation_reader::JsonlObservationReader;
use reident_core::pipeline::infrastructure::scene_boundary_source::SceneBoundarySource;
use reident_core::pipeline::infrastructure::threaded_batch_executor::{
    SendError, ThreadedBatchExecutor,
};
use reident_core::pipeline::observation_source::ObservationSource;
use reident_core::pipeline::resolution_logger::StdoutResolutionLogger;
use reident_core::pipeline::resolve_identities_use_case::{
    LabelSelection, ResolveIdentitiesUseCase,
};
use reident_core::scene::domain::scene_timeline::SceneTimeline;
use reident_core::shared::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_MIN_SCENE_DURATION, LABELS_FILE_SUFFIX,
    PROGRESS_THROTTLE_FRAMES, REPORT_FILE_SUFFIX,
};
use reident_core::shared::ids::Pid;

/// Assigns persistent person identities to per-frame detections.
#[derive(Parser)]
#[command(name = "reident")]
struct Cli {
    /// Observation files (JSON lines), one per video.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for label and identity report files.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Engine configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fused score at or above which a match is accepted.
    #[arg(long)]
    accept: Option<f64>,

    /// Fused score at or below which a match is rejected.
    #[arg(long)]
    reject: Option<f64>,

    /// Exemplars kept per modality and identity.
    #[arg(long)]
    exemplars: Option<usize>,

    /// Scenes an identity may go unseen before it expires.
    #[arg(long)]
    staleness_scenes: Option<u32>,

    /// Scene timeline (JSON list of [start, end] seconds). Single input only.
    #[arg(long, conflicts_with = "cuts")]
    scenes: Option<PathBuf>,

    /// Shot cuts (JSON list of frame numbers). Single input only.
    #[arg(long, requires_all = ["fps", "total_frames"])]
    cuts: Option<PathBuf>,

    /// Frame rate used to turn cut frame numbers into seconds.
    #[arg(long, requires = "cuts")]
    fps: Option<f64>,

    /// Frame count of the video the cuts belong to.
    #[arg(long, requires = "cuts")]
    total_frames: Option<usize>,

    /// Scenes shorter than this (seconds) join the previous one.
    #[arg(long, default_value_t = DEFAULT_MIN_SCENE_DURATION)]
    min_scene_duration: f64,

    /// Withhold labels of identities seen in a single frame only.
    #[arg(long)]
    drop_transient: bool,

    /// Only emit labels for these identities (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pids: Option<Vec<u32>>,

    /// Emit labels for all identities except these (comma-separated).
    #[arg(long, value_delimiter = ',')]
    exclude_pids: Option<Vec<u32>>,

    /// Videos resolved in parallel.
    #[arg(long, default_value = "1")]
    jobs: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    log::debug!("Effective configuration:\n{}", config.to_json_pretty()?);

    std::fs::create_dir_all(&cli.output_dir)?;

    let selection = LabelSelection {
        keep_pids: to_pid_set(cli.pids.clone()),
        drop_pids: to_pid_set(cli.exclude_pids.clone()),
        drop_transient: cli.drop_transient,
    };
    let timeline = load_timeline(&cli)?.map(|t| t.merge_short_scenes(cli.min_scene_duration));

    let executor = ThreadedBatchExecutor::new(cli.jobs);
    let results = executor.execute(cli.inputs.clone(), |input| {
        resolve_video(
            &input,
            &cli.output_dir,
            config,
            timeline.clone(),
            selection.clone(),
        )
        .map_err(|e| -> SendError { format!("{}: {e}", input.display()).into() })
    });

    let mut failures = 0;
    for result in results {
        match result {
            Ok(report) => log::info!(
                "{} frames, {} identities, {} labels written",
                report.frames,
                report.identities.len(),
                report.labels_written
            ),
            Err(e) => {
                log::error!("{e}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} of {} inputs failed", cli.inputs.len()).into());
    }
    Ok(())
}

fn resolve_video(
    input: &Path,
    output_dir: &Path,
    config: EngineConfig,
    timeline: Option<SceneTimeline>,
    selection: LabelSelection,
) -> Result<ResolutionReport, Box<dyn std::error::Error>> {
    let stem = output_stem(input)?;

    let reader = JsonlObservationReader::open(input)?;
    let source: Box<dyn ObservationSource> = match timeline {
        Some(timeline) => Box::new(SceneBoundarySource::new(Box::new(reader), timeline)),
        None => Box::new(reader),
    };
    let labels_path = output_dir.join(format!("{stem}.{LABELS_FILE_SUFFIX}"));
    let sink = JsonlLabelWriter::create(&labels_path)?;

    let mut use_case = ResolveIdentitiesUseCase::new(
        source,
        Box::new(sink),
        IdentityLifecycleManager::new(config)?,
        Box::new(StdoutResolutionLogger::new(stem, PROGRESS_THROTTLE_FRAMES)),
        selection,
    );
    let report = use_case.execute()?;

    let report_path = output_dir.join(format!("{stem}.{REPORT_FILE_SUFFIX}"));
    report.write_json(&report_path)?;
    log::info!(
        "Labels written to {}, report to {}",
        labels_path.display(),
        report_path.display()
    );
    Ok(report)
}

fn load_timeline(cli: &Cli) -> Result<Option<SceneTimeline>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.scenes {
        return Ok(Some(SceneTimeline::load(path)?));
    }
    match (&cli.cuts, cli.fps, cli.total_frames) {
        (Some(path), Some(fps), Some(total_frames)) => {
            Ok(Some(SceneTimeline::load_cuts(path, total_frames, fps)?))
        }
        _ => Ok(None),
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                log::info!("Using configuration from {}", path.display());
                EngineConfig::load(&path)?
            }
            None => EngineConfig::default(),
        },
    };

    if let Some(accept) = cli.accept {
        config.fusion.accept_threshold = accept;
    }
    if let Some(reject) = cli.reject {
        config.fusion.reject_threshold = reject;
    }
    if let Some(capacity) = cli.exemplars {
        config.gallery.exemplar_capacity = capacity;
    }
    if let Some(scenes) = cli.staleness_scenes {
        config.gallery.staleness_budget_scenes = scenes;
    }
    config.validate()?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if cli.pids.is_some() && cli.exclude_pids.is_some() {
        return Err("--pids and --exclude-pids are mutually exclusive".into());
    }
    if (cli.scenes.is_some() || cli.cuts.is_some()) && cli.inputs.len() > 1 {
        return Err("--scenes and --cuts apply to a single input only".into());
    }
    let mut stems: HashMap<&str, &Path> = HashMap::new();
    for input in &cli.inputs {
        let stem = output_stem(input)?;
        if let Some(previous) = stems.insert(stem, input.as_path()) {
            return Err(format!(
                "Inputs {} and {} would both write {stem}.{LABELS_FILE_SUFFIX}",
                previous.display(),
                input.display()
            )
            .into());
        }
    }
    if !cli.min_scene_duration.is_finite() || cli.min_scene_duration < 0.0 {
        return Err(format!(
            "Minimum scene duration must be a non-negative number, got {}",
            cli.min_scene_duration
        )
        .into());
    }
    if cli.jobs == 0 {
        return Err("--jobs must be at least 1".into());
    }
    Ok(())
}

/// File stem the output names of an input are derived from.
fn output_stem(input: &Path) -> Result<&str, Box<dyn std::error::Error>> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("Invalid input file name: {}", input.display()).into())
}

fn to_pid_set(ids: Option<Vec<u32>>) -> Option<HashSet<Pid>> {
    ids.map(|v| v.into_iter().map(Pid).collect())
}
