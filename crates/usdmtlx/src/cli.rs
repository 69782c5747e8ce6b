//! Command-line surface over the exporters, driven by a scene snapshot.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::classify::SceneClassifier;
use crate::app::frame_range::{FrameRangeMode, FrameRangeSelector};
use crate::app::materialx::{MaterialXExporter, MaterialXWriter};
use crate::app::pipeline::{FailurePolicy, RunOptions, UsdExportRun};
use crate::domain::model::FrameRange;
use crate::infra::config::Config;
use crate::infra::host::{SceneHost, node_types};
use crate::infra::memory::InMemoryHost;
use crate::infra::opener;

#[derive(Debug, Parser)]
#[command(
    name = "usdmtlx",
    author,
    version,
    about = "Export scene selections to USD layers and MaterialX documents",
    long_about = None
)]
pub struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Decrease log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,
    /// Config file layered over the built-in defaults instead of user/workspace files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `-v` count minus `-q` count.
    pub fn verbosity(&self) -> i8 {
        let verbose = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let quiet = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        verbose.saturating_sub(quiet)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export selected groups, lights, and cameras to USD layers
    Usd(UsdArgs),
    /// Write MaterialX documents for the selected objects' materials
    Mtlx(MtlxArgs),
    /// Show how the selection is classified
    Classify {
        /// Scene snapshot (.json, .yaml)
        #[arg(long)]
        scene: PathBuf,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct UsdArgs {
    /// Scene snapshot (.json, .yaml)
    #[arg(long)]
    pub scene: PathBuf,
    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Frame range source
    #[arg(long, value_enum)]
    pub frame_mode: Option<FrameRangeMode>,
    /// Manual start frame (implies --frame-mode manual)
    #[arg(long, allow_negative_numbers = true)]
    pub start: Option<f64>,
    /// Manual end frame (implies --frame-mode manual)
    #[arg(long, allow_negative_numbers = true)]
    pub end: Option<f64>,
    /// Also write the downstream loader script
    #[arg(long)]
    pub loader_script: bool,
    /// Stage path used by the loader script
    #[arg(long)]
    pub stage_path: Option<String>,
    /// Stop at the first failed item
    #[arg(long)]
    pub fail_fast: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MtlxArgs {
    /// Scene snapshot (.json, .yaml)
    #[arg(long)]
    pub scene: PathBuf,
    /// Output directory; defaults to the first texture's folder
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Folder used when neither an output directory nor a texture path is available
    #[arg(long)]
    pub fallback_dir: Option<PathBuf>,
    /// Open the folders that received documents
    #[arg(long)]
    pub open: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Usd(args) => run_usd(config, args),
        Commands::Mtlx(args) => run_mtlx(config, args),
        Commands::Classify { scene } => run_classify(&scene),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "usdmtlx", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_usd(mut config: Config, args: UsdArgs) -> Result<ExitCode> {
    let mut host = load_host(&args.scene)?;
    if let Some(output) = &args.output {
        config.set_usd_output_dir(output);
    }

    let frame_range = resolve_frame_range(&host, &config, &args)?;
    let mut options = RunOptions::from_config(&config, frame_range)?;
    options.loader_script |= args.loader_script;
    if let Some(stage_path) = args.stage_path {
        options.stage_path = stage_path;
    }
    if args.fail_fast {
        options.failure_policy = FailurePolicy::Abort;
    }

    let report = UsdExportRun::new()?.run(&mut host, &options)?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        println!("{}", report.summary());
        for failure in &report.failures {
            println!("failed: {}: {}", failure.subject, failure.message);
        }
    }

    Ok(exit_code(report.has_failures()))
}

fn resolve_frame_range(host: &InMemoryHost, config: &Config, args: &UsdArgs) -> Result<FrameRange> {
    let manual = match (args.start, args.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => config.usd.manual_range(),
        _ => anyhow::bail!("--start and --end must be given together"),
    };
    let mode = match args.frame_mode {
        Some(mode) => mode,
        None if args.start.is_some() => FrameRangeMode::Manual,
        None => config.usd.frame_mode().parse()?,
    };
    if args.start.is_some() && mode != FrameRangeMode::Manual {
        anyhow::bail!("--start/--end only apply with --frame-mode manual, not {mode}");
    }

    let mut selector = FrameRangeSelector::new(host, mode);
    if mode == FrameRangeMode::Manual
        && let Some((start, end)) = manual
    {
        selector.set_manual(start, end)?;
    }
    let range = selector.resolve(host)?;
    let (start, end) = selector.display();
    tracing::debug!(mode = %mode, start = %start, end = %end, "frame range resolved");
    Ok(range)
}

fn run_mtlx(mut config: Config, args: MtlxArgs) -> Result<ExitCode> {
    let host = load_host(&args.scene)?;
    if let Some(output) = &args.output {
        config.set_materialx_output_dir(output);
    }
    if let Some(fallback) = &args.fallback_dir {
        config.set_fallback_dir(fallback);
    }

    let writer = MaterialXWriter::new(config.materialx.fallback_dir().map(Path::to_path_buf));
    let exporter = MaterialXExporter::new(writer);
    let report =
        exporter.export_selection(&host, &host.selection(), config.materialx.output_dir());

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        println!("{}", report.summary());
        for path in &report.written {
            println!("written: {}", path.display());
        }
        for object in &report.without_material {
            println!("no material: {object}");
        }
        for failure in &report.failures {
            println!("failed: {}: {}", failure.subject, failure.message);
        }
    }

    if args.open {
        opener::open_folders(&report.output_dirs())?;
    }

    Ok(exit_code(!report.failures.is_empty()))
}

fn run_classify(scene: &Path) -> Result<ExitCode> {
    let host = load_host(scene)?;
    let selection = host.selection_of_type(node_types::TRANSFORM);
    let classified = SceneClassifier::new().classify(&host, &selection);

    for (label, nodes) in [
        ("geometry", &classified.geometry),
        ("lights", &classified.lights),
        ("cameras", &classified.cameras),
    ] {
        let names: Vec<&str> = nodes.iter().map(|node| node.as_str()).collect();
        println!("{label}: {}", names.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn load_host(scene: &Path) -> Result<InMemoryHost> {
    InMemoryHost::from_path(scene)
        .with_context(|| format!("failed to load scene {}", scene.display()))
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
