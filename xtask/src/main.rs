use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Export the bundled demo scene into the target directory
    Demo {
        /// Also write the loader script
        #[arg(long)]
        loader_script: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::Demo { loader_script } => run_demo(loader_script)?,
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run").arg("--workspace");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("cargo nextest run failed");
    }
    Ok(())
}

fn run_demo(loader_script: bool) -> Result<()> {
    let metadata = MetadataCommand::new()
        .no_deps()
        .exec()
        .context("failed to read cargo metadata")?;
    let package = metadata
        .packages
        .iter()
        .find(|package| package.name == "usdmtlx")
        .context("usdmtlx package not found in workspace")?;
    let crate_dir = package
        .manifest_path
        .parent()
        .context("manifest has no parent directory")?;
    let scene = crate_dir.join("assets").join("demo-scene.json");
    let demo_dir: PathBuf = metadata.target_directory.join("demo").into();
    let output = demo_dir.join("usd");

    if demo_dir.exists() {
        fs::remove_dir_all(&demo_dir)
            .with_context(|| format!("failed to clear {}", demo_dir.display()))?;
    }
    fs::create_dir_all(&demo_dir)?;
    let config = write_demo_config(&demo_dir, &output, loader_script)?;

    let result = Command::new("cargo")
        .args(["run", "--quiet", "--package", "usdmtlx", "--"])
        .arg("--config")
        .arg(&config)
        .args(["usd", "--json", "--scene"])
        .arg(scene.as_std_path())
        .output()
        .context("failed to launch usdmtlx")?;
    if !result.status.success() {
        anyhow::bail!(
            "demo export failed:\n{}",
            String::from_utf8_lossy(&result.stderr)
        );
    }

    let report: serde_json::Value =
        serde_json::from_slice(&result.stdout).context("demo export printed invalid JSON")?;
    let groups = report["groups"].as_array().map_or(0, Vec::len);
    let skipped = report["skipped_groups"].as_array().map_or(0, Vec::len);
    println!("exported {groups} group(s), skipped {skipped}");

    for entry in WalkDir::new(&output).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            println!("  {}", relative(entry.path(), &output).display());
        }
    }
    Ok(())
}

fn write_demo_config(dir: &Path, output: &Path, loader_script: bool) -> Result<PathBuf> {
    let mut usd = toml::map::Map::new();
    usd.insert(
        "output_dir".into(),
        toml::Value::String(output.display().to_string()),
    );
    usd.insert("loader_script".into(), toml::Value::Boolean(loader_script));
    let mut root = toml::map::Map::new();
    root.insert("usd".into(), toml::Value::Table(usd));

    let path = dir.join("config.toml");
    fs::write(&path, toml::to_string(&toml::Value::Table(root))?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
