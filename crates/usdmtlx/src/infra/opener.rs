//! Opening output folders in the platform file browser.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

/// Open each existing directory with the first browser command that can be spawned.
///
/// Missing directories are skipped. Returns the directories that were handed to a browser.
pub fn open_folders(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if dirs.is_empty() {
        tracing::warn!("no output folders to open");
        return Ok(Vec::new());
    }

    let mut opened = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            tracing::warn!(path = %dir.display(), "output folder does not exist");
            continue;
        }
        open_folder(dir)?;
        opened.push(dir.clone());
    }
    Ok(opened)
}

fn open_folder(dir: &Path) -> Result<()> {
    for command in browser_commands() {
        if try_spawn(command, dir).is_ok() {
            return Ok(());
        }
    }

    Err(anyhow!(
        "failed to open {} with available file browsers",
        dir.display()
    ))
}

fn try_spawn(command: &[&str], dir: &Path) -> Result<()> {
    let (program, args) = command
        .split_first()
        .context("browser command missing program")?;

    Command::new(program)
        .args(args)
        .arg(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn file browser: {program}"))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn browser_commands() -> Vec<&'static [&'static str]> {
    vec![&["open"]]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn browser_commands() -> Vec<&'static [&'static str]> {
    vec![&["xdg-open"], &["gio", "open"]]
}

#[cfg(target_os = "windows")]
fn browser_commands() -> Vec<&'static [&'static str]> {
    vec![&["explorer"]]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn browser_commands() -> Vec<&'static [&'static str]> {
    Vec::new()
}
