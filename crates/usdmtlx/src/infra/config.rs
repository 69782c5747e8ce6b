//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".usdmtlx/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub usd: UsdSettings,
    #[serde(default)]
    pub materialx: MaterialXSettings,
}

/// Settings for the USD export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UsdSettings {
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    frame_mode: Option<String>,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    loader_script: Option<bool>,
    #[serde(default)]
    loader_script_name: Option<String>,
    #[serde(default)]
    stage_path: Option<String>,
    #[serde(default)]
    failure_policy: Option<String>,
}

impl UsdSettings {
    fn default_frame_mode() -> &'static str {
        "time-slider"
    }

    fn default_loader_script_name() -> &'static str {
        "houdini_loader.py"
    }

    fn default_stage_path() -> &'static str {
        "/stage"
    }

    fn default_failure_policy() -> &'static str {
        "continue"
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn frame_mode(&self) -> &str {
        self.frame_mode
            .as_deref()
            .unwrap_or_else(|| Self::default_frame_mode())
    }

    /// Manual start/end frames, when both are configured.
    pub fn manual_range(&self) -> Option<(f64, f64)> {
        self.start.zip(self.end)
    }

    pub fn loader_script(&self) -> bool {
        self.loader_script.unwrap_or(false)
    }

    pub fn loader_script_name(&self) -> &str {
        self.loader_script_name
            .as_deref()
            .unwrap_or_else(|| Self::default_loader_script_name())
    }

    pub fn stage_path(&self) -> &str {
        self.stage_path
            .as_deref()
            .unwrap_or_else(|| Self::default_stage_path())
    }

    pub fn failure_policy(&self) -> &str {
        self.failure_policy
            .as_deref()
            .unwrap_or_else(|| Self::default_failure_policy())
    }
}

/// Settings for MaterialX generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MaterialXSettings {
    #[serde(default)]
    output_dir: Option<PathBuf>,
    /// Used when no output directory is given and no texture path hints at one.
    #[serde(default)]
    fallback_dir: Option<PathBuf>,
}

impl MaterialXSettings {
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn fallback_dir(&self) -> Option<&Path> {
        self.fallback_dir.as_deref()
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    output_dir: Option<String>,
    fallback_dir: Option<String>,
    frame_mode: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            output_dir: env::var("USDMTLX_OUTPUT_DIR").ok(),
            fallback_dir: env::var("USDMTLX_FALLBACK_DIR").ok(),
            frame_mode: env::var("USDMTLX_FRAME_MODE").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(output_dir: &str, fallback_dir: &str, frame_mode: &str) -> Self {
        Self {
            output_dir: Some(output_dir.to_owned()),
            fallback_dir: Some(fallback_dir.to_owned()),
            frame_mode: Some(frame_mode.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    /// Load with an explicit config file layered over the defaults instead of user/workspace files.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with_layers(None, Some(path.to_path_buf()), EnvOverrides::from_env())
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            usd: merge_usd(self.usd, other.usd),
            materialx: merge_materialx(self.materialx, other.materialx),
        }
    }

    pub fn set_usd_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.usd.output_dir = Some(dir.into());
    }

    pub fn set_materialx_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.materialx.output_dir = Some(dir.into());
    }

    pub fn set_fallback_dir(&mut self, dir: impl Into<PathBuf>) {
        self.materialx.fallback_dir = Some(dir.into());
    }
}

fn merge_usd(base: UsdSettings, overlay: UsdSettings) -> UsdSettings {
    UsdSettings {
        output_dir: overlay.output_dir.or(base.output_dir),
        frame_mode: overlay.frame_mode.or(base.frame_mode),
        start: overlay.start.or(base.start),
        end: overlay.end.or(base.end),
        loader_script: overlay.loader_script.or(base.loader_script),
        loader_script_name: overlay.loader_script_name.or(base.loader_script_name),
        stage_path: overlay.stage_path.or(base.stage_path),
        failure_policy: overlay.failure_policy.or(base.failure_policy),
    }
}

fn merge_materialx(base: MaterialXSettings, overlay: MaterialXSettings) -> MaterialXSettings {
    MaterialXSettings {
        output_dir: overlay.output_dir.or(base.output_dir),
        fallback_dir: overlay.fallback_dir.or(base.fallback_dir),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("usdmtlx/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(dir) = env.output_dir {
        config.usd.output_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = env.fallback_dir {
        config.materialx.fallback_dir = Some(PathBuf::from(dir));
    }
    if let Some(mode) = env.frame_mode {
        config.usd.frame_mode = Some(mode);
    }
    config
}
