//! The USD export run: per-group geometry layers, lights, cameras, and the layers tying them
//! together.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use crate::app::classify::SceneClassifier;
use crate::app::loader::LoaderScript;
use crate::app::usd::{CombineKind, ObjectKind, UsdExporter, write_combine};
use crate::domain::errors::DomainError;
use crate::domain::model::{ExportFailure, ExportRecord, FrameRange, NodePath, slash_path};
use crate::infra::config::Config;
use crate::infra::host::{SceneHost, node_types};

const LIGHTS_DIR: &str = "Lights";
const CAMERAS_DIR: &str = "Cameras";
const LIGHT_COMBINE: &str = "combine_light.usda";
const CAMERA_COMBINE: &str = "combine_cam.usda";
const GEO_COMBINE: &str = "geo_combine.usda";
const COMBINED_ROOT: &str = "Root";

/// What happens when one item of a run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure and keep exporting the remaining items.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" | "report" => Ok(FailurePolicy::Continue),
            "abort" | "fail-fast" => Ok(FailurePolicy::Abort),
            other => Err(DomainError::UnknownFailurePolicy(other.to_string())),
        }
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub frame_range: FrameRange,
    pub loader_script: bool,
    pub loader_script_name: String,
    pub stage_path: String,
    pub failure_policy: FailurePolicy,
}

impl RunOptions {
    /// Build options from configuration; the output directory must be configured.
    pub fn from_config(config: &Config, frame_range: FrameRange) -> Result<Self> {
        let output_dir = config
            .usd
            .output_dir()
            .ok_or(DomainError::NoOutputDir)?
            .to_path_buf();
        let failure_policy = config.usd.failure_policy().parse::<FailurePolicy>()?;
        Ok(Self {
            output_dir,
            frame_range,
            loader_script: config.usd.loader_script(),
            loader_script_name: config.usd.loader_script_name().to_string(),
            stage_path: config.usd.stage_path().to_string(),
            failure_policy,
        })
    }
}

/// Layers written for one selected group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupExport {
    pub name: String,
    pub records: Vec<ExportRecord>,
    pub combine: PathBuf,
}

/// Everything a run wrote, skipped, or failed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub groups: Vec<GroupExport>,
    pub lights: Vec<ExportRecord>,
    pub cameras: Vec<ExportRecord>,
    pub combined: Vec<PathBuf>,
    pub loader_script: Option<PathBuf>,
    pub skipped_groups: Vec<String>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let meshes: usize = self.groups.iter().map(|group| group.records.len()).sum();
        format!(
            "{} group(s) with {} mesh(es), {} light(s), {} camera(s), {} combined layer(s), {} skipped, {} failure(s)",
            self.groups.len(),
            meshes,
            self.lights.len(),
            self.cameras.len(),
            self.combined.len() + self.groups.len(),
            self.skipped_groups.len(),
            self.failures.len()
        )
    }
}

/// Drives a full USD export against a [`SceneHost`].
pub struct UsdExportRun {
    classifier: SceneClassifier,
    exporter: UsdExporter,
    loader: LoaderScript,
}

impl UsdExportRun {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: SceneClassifier::new(),
            exporter: UsdExporter::new(),
            loader: LoaderScript::new()?,
        })
    }

    /// Export the selected transforms.
    ///
    /// Each selected transform is treated as a group of meshes; the same selection is then
    /// classified for lights and cameras. The host selection is restored afterwards.
    pub fn run(&self, host: &mut dyn SceneHost, options: &RunOptions) -> Result<ExportReport> {
        let mut report = ExportReport::default();
        let selection = host.selection_of_type(node_types::TRANSFORM);
        if selection.is_empty() {
            tracing::warn!("no groups selected");
            return Ok(report);
        }

        fs::create_dir_all(&options.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                options.output_dir.display()
            )
        })?;

        let original = host.selection();
        let result = self.export_all(host, &selection, options, &mut report);
        restore_selection(host, &original);
        result?;

        tracing::info!(summary = %report.summary(), "USD export finished");
        Ok(report)
    }

    fn export_all(
        &self,
        host: &mut dyn SceneHost,
        selection: &[NodePath],
        options: &RunOptions,
        report: &mut ExportReport,
    ) -> Result<()> {
        let mut geo_layers = Vec::new();
        for group in selection {
            if let Some(layer) = self.export_group(host, group, options, report)? {
                geo_layers.push(layer);
            }
        }

        let classified = self.classifier.classify(host, selection);
        report.lights = self.export_category(
            host,
            &classified.lights,
            Category::LIGHTS,
            options,
            report,
        )?;
        report.cameras = self.export_category(
            host,
            &classified.cameras,
            Category::CAMERAS,
            options,
            report,
        )?;

        if geo_layers.is_empty() {
            return Ok(());
        }

        let written = write_combine(
            &geo_layers,
            &options.output_dir,
            GEO_COMBINE,
            COMBINED_ROOT,
            CombineKind::Scene,
            true,
        );
        if let Some(path) = settle(options.failure_policy, report, GEO_COMBINE, written)? {
            report.combined.push(path);
        }

        if options.loader_script {
            let written = self.loader.write(
                &geo_layers,
                &options.output_dir,
                &options.loader_script_name,
                &options.stage_path,
            );
            report.loader_script =
                settle(options.failure_policy, report, &options.loader_script_name, written)?;
        }
        Ok(())
    }

    /// Export the meshes under `group` into `<output>/<group>/` and write the group layer.
    /// Returns the group layer relative to the output directory.
    fn export_group(
        &self,
        host: &mut dyn SceneHost,
        group: &NodePath,
        options: &RunOptions,
        report: &mut ExportReport,
    ) -> Result<Option<ExportRecord>> {
        let group_name = group.short_name().to_string();
        let meshes = mesh_transforms(host, group);
        if meshes.is_empty() {
            tracing::warn!(group = %group_name, "no meshes found, skipping");
            report.skipped_groups.push(group_name);
            return Ok(None);
        }

        let group_dir = options.output_dir.join(&group_name);
        let created = fs::create_dir_all(&group_dir)
            .with_context(|| format!("failed to create group directory {}", group_dir.display()));
        if settle(options.failure_policy, report, &group_name, created)?.is_none() {
            return Ok(None);
        }

        let mut records = Vec::with_capacity(meshes.len());
        for mesh in &meshes {
            let exported = self.exporter.export(
                host,
                mesh,
                ObjectKind::Geometry,
                &group_dir,
                options.frame_range,
            );
            if let Some(record) = settle(options.failure_policy, report, mesh.as_str(), exported)? {
                records.push(record);
            }
        }
        if records.is_empty() {
            return Ok(None);
        }

        let combine_name = format!("{group_name}_combine.usda");
        let written = write_combine(
            &records,
            &group_dir,
            &combine_name,
            &group_name,
            CombineKind::Geo,
            false,
        );
        let Some(combine) = settle(options.failure_policy, report, &combine_name, written)? else {
            return Ok(None);
        };

        let layer = ExportRecord::new(&group_name, format!("{group_name}/{combine_name}"));
        report.groups.push(GroupExport {
            name: group_name,
            records,
            combine,
        });
        Ok(Some(layer))
    }

    /// Export lights or cameras into their folder and reference them from one layer at the
    /// output root.
    fn export_category(
        &self,
        host: &mut dyn SceneHost,
        nodes: &[NodePath],
        category: Category,
        options: &RunOptions,
        report: &mut ExportReport,
    ) -> Result<Vec<ExportRecord>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let folder = options.output_dir.join(category.folder);
        let created = fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()));
        if settle(options.failure_policy, report, category.folder, created)?.is_none() {
            return Ok(Vec::new());
        }

        let mut exported = Vec::with_capacity(nodes.len());
        for node in nodes {
            let result = self.exporter.export(
                host,
                node,
                category.kind,
                &folder,
                options.frame_range,
            );
            if let Some(record) = settle(options.failure_policy, report, node.as_str(), result)? {
                exported.push(record);
            }
        }
        if exported.is_empty() {
            return Ok(exported);
        }

        let relative: Vec<ExportRecord> = exported
            .iter()
            .map(|record| relative_record(record, &options.output_dir))
            .collect();
        let written = write_combine(
            &relative,
            &options.output_dir,
            category.combine,
            COMBINED_ROOT,
            category.combine_kind,
            true,
        );
        if let Some(path) = settle(options.failure_policy, report, category.combine, written)? {
            report.combined.push(path);
        }
        Ok(exported)
    }
}

#[derive(Debug, Clone, Copy)]
struct Category {
    folder: &'static str,
    combine: &'static str,
    kind: ObjectKind,
    combine_kind: CombineKind,
}

impl Category {
    const LIGHTS: Category = Category {
        folder: LIGHTS_DIR,
        combine: LIGHT_COMBINE,
        kind: ObjectKind::Light,
        combine_kind: CombineKind::Light,
    };

    const CAMERAS: Category = Category {
        folder: CAMERAS_DIR,
        combine: CAMERA_COMBINE,
        kind: ObjectKind::Camera,
        combine_kind: CombineKind::Camera,
    };
}

/// Parents of every mesh below `group`, first-seen order, no duplicates.
fn mesh_transforms(host: &dyn SceneHost, group: &NodePath) -> Vec<NodePath> {
    let mut transforms: Vec<NodePath> = Vec::new();
    for node in host.descendants(group) {
        if host.node_type(&node).as_deref() != Some(node_types::MESH) {
            continue;
        }
        if let Some(parent) = host.parent(&node)
            && !transforms.contains(&parent)
        {
            transforms.push(parent);
        }
    }
    transforms
}

/// Reselect the nodes of `original` that the host still knows.
fn restore_selection(host: &mut dyn SceneHost, original: &[NodePath]) {
    let known: Vec<NodePath> = original
        .iter()
        .filter(|node| host.node_type(node).is_some())
        .cloned()
        .collect();
    if known.len() < original.len() {
        tracing::warn!(
            missing = original.len() - known.len(),
            "selected nodes no longer exist, restoring the rest"
        );
    }
    if let Err(err) = host.select(&known) {
        tracing::warn!(error = %err, "failed to restore selection");
    }
}

fn relative_record(record: &ExportRecord, root: &Path) -> ExportRecord {
    let relative = record.path.strip_prefix(root).unwrap_or(&record.path);
    ExportRecord::new(&record.name, slash_path(relative))
}

/// Apply the failure policy to one item's result.
fn settle<T>(
    policy: FailurePolicy,
    report: &mut ExportReport,
    subject: &str,
    result: Result<T>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => match policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::Continue => {
                let failure = ExportFailure::new(subject, &err);
                tracing::error!(subject = %subject, error = %failure.message, "export failed");
                report.failures.push(failure);
                Ok(None)
            }
        },
    }
}
