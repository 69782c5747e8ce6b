//! USD text layers: combined reference layers and per-object host exports.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::model::{ExportRecord, FrameRange, NodePath, slash_path};
use crate::infra::host::{SceneHost, ShadingMode, UsdExportRequest};

/// What a combined layer groups. Only recorded in logs; the layer text is the same for all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineKind {
    Geo,
    Light,
    Camera,
    Scene,
}

impl CombineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombineKind::Geo => "geo",
            CombineKind::Light => "light",
            CombineKind::Camera => "cam",
            CombineKind::Scene => "scene",
        }
    }
}

impl fmt::Display for CombineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render a layer that references every record as a `component` child of an `Xform` root.
///
/// With `use_absolute_prim_path` the record path is used as given and the reference targets the
/// prim named after the record; otherwise only the file name is referenced.
pub fn render_combine(
    records: &[ExportRecord],
    root_name: &str,
    use_absolute_prim_path: bool,
) -> String {
    let mut lines = vec![
        "#usda 1.0".to_string(),
        format!("def Xform \"{root_name}\" {{"),
    ];

    for record in records {
        let name = &record.name;
        lines.push(format!("    def \"{name}\""));
        lines.push("    (".to_string());
        lines.push("        kind = \"component\"".to_string());
        lines.push("        prepend references = [".to_string());
        if use_absolute_prim_path {
            lines.push(format!(
                "            @./{}@</{name}>",
                record.display_path()
            ));
        } else {
            lines.push(format!("            @./{}@", file_name(&record.path)));
        }
        lines.push("        ]".to_string());
        lines.push("    ) {}".to_string());
    }

    lines.push("}".to_string());
    lines.join("\n")
}

/// Render and write a combined layer to `output_dir/filename`, overwriting any existing file.
pub fn write_combine(
    records: &[ExportRecord],
    output_dir: &Path,
    filename: &str,
    root_name: &str,
    kind: CombineKind,
    use_absolute_prim_path: bool,
) -> Result<PathBuf> {
    let rendered = render_combine(records, root_name, use_absolute_prim_path);
    let path = output_dir.join(filename);
    fs::write(&path, rendered)
        .with_context(|| format!("failed to write combined USD to {}", path.display()))?;
    tracing::info!(path = %path.display(), kind = %kind, prims = records.len(), "combined USD written");
    Ok(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| slash_path(path))
}

/// What a per-object export carries, for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Geometry,
    Light,
    Camera,
}

/// Exports one node at a time through the host's USD exporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsdExporter;

impl UsdExporter {
    pub fn new() -> Self {
        Self
    }

    /// Select `node` alone and export it to `output_dir/<short name>.usda` with shading disabled.
    ///
    /// This replaces the host selection; callers restore it when they need to.
    pub fn export(
        &self,
        host: &mut dyn SceneHost,
        node: &NodePath,
        kind: ObjectKind,
        output_dir: &Path,
        frame_range: FrameRange,
    ) -> Result<ExportRecord> {
        let name = node.short_name();
        let file = output_dir.join(format!("{name}.usda"));

        host.select_exclusive(node)
            .with_context(|| format!("failed to select {node} for export"))?;
        let request = UsdExportRequest {
            file: file.clone(),
            shading_mode: ShadingMode::None,
            frame_range,
        };
        host.export_usd(&request)
            .with_context(|| format!("host USD export failed for {node}"))?;

        match kind {
            ObjectKind::Geometry => tracing::debug!(path = %file.display(), "geometry exported"),
            ObjectKind::Light => tracing::info!(path = %file.display(), "light exported"),
            ObjectKind::Camera => tracing::info!(path = %file.display(), "camera exported"),
        }

        Ok(ExportRecord::new(name, file))
    }
}
