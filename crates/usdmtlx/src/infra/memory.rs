//! Scene host backed by an in-memory snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::domain::model::NodePath;
use crate::infra::host::{AttrValue, HostError, SceneHost, UsdExportRequest, node_types};

/// Serializable description of a host scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default = "SceneSnapshot::default_frame")]
    pub current_frame: f64,
    #[serde(default = "SceneSnapshot::default_range")]
    pub playback_range: (f64, f64),
    #[serde(default = "SceneSnapshot::default_range")]
    pub render_range: (f64, f64),
    #[serde(default)]
    pub selection: Vec<NodePath>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl SceneSnapshot {
    fn default_frame() -> f64 {
        1.0
    }

    fn default_range() -> (f64, f64) {
        (1.0, 120.0)
    }

    /// Load a snapshot from JSON or YAML, picked by file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene snapshot: {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => serde_json::from_str(&data)
                .with_context(|| format!("invalid JSON scene snapshot in {}", path.display())),
            Some("yaml" | "yml") => serde_yaml::from_str(&data)
                .with_context(|| format!("invalid YAML scene snapshot in {}", path.display())),
            _ => bail!(
                "unsupported scene snapshot extension for {} (expected .json, .yaml or .yml)",
                path.display()
            ),
        }
    }
}

/// A node and its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: NodePath,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub material: bool,
}

/// A directed attribute connection, `node.attr -> node.attr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub destination: String,
}

/// [`SceneHost`] answering queries from a [`SceneSnapshot`].
///
/// Exports write a minimal layer that defines one prim per selected node and are recorded for
/// inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    snapshot: SceneSnapshot,
    index: HashMap<NodePath, usize>,
    selection: Vec<NodePath>,
    exports: Vec<UsdExportRequest>,
    failing: HashSet<NodePath>,
}

impl InMemoryHost {
    pub fn new(snapshot: SceneSnapshot) -> Self {
        let index = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.path.clone(), idx))
            .collect();
        let selection = snapshot.selection.clone();
        Self {
            snapshot,
            index,
            selection,
            exports: Vec::new(),
            failing: HashSet::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(SceneSnapshot::from_path(path)?))
    }

    /// Export requests received so far, in call order.
    pub fn exports(&self) -> &[UsdExportRequest] {
        &self.exports
    }

    /// Make every export of `node` fail.
    pub fn fail_exports_for(&mut self, node: impl Into<NodePath>) {
        self.failing.insert(node.into());
    }

    fn record(&self, node: &NodePath) -> Option<&NodeRecord> {
        self.index.get(node).map(|idx| &self.snapshot.nodes[*idx])
    }

    fn children(&self, node: &NodePath) -> impl Iterator<Item = &NodeRecord> {
        self.snapshot
            .nodes
            .iter()
            .filter(move |record| record.path.parent().as_ref() == Some(node))
    }

    fn collect_descendants(&self, node: &NodePath, out: &mut Vec<NodePath>) {
        for child in self.children(node) {
            out.push(child.path.clone());
            self.collect_descendants(&child.path, out);
        }
    }
}

fn plug_node(plug: &str) -> &str {
    plug.split_once('.').map(|(node, _)| node).unwrap_or(plug)
}

impl SceneHost for InMemoryHost {
    fn selection(&self) -> Vec<NodePath> {
        self.selection.clone()
    }

    fn node_type(&self, node: &NodePath) -> Option<String> {
        self.record(node).map(|record| record.node_type.clone())
    }

    fn shapes(&self, node: &NodePath) -> Vec<NodePath> {
        self.children(node)
            .filter(|record| record.node_type != node_types::TRANSFORM)
            .map(|record| record.path.clone())
            .collect()
    }

    fn descendants(&self, node: &NodePath) -> Vec<NodePath> {
        let mut out = Vec::new();
        self.collect_descendants(node, &mut out);
        out
    }

    fn parent(&self, node: &NodePath) -> Option<NodePath> {
        node.parent().filter(|parent| self.index.contains_key(parent))
    }

    fn connections(&self, plug: &str, node_type: Option<&str>) -> Vec<NodePath> {
        let by_attribute = plug.contains('.');
        let matches = |end: &str| {
            if by_attribute {
                end == plug
            } else {
                plug_node(end) == plug
            }
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for connection in &self.snapshot.connections {
            let other = if matches(&connection.destination) {
                plug_node(&connection.source)
            } else if matches(&connection.source) {
                plug_node(&connection.destination)
            } else {
                continue;
            };
            let other = NodePath::new(other);
            if let Some(wanted) = node_type
                && self.node_type(&other).as_deref() != Some(wanted)
            {
                continue;
            }
            if seen.insert(other.clone()) {
                out.push(other);
            }
        }
        out
    }

    fn is_material(&self, node: &NodePath) -> bool {
        self.record(node).is_some_and(|record| record.material)
    }

    fn attribute(&self, plug: &str) -> Option<AttrValue> {
        self.snapshot.attributes.get(plug).cloned()
    }

    fn select(&mut self, nodes: &[NodePath]) -> Result<(), HostError> {
        if let Some(missing) = nodes.iter().find(|node| !self.index.contains_key(*node)) {
            return Err(HostError::UnknownNode(missing.clone()));
        }
        self.selection = nodes.to_vec();
        Ok(())
    }

    fn export_usd(&mut self, request: &UsdExportRequest) -> Result<(), HostError> {
        if let Some(node) = self.selection.iter().find(|node| self.failing.contains(*node)) {
            return Err(HostError::ExportFailed {
                path: request.file.clone(),
                reason: format!("host refused to export {node}"),
            });
        }

        let mut layer = String::from("#usda 1.0\n(\n");
        let _ = writeln!(layer, "    startTimeCode = {}", request.frame_range.start());
        let _ = writeln!(layer, "    endTimeCode = {}", request.frame_range.end());
        layer.push_str(")\n");
        for node in &self.selection {
            let prim_type = match self.node_type(node).as_deref() {
                Some(node_types::TRANSFORM) => "Xform",
                _ => "Scope",
            };
            let _ = write!(layer, "\ndef {prim_type} \"{}\"\n{{\n}}\n", node.short_name());
        }

        fs::write(&request.file, layer).map_err(|err| HostError::ExportFailed {
            path: request.file.clone(),
            reason: err.to_string(),
        })?;
        self.exports.push(request.clone());
        Ok(())
    }

    fn current_frame(&self) -> f64 {
        self.snapshot.current_frame
    }

    fn playback_range(&self) -> (f64, f64) {
        self.snapshot.playback_range
    }

    fn render_range(&self) -> (f64, f64) {
        self.snapshot.render_range
    }
}
