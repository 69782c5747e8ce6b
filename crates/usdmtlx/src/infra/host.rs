//! Boundary to the 3D host application.
//!
//! Every scene query and host command the exporters need goes through [`SceneHost`]. The real
//! host binding implements it inside the application; [`crate::infra::memory::InMemoryHost`]
//! implements it from a scene snapshot for tests and the command line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::model::{FrameRange, NodePath};

/// Host node type names the exporters rely on.
pub mod node_types {
    pub const TRANSFORM: &str = "transform";
    pub const MESH: &str = "mesh";
    pub const CAMERA: &str = "camera";
    pub const SHADING_ENGINE: &str = "shadingEngine";
    pub const FILE: &str = "file";
    pub const NORMAL_MAP: &str = "aiNormalMap";
    pub const BUMP: &str = "bump2d";
}

/// Attribute holding a file node's texture path.
pub const FILE_TEXTURE_ATTR: &str = "fileTextureName";

/// Errors raised at the host boundary.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown node '{0}'")]
    UnknownNode(NodePath),
    #[error("USD export to {path} failed: {reason}")]
    ExportFailed { path: PathBuf, reason: String },
}

/// Value returned by an attribute query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Float(f64),
    Tuple(Vec<f64>),
    Text(String),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// How the host exporter treats shading networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShadingMode {
    None,
}

impl ShadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadingMode::None => "none",
        }
    }
}

/// Arguments for one host USD export of the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsdExportRequest {
    pub file: PathBuf,
    pub shading_mode: ShadingMode,
    pub frame_range: FrameRange,
}

/// Queries and commands provided by the host application.
///
/// Queries never mutate host state. Selection changes and exports take `&mut self` since the host
/// exports whatever is currently selected.
pub trait SceneHost {
    /// Current selection as long paths, in selection order.
    fn selection(&self) -> Vec<NodePath>;

    /// Current selection filtered to nodes of `node_type`.
    fn selection_of_type(&self, node_type: &str) -> Vec<NodePath> {
        self.selection()
            .into_iter()
            .filter(|node| self.node_type(node).as_deref() == Some(node_type))
            .collect()
    }

    /// Type name of a node, `None` when the node does not exist.
    fn node_type(&self, node: &NodePath) -> Option<String>;

    /// Direct shape children, path-qualified.
    fn shapes(&self, node: &NodePath) -> Vec<NodePath>;

    /// All descendants, depth-first, as long paths.
    fn descendants(&self, node: &NodePath) -> Vec<NodePath>;

    /// Parent transform.
    fn parent(&self, node: &NodePath) -> Option<NodePath>;

    /// Nodes connected to `plug` (a node or `node.attribute`), optionally of one type.
    fn connections(&self, plug: &str, node_type: Option<&str>) -> Vec<NodePath>;

    /// Whether the node is a material (surface shader) node.
    fn is_material(&self, node: &NodePath) -> bool;

    /// Value of `node.attribute`.
    fn attribute(&self, plug: &str) -> Option<AttrValue>;

    /// Replace the selection with `nodes`.
    fn select(&mut self, nodes: &[NodePath]) -> Result<(), HostError>;

    /// Replace the selection with a single node.
    fn select_exclusive(&mut self, node: &NodePath) -> Result<(), HostError> {
        self.select(std::slice::from_ref(node))
    }

    /// Export the current selection to a USD layer.
    fn export_usd(&mut self, request: &UsdExportRequest) -> Result<(), HostError>;

    fn current_frame(&self) -> f64;

    /// Time slider playback bounds.
    fn playback_range(&self) -> (f64, f64);

    /// Render settings start/end frames.
    fn render_range(&self) -> (f64, f64);
}
