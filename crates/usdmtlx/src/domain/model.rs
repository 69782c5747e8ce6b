//! Domain models for scene nodes, export records, and shader channels.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Host node identifier. DAG nodes use `|`-separated long paths, shading nodes bare names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path, which the host keeps unique among siblings.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('|').next().unwrap_or(&self.0)
    }

    /// Parent path, or `None` for root-level and non-DAG nodes.
    pub fn parent(&self) -> Option<NodePath> {
        let (parent, _) = self.0.rsplit_once('|')?;
        if parent.is_empty() {
            None
        } else {
            Some(NodePath::new(parent))
        }
    }

    /// Attribute plug on this node, e.g. `mat.baseColor`.
    pub fn plug(&self, attribute: &str) -> String {
        format!("{}.{}", self.0, attribute)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Selected transforms partitioned by the kind of shape they carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedSelection {
    pub geometry: Vec<NodePath>,
    pub lights: Vec<NodePath>,
    pub cameras: Vec<NodePath>,
}

impl ClassifiedSelection {
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty() && self.lights.is_empty() && self.cameras.is_empty()
    }

    pub fn len(&self) -> usize {
        self.geometry.len() + self.lights.len() + self.cameras.len()
    }
}

/// One exported layer: the prim name it is referenced under and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub name: String,
    pub path: PathBuf,
}

impl ExportRecord {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Path rendered with `/` separators regardless of platform.
    pub fn display_path(&self) -> String {
        slash_path(&self.path)
    }
}

/// An item that could not be exported, kept for the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    pub subject: String,
    pub message: String,
}

impl ExportFailure {
    pub fn new(subject: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            subject: subject.into(),
            message: format!("{error:#}"),
        }
    }
}

/// Join path components with forward slashes.
pub fn slash_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Inclusive frame interval handed to the host exporter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameRange {
    start: f64,
    end: f64,
}

impl FrameRange {
    /// Build a range, rejecting non-finite bounds and `start > end`.
    pub fn new(start: f64, end: f64) -> Result<Self, DomainError> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(DomainError::InvalidFrameRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Single-frame range.
    pub fn frame(frame: f64) -> Result<Self, DomainError> {
        Self::new(frame, frame)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }
}

/// The fixed set of standard_surface inputs that MaterialX export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderChannel {
    BaseColor,
    SpecularRoughness,
    Metalness,
    Transmission,
    Coat,
    NormalCamera,
}

impl ShaderChannel {
    /// Emission order in the nodegraph and the shader input list.
    pub const ALL: [ShaderChannel; 6] = [
        ShaderChannel::BaseColor,
        ShaderChannel::SpecularRoughness,
        ShaderChannel::Metalness,
        ShaderChannel::Transmission,
        ShaderChannel::Coat,
        ShaderChannel::NormalCamera,
    ];

    /// Attribute name on the host shader.
    pub fn attribute(&self) -> &'static str {
        match self {
            ShaderChannel::BaseColor => "baseColor",
            ShaderChannel::SpecularRoughness => "specularRoughness",
            ShaderChannel::Metalness => "metalness",
            ShaderChannel::Transmission => "transmission",
            ShaderChannel::Coat => "coat",
            ShaderChannel::NormalCamera => "normalCamera",
        }
    }

    /// Node name prefix inside the nodegraph.
    pub fn node_key(&self) -> &'static str {
        match self {
            ShaderChannel::BaseColor => "baseColor",
            ShaderChannel::SpecularRoughness => "roughness",
            ShaderChannel::Metalness => "metalness",
            ShaderChannel::Transmission => "transmission",
            ShaderChannel::Coat => "coat",
            ShaderChannel::NormalCamera => "normal",
        }
    }

    /// Nodegraph output the shader input reads from.
    pub fn output_name(&self) -> &'static str {
        match self {
            ShaderChannel::BaseColor => "base_color_output",
            ShaderChannel::SpecularRoughness => "roughness_output",
            ShaderChannel::Metalness => "metalness_output",
            ShaderChannel::Transmission => "transmission_output",
            ShaderChannel::Coat => "coat_output",
            ShaderChannel::NormalCamera => "normal_output",
        }
    }

    /// Input name on `standard_surface`.
    pub fn shader_input(&self) -> &'static str {
        match self {
            ShaderChannel::BaseColor => "base_color",
            ShaderChannel::SpecularRoughness => "specular_roughness",
            ShaderChannel::Metalness => "metalness",
            ShaderChannel::Transmission => "transmission",
            ShaderChannel::Coat => "coat",
            ShaderChannel::NormalCamera => "normal",
        }
    }

    /// MaterialX value type.
    pub fn value_type(&self) -> &'static str {
        match self {
            ShaderChannel::BaseColor => "color3",
            ShaderChannel::NormalCamera => "vector3",
            _ => "float",
        }
    }

    /// Host default; `None` for channels without a constant fallback.
    pub fn default_value(&self) -> Option<ChannelValue> {
        match self {
            ShaderChannel::BaseColor => Some(ChannelValue::Color([0.8, 0.8, 0.8])),
            ShaderChannel::SpecularRoughness => Some(ChannelValue::Float(0.2)),
            ShaderChannel::Metalness | ShaderChannel::Transmission | ShaderChannel::Coat => {
                Some(ChannelValue::Float(0.0))
            }
            ShaderChannel::NormalCamera => None,
        }
    }
}

/// Scalar or color value authored on a shader channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelValue {
    Float(f64),
    Color([f64; 3]),
}

impl ChannelValue {
    /// Compare at the host's single precision, where attributes are stored.
    pub fn matches(&self, other: &ChannelValue) -> bool {
        match (self, other) {
            (ChannelValue::Float(a), ChannelValue::Float(b)) => *a as f32 == *b as f32,
            (ChannelValue::Color(a), ChannelValue::Color(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| *x as f32 == *y as f32),
            _ => false,
        }
    }
}

/// How one channel is fed in the generated graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelBinding {
    Texture(String),
    Constant(ChannelValue),
}
