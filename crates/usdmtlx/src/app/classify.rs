//! Partitioning selected transforms into geometry, lights, and cameras.

use crate::domain::model::{ClassifiedSelection, NodePath};
use crate::infra::host::{SceneHost, node_types};

/// Cameras every scene carries; never exported even when selected.
pub const DEFAULT_CAMERAS: [&str; 4] = ["persp", "top", "front", "side"];

/// Sorts transforms by the type of their first shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneClassifier;

impl SceneClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `selection` in order. Nodes that are not transforms, have no shape, or carry an
    /// unrecognised shape are dropped.
    pub fn classify(&self, host: &dyn SceneHost, selection: &[NodePath]) -> ClassifiedSelection {
        let mut classified = ClassifiedSelection::default();

        for node in selection {
            if host.node_type(node).as_deref() != Some(node_types::TRANSFORM) {
                tracing::debug!(node = %node, "not a transform, skipping");
                continue;
            }

            let Some(shape) = host.shapes(node).into_iter().next() else {
                tracing::debug!(node = %node, "transform has no shape, skipping");
                continue;
            };
            let shape_type = host.node_type(&shape).unwrap_or_default();

            if shape_type == node_types::MESH {
                classified.geometry.push(node.clone());
            } else if shape_type.to_lowercase().contains("light") {
                classified.lights.push(node.clone());
            } else if shape_type == node_types::CAMERA {
                if DEFAULT_CAMERAS.contains(&node.short_name()) {
                    tracing::debug!(node = %node, "default camera, skipping");
                } else {
                    classified.cameras.push(node.clone());
                }
            } else {
                tracing::debug!(node = %node, shape_type = %shape_type, "unsupported shape");
            }
        }

        classified
    }
}
