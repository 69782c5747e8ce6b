//! MaterialX documents generated from an object's assigned shader.
//!
//! Each of the six [`ShaderChannel`]s is bound to a texture when a file node feeds it, to a
//! constant when its authored value differs from the host default, or left out entirely. The
//! resulting nodegraph feeds a `standard_surface` wrapped in a `surfacematerial`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::domain::model::{ChannelBinding, ChannelValue, ExportFailure, NodePath, ShaderChannel};
use crate::infra::host::{AttrValue, FILE_TEXTURE_ATTR, SceneHost, node_types};

const MATERIALX_VERSION: &str = "1.38";

/// Order in which texture locations are tried when deriving an output directory.
const OUTPUT_HINT_ORDER: [ShaderChannel; 6] = [
    ShaderChannel::BaseColor,
    ShaderChannel::SpecularRoughness,
    ShaderChannel::Metalness,
    ShaderChannel::NormalCamera,
    ShaderChannel::Transmission,
    ShaderChannel::Coat,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterialXError {
    #[error(
        "no output directory given, no texture path to derive one from, and no fallback directory configured"
    )]
    MissingFallbackDir,
    #[error("fallback directory {0} is not an existing directory")]
    InvalidFallbackDir(PathBuf),
}

/// Result of exporting one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialXOutcome {
    Written { material: String, path: PathBuf },
    NoMaterial,
}

/// Channel bindings of one material, in emission order. `None` means the channel is omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialBindings {
    pub material: String,
    pub channels: Vec<(ShaderChannel, Option<ChannelBinding>)>,
}

impl MaterialBindings {
    pub fn binding(&self, channel: ShaderChannel) -> Option<&ChannelBinding> {
        self.channels
            .iter()
            .find(|(candidate, _)| *candidate == channel)
            .and_then(|(_, binding)| binding.as_ref())
    }

    fn texture(&self, channel: ShaderChannel) -> Option<&str> {
        match self.binding(channel) {
            Some(ChannelBinding::Texture(path)) => Some(path.as_str()),
            _ => None,
        }
    }

    /// Directory of the first texture found, used when no output directory is given.
    pub fn texture_dir(&self) -> Option<PathBuf> {
        OUTPUT_HINT_ORDER
            .iter()
            .find_map(|channel| self.texture(*channel))
            .map(|path| {
                Path::new(path)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            })
    }
}

/// Builds and writes `.mtlx` documents for single objects.
#[derive(Debug, Clone, Default)]
pub struct MaterialXWriter {
    fallback_dir: Option<PathBuf>,
}

impl MaterialXWriter {
    pub fn new(fallback_dir: Option<PathBuf>) -> Self {
        Self { fallback_dir }
    }

    /// First material reached through the shading engines of the object's shapes.
    pub fn assigned_material(&self, host: &dyn SceneHost, object: &NodePath) -> Option<NodePath> {
        for shape in host.shapes(object) {
            let engines = host.connections(shape.as_str(), Some(node_types::SHADING_ENGINE));
            if engines.is_empty() {
                continue;
            }
            let material = engines
                .iter()
                .flat_map(|engine| host.connections(engine.as_str(), None))
                .find(|node| host.is_material(node));
            if material.is_some() {
                return material;
            }
        }
        None
    }

    /// Texture file feeding `channel`, if any.
    ///
    /// The normal channel goes through a normal-map node first, then a bump node, to reach the
    /// file node.
    pub fn texture_path(
        &self,
        host: &dyn SceneHost,
        material: &NodePath,
        channel: ShaderChannel,
    ) -> Option<String> {
        let plug = material.plug(channel.attribute());
        let path = if channel == ShaderChannel::NormalCamera {
            indirect_texture(host, &plug, node_types::NORMAL_MAP, "input")
                .or_else(|| indirect_texture(host, &plug, node_types::BUMP, "bumpValue"))
        } else {
            first_file_texture(host, &plug)
        };
        path.filter(|path| !path.is_empty())
    }

    /// Authored value of `channel` when it differs from the host default.
    pub fn authored_value(
        &self,
        host: &dyn SceneHost,
        material: &NodePath,
        channel: ShaderChannel,
    ) -> Option<ChannelValue> {
        let default = channel.default_value()?;
        let value = host.attribute(&material.plug(channel.attribute()))?;
        let value = channel_value(&value, &default)?;
        (!value.matches(&default)).then_some(value)
    }

    /// Resolve every channel of `material`.
    pub fn bindings(&self, host: &dyn SceneHost, material: &NodePath) -> MaterialBindings {
        let channels = ShaderChannel::ALL
            .iter()
            .map(|channel| {
                let binding = self
                    .texture_path(host, material, *channel)
                    .map(ChannelBinding::Texture)
                    .or_else(|| {
                        self.authored_value(host, material, *channel)
                            .map(ChannelBinding::Constant)
                    });
                (*channel, binding)
            })
            .collect();
        MaterialBindings {
            material: material.as_str().to_string(),
            channels,
        }
    }

    /// Where the document for `bindings` goes.
    pub fn output_path(
        &self,
        bindings: &MaterialBindings,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf, MaterialXError> {
        let file_name = format!("{}.mtlx", bindings.material);
        if let Some(dir) = output_dir {
            return Ok(dir.join(file_name));
        }
        if let Some(dir) = bindings.texture_dir() {
            return Ok(dir.join(file_name));
        }
        let fallback = self
            .fallback_dir
            .as_ref()
            .ok_or(MaterialXError::MissingFallbackDir)?;
        if !fallback.is_dir() {
            return Err(MaterialXError::InvalidFallbackDir(fallback.clone()));
        }
        Ok(fallback.join(file_name))
    }

    /// Generate and write the document for `object`'s material.
    pub fn write(
        &self,
        host: &dyn SceneHost,
        object: &NodePath,
        output_dir: Option<&Path>,
    ) -> Result<MaterialXOutcome> {
        let Some(material) = self.assigned_material(host, object) else {
            tracing::warn!(object = %object, "no material assigned");
            return Ok(MaterialXOutcome::NoMaterial);
        };

        let bindings = self.bindings(host, &material);
        let document = render_document(&bindings);
        let path = self.output_path(&bindings, output_dir)?;
        fs::write(&path, document)
            .with_context(|| format!("failed to write MaterialX to {}", path.display()))?;
        tracing::info!(path = %path.display(), material = %material, "MaterialX written");

        Ok(MaterialXOutcome::Written {
            material: bindings.material,
            path,
        })
    }
}

fn first_file_texture(host: &dyn SceneHost, plug: &str) -> Option<String> {
    let file = host
        .connections(plug, Some(node_types::FILE))
        .into_iter()
        .next()?;
    host.attribute(&file.plug(FILE_TEXTURE_ATTR))
        .and_then(|value| value.as_text().map(str::to_owned))
}

fn indirect_texture(
    host: &dyn SceneHost,
    plug: &str,
    via_type: &str,
    via_attribute: &str,
) -> Option<String> {
    host.connections(plug, Some(via_type))
        .iter()
        .find_map(|node| first_file_texture(host, &node.plug(via_attribute)))
}

fn channel_value(value: &AttrValue, default: &ChannelValue) -> Option<ChannelValue> {
    match (default, value) {
        (ChannelValue::Color(_), AttrValue::Tuple(items)) if items.len() >= 3 => {
            Some(ChannelValue::Color([items[0], items[1], items[2]]))
        }
        (ChannelValue::Float(_), AttrValue::Float(value)) => Some(ChannelValue::Float(*value)),
        (ChannelValue::Float(_), AttrValue::Tuple(items)) if items.len() == 1 => {
            Some(ChannelValue::Float(items[0]))
        }
        _ => None,
    }
}

/// Render the MaterialX document for resolved bindings.
pub fn render_document(bindings: &MaterialBindings) -> String {
    let material = &bindings.material;
    let shader_name = format!("SR_{material}");
    let graph_name = format!("NG_{material}");

    let mut lines = vec![
        r#"<?xml version="1.0" encoding="utf-8"?>"#.to_string(),
        format!(r#"<materialx version="{MATERIALX_VERSION}">"#),
        format!(r#"  <nodegraph name="{graph_name}">"#),
    ];

    let mut shader_inputs = Vec::new();
    for (channel, binding) in &bindings.channels {
        let Some(binding) = binding else {
            continue;
        };
        let key = channel.node_key();
        let ty = channel.value_type();
        let output = channel.output_name();

        match (channel, binding) {
            (ShaderChannel::NormalCamera, ChannelBinding::Texture(path)) => {
                lines.push(r#"    <texcoord name="st" type="vector2" />"#.to_string());
                lines.push(format!(
                    r#"    <image name="{key}_tex" type="{ty}" GLSLFX_usage="normal">"#
                ));
                lines.push(format!(
                    r#"      <input name="file" type="filename" value="{path}" />"#
                ));
                lines.push(
                    r#"      <input name="texcoord" type="vector2" nodename="st" />"#.to_string(),
                );
                lines.push("    </image>".to_string());
                lines.push(format!(
                    r#"    <output name="{output}" type="{ty}" nodename="{key}_tex" />"#
                ));
            }
            (ShaderChannel::NormalCamera, ChannelBinding::Constant(_)) => continue,
            (_, ChannelBinding::Texture(path)) => {
                lines.push(format!(r#"    <image name="{key}_tex" type="{ty}">"#));
                lines.push(format!(
                    r#"      <input name="file" type="filename" value="{path}" />"#
                ));
                lines.push("    </image>".to_string());
                lines.push(format!(
                    r#"    <output name="{output}" type="{ty}" nodename="{key}_tex" />"#
                ));
            }
            (_, ChannelBinding::Constant(value)) => {
                let value = format_value(value);
                lines.push(format!(r#"    <constant name="{key}_val" type="{ty}">"#));
                lines.push(format!(
                    r#"      <input name="value" type="{ty}" value="{value}" />"#
                ));
                lines.push("    </constant>".to_string());
                lines.push(format!(
                    r#"    <output name="{output}" type="{ty}" nodename="{key}_val" />"#
                ));
            }
        }

        shader_inputs.push(format!(
            r#"    <input name="{}" type="{ty}" output="{output}" nodegraph="{graph_name}" />"#,
            channel.shader_input()
        ));
    }

    lines.push("  </nodegraph>".to_string());
    lines.push(format!(
        r#"  <standard_surface name="{shader_name}" type="surfaceshader">"#
    ));
    lines.extend(shader_inputs);
    lines.push("  </standard_surface>".to_string());
    lines.push(format!(
        r#"  <surfacematerial name="{material}" type="material">"#
    ));
    lines.push(format!(
        r#"    <input name="surfaceshader" type="surfaceshader" nodename="{shader_name}" />"#
    ));
    lines.push("  </surfacematerial>".to_string());
    lines.push("</materialx>".to_string());
    lines.join("\n")
}

fn format_value(value: &ChannelValue) -> String {
    match value {
        ChannelValue::Float(value) => format_float(*value),
        ChannelValue::Color([r, g, b]) => {
            format!("{},{},{}", format_float(*r), format_float(*g), format_float(*b))
        }
    }
}

/// Shortest round-trip float text, always with a fractional part or an exponent.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or_default();
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exponent.abs())
            }
            None => formatted,
        };
    }

    let formatted = format!("{value}");
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

/// Outcome of exporting materials for a whole selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterialXReport {
    pub written: Vec<PathBuf>,
    pub without_material: Vec<NodePath>,
    pub failures: Vec<ExportFailure>,
}

impl MaterialXReport {
    /// Distinct directories that received documents, in first-written order.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for path in &self.written {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    pub fn summary(&self) -> String {
        format!(
            "{} MaterialX file(s) written, {} object(s) without material, {} failure(s)",
            self.written.len(),
            self.without_material.len(),
            self.failures.len()
        )
    }
}

/// Runs [`MaterialXWriter`] over a selection, continuing past failures.
#[derive(Debug, Clone, Default)]
pub struct MaterialXExporter {
    writer: MaterialXWriter,
}

impl MaterialXExporter {
    pub fn new(writer: MaterialXWriter) -> Self {
        Self { writer }
    }

    pub fn export_selection(
        &self,
        host: &dyn SceneHost,
        selection: &[NodePath],
        output_dir: Option<&Path>,
    ) -> MaterialXReport {
        let mut report = MaterialXReport::default();
        if selection.is_empty() {
            tracing::warn!("nothing selected for MaterialX export");
            return report;
        }

        for object in selection {
            match self.writer.write(host, object, output_dir) {
                Ok(MaterialXOutcome::Written { path, .. }) => report.written.push(path),
                Ok(MaterialXOutcome::NoMaterial) => report.without_material.push(object.clone()),
                Err(err) => {
                    let failure = ExportFailure::new(object.as_str(), &err);
                    tracing::error!(object = %object, error = %failure.message, "MaterialX export failed");
                    report.failures.push(failure);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::{Connection, InMemoryHost, NodeRecord, SceneSnapshot};

    fn host_with(extra_connections: &str, attributes: &str) -> InMemoryHost {
        let json = format!(
            r#"{{
                "nodes": [
                    {{ "path": "|ball", "type": "transform" }},
                    {{ "path": "|ball|ballShape", "type": "mesh" }},
                    {{ "path": "|bare", "type": "transform" }},
                    {{ "path": "|bare|bareShape", "type": "mesh" }},
                    {{ "path": "ballSG", "type": "shadingEngine" }},
                    {{ "path": "ballMat", "type": "aiStandardSurface", "material": true }},
                    {{ "path": "baseFile", "type": "file" }},
                    {{ "path": "roughFile", "type": "file" }},
                    {{ "path": "normalFile", "type": "file" }},
                    {{ "path": "normalMap1", "type": "aiNormalMap" }},
                    {{ "path": "bump1", "type": "bump2d" }}
                ],
                "connections": [
                    {{ "source": "|ball|ballShape.instObjGroups[0]", "destination": "ballSG.dagSetMembers[0]" }},
                    {{ "source": "ballMat.outColor", "destination": "ballSG.surfaceShader" }}
                    {extra_connections}
                ],
                "attributes": {{
                    "baseFile.fileTextureName": "/textures/ball/base.png",
                    "roughFile.fileTextureName": "/textures/ball/rough.exr",
                    "normalFile.fileTextureName": "/textures/ball/normal.png"
                    {attributes}
                }}
            }}"#
        );
        let snapshot: SceneSnapshot = serde_json::from_str(&json).expect("valid snapshot");
        InMemoryHost::new(snapshot)
    }

    fn ball() -> NodePath {
        NodePath::new("|ball")
    }

    #[test]
    fn finds_material_through_shading_engine() {
        let host = host_with("", "");
        let writer = MaterialXWriter::default();
        assert_eq!(
            writer.assigned_material(&host, &ball()),
            Some(NodePath::new("ballMat"))
        );
        assert_eq!(writer.assigned_material(&host, &NodePath::new("|bare")), None);
    }

    #[test]
    fn no_material_creates_no_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let host = host_with("", "");
        let outcome =
            MaterialXWriter::default().write(&host, &NodePath::new("|bare"), Some(temp.path()))?;
        assert_eq!(outcome, MaterialXOutcome::NoMaterial);
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn default_values_produce_an_empty_graph() {
        let host = host_with(
            "",
            r#", "ballMat.baseColor": [0.8, 0.8, 0.8], "ballMat.specularRoughness": 0.2,
               "ballMat.metalness": 0.0, "ballMat.transmission": 0.0, "ballMat.coat": 0.0"#,
        );
        let writer = MaterialXWriter::default();
        let bindings = writer.bindings(&host, &NodePath::new("ballMat"));
        assert!(bindings.channels.iter().all(|(_, binding)| binding.is_none()));

        let document = render_document(&bindings);
        assert!(!document.contains("baseColor"));
        assert!(!document.contains("base_color"));
        assert!(document.contains(
            "  <standard_surface name=\"SR_ballMat\" type=\"surfaceshader\">\n  </standard_surface>"
        ));
    }

    #[test]
    fn texture_takes_priority_over_value() {
        let host = host_with(
            r#", { "source": "baseFile.outColor", "destination": "ballMat.baseColor" }"#,
            r#", "ballMat.baseColor": [0.1, 0.2, 0.3]"#,
        );
        let bindings = MaterialXWriter::default().bindings(&host, &NodePath::new("ballMat"));
        assert_eq!(
            bindings.binding(ShaderChannel::BaseColor),
            Some(&ChannelBinding::Texture("/textures/ball/base.png".into()))
        );
    }

    #[test]
    fn channel_inclusion_is_independent_per_channel() {
        let connections = r#", { "source": "roughFile.outAlpha", "destination": "ballMat.specularRoughness" }"#;
        let attributes = r#", "ballMat.metalness": 1.0, "ballMat.coat": 0.0, "ballMat.transmission": 0.25"#;
        let host = host_with(connections, attributes);
        let bindings = MaterialXWriter::default().bindings(&host, &NodePath::new("ballMat"));

        assert_eq!(bindings.binding(ShaderChannel::BaseColor), None);
        assert!(matches!(
            bindings.binding(ShaderChannel::SpecularRoughness),
            Some(ChannelBinding::Texture(_))
        ));
        assert_eq!(
            bindings.binding(ShaderChannel::Metalness),
            Some(&ChannelBinding::Constant(ChannelValue::Float(1.0)))
        );
        assert_eq!(
            bindings.binding(ShaderChannel::Transmission),
            Some(&ChannelBinding::Constant(ChannelValue::Float(0.25)))
        );
        assert_eq!(bindings.binding(ShaderChannel::Coat), None);
        assert_eq!(bindings.binding(ShaderChannel::NormalCamera), None);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Feed {
        Texture,
        Authored,
        Default,
    }

    fn record(path: &str, node_type: &str, material: bool) -> NodeRecord {
        NodeRecord {
            path: NodePath::new(path),
            node_type: node_type.into(),
            material,
        }
    }

    fn link(source: impl Into<String>, destination: impl Into<String>) -> Connection {
        Connection {
            source: source.into(),
            destination: destination.into(),
        }
    }

    fn texture_file(channel: ShaderChannel) -> String {
        format!("/tex/{}.png", channel.attribute())
    }

    /// `|obj` carries material `mat`; each channel is fed as requested.
    fn fed_host(feeds: &[(ShaderChannel, Feed)]) -> InMemoryHost {
        let mut snapshot = SceneSnapshot {
            nodes: vec![
                record("|obj", "transform", false),
                record("|obj|objShape", "mesh", false),
                record("objSG", "shadingEngine", false),
                record("mat", "aiStandardSurface", true),
            ],
            connections: vec![
                link("|obj|objShape.instObjGroups[0]", "objSG.dagSetMembers[0]"),
                link("mat.outColor", "objSG.surfaceShader"),
            ],
            ..SceneSnapshot::default()
        };

        for (channel, feed) in feeds {
            let plug = format!("mat.{}", channel.attribute());
            match feed {
                Feed::Texture => {
                    let file = format!("{}File", channel.attribute());
                    snapshot.nodes.push(record(&file, "file", false));
                    snapshot.attributes.insert(
                        format!("{file}.{FILE_TEXTURE_ATTR}"),
                        AttrValue::Text(texture_file(*channel)),
                    );
                    if *channel == ShaderChannel::NormalCamera {
                        snapshot.nodes.push(record("normalMap1", "aiNormalMap", false));
                        snapshot.connections.push(link("normalMap1.outValue", plug));
                        snapshot
                            .connections
                            .push(link(format!("{file}.outColor"), "normalMap1.input"));
                    } else {
                        snapshot.connections.push(link(format!("{file}.outColor"), plug));
                    }
                }
                Feed::Authored => {
                    let value = match channel.default_value() {
                        Some(ChannelValue::Color(_)) => AttrValue::Tuple(vec![0.1, 0.2, 0.3]),
                        _ => AttrValue::Float(0.7),
                    };
                    snapshot.attributes.insert(plug, value);
                }
                Feed::Default => {
                    let value = match channel.default_value() {
                        Some(ChannelValue::Color(rgb)) => AttrValue::Tuple(rgb.to_vec()),
                        Some(ChannelValue::Float(value)) => AttrValue::Float(value),
                        None => AttrValue::Tuple(vec![0.0, 0.0, 1.0]),
                    };
                    snapshot.attributes.insert(plug, value);
                }
            }
        }
        InMemoryHost::new(snapshot)
    }

    fn expected_binding(channel: ShaderChannel, feed: Feed) -> Option<ChannelBinding> {
        match feed {
            Feed::Texture => Some(ChannelBinding::Texture(texture_file(channel))),
            Feed::Authored => match channel.default_value()? {
                ChannelValue::Color(_) => {
                    Some(ChannelBinding::Constant(ChannelValue::Color([0.1, 0.2, 0.3])))
                }
                ChannelValue::Float(_) => Some(ChannelBinding::Constant(ChannelValue::Float(0.7))),
            },
            Feed::Default => None,
        }
    }

    /// Whether the document has the image node, the constant node and the shader input of
    /// `channel`.
    fn rendered_parts(document: &str, channel: ShaderChannel) -> (bool, bool, bool) {
        let key = channel.node_key();
        let input = format!(
            r#"    <input name="{}" type="{}" output="{}" nodegraph="NG_mat" />"#,
            channel.shader_input(),
            channel.value_type(),
            channel.output_name()
        );
        (
            document.contains(&format!(r#"<image name="{key}_tex""#)),
            document.contains(&format!(r#"<constant name="{key}_val""#)),
            document.contains(&input),
        )
    }

    fn assert_channel_rendered(
        document: &str,
        channel: ShaderChannel,
        expected: &Option<ChannelBinding>,
    ) {
        let parts = rendered_parts(document, channel);
        let wanted = match expected {
            Some(ChannelBinding::Texture(_)) => (true, false, true),
            Some(ChannelBinding::Constant(_)) => (false, true, true),
            None => (false, false, false),
        };
        assert_eq!(parts, wanted, "{channel:?} in:\n{document}");
    }

    #[test]
    fn every_channel_follows_texture_then_value_rule() {
        let writer = MaterialXWriter::default();
        let material = NodePath::new("mat");

        for channel in ShaderChannel::ALL {
            for feed in [Feed::Texture, Feed::Authored, Feed::Default] {
                let host = fed_host(&[(channel, feed)]);
                let bindings = writer.bindings(&host, &material);
                let expected = expected_binding(channel, feed);

                assert_eq!(
                    bindings.binding(channel),
                    expected.as_ref(),
                    "{channel:?} fed by {feed:?}"
                );
                for (other, binding) in &bindings.channels {
                    if *other != channel {
                        assert_eq!(binding, &None, "{other:?} leaked from {channel:?}");
                    }
                }

                let document = render_document(&bindings);
                for other in ShaderChannel::ALL {
                    let wanted = if other == channel { expected.clone() } else { None };
                    assert_channel_rendered(&document, other, &wanted);
                }
            }
        }
    }

    #[test]
    fn all_textured_channels_render_together() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let feeds: Vec<(ShaderChannel, Feed)> = ShaderChannel::ALL
            .iter()
            .map(|channel| (*channel, Feed::Texture))
            .collect();
        let host = fed_host(&feeds);

        let outcome =
            MaterialXWriter::default().write(&host, &NodePath::new("|obj"), Some(temp.path()))?;
        assert_eq!(
            outcome,
            MaterialXOutcome::Written {
                material: "mat".into(),
                path: temp.path().join("mat.mtlx"),
            }
        );

        let document = fs::read_to_string(temp.path().join("mat.mtlx"))?;
        assert_eq!(document.matches("<image name=").count(), 6);
        assert!(!document.contains("<constant"));
        for channel in ShaderChannel::ALL {
            assert_channel_rendered(
                &document,
                channel,
                &Some(ChannelBinding::Texture(texture_file(channel))),
            );
        }
        Ok(())
    }

    #[test]
    fn mixed_feeds_render_independently() {
        let feeds = [
            (ShaderChannel::BaseColor, Feed::Authored),
            (ShaderChannel::SpecularRoughness, Feed::Texture),
            (ShaderChannel::Metalness, Feed::Default),
            (ShaderChannel::Transmission, Feed::Texture),
            (ShaderChannel::Coat, Feed::Authored),
            (ShaderChannel::NormalCamera, Feed::Texture),
        ];
        let host = fed_host(&feeds);
        let bindings = MaterialXWriter::default().bindings(&host, &NodePath::new("mat"));
        let document = render_document(&bindings);

        for (channel, feed) in feeds {
            let expected = expected_binding(channel, feed);
            assert_eq!(bindings.binding(channel), expected.as_ref(), "{channel:?}");
            assert_channel_rendered(&document, channel, &expected);
        }
        assert!(document.contains(r#"<input name="value" type="color3" value="0.1,0.2,0.3" />"#));
    }

    #[test]
    fn normal_channel_prefers_normal_map_then_bump() {
        let via_bump = host_with(
            r#", { "source": "bump1.outNormal", "destination": "ballMat.normalCamera" },
                 { "source": "normalFile.outAlpha", "destination": "bump1.bumpValue" }"#,
            "",
        );
        let writer = MaterialXWriter::default();
        let material = NodePath::new("ballMat");
        assert_eq!(
            writer.texture_path(&via_bump, &material, ShaderChannel::NormalCamera),
            Some("/textures/ball/normal.png".into())
        );

        let via_map = host_with(
            r#", { "source": "normalMap1.outValue", "destination": "ballMat.normalCamera" },
                 { "source": "baseFile.outColor", "destination": "normalMap1.input" }"#,
            "",
        );
        assert_eq!(
            writer.texture_path(&via_map, &material, ShaderChannel::NormalCamera),
            Some("/textures/ball/base.png".into())
        );
    }

    #[test]
    fn renders_full_document_in_channel_order() {
        let bindings = MaterialBindings {
            material: "ballMat".into(),
            channels: vec![
                (
                    ShaderChannel::BaseColor,
                    Some(ChannelBinding::Constant(ChannelValue::Color([1.0, 0.5, 0.25]))),
                ),
                (
                    ShaderChannel::SpecularRoughness,
                    Some(ChannelBinding::Texture("/t/rough.exr".into())),
                ),
                (ShaderChannel::Metalness, None),
                (ShaderChannel::Transmission, None),
                (
                    ShaderChannel::Coat,
                    Some(ChannelBinding::Constant(ChannelValue::Float(0.3))),
                ),
                (
                    ShaderChannel::NormalCamera,
                    Some(ChannelBinding::Texture("/t/normal.png".into())),
                ),
            ],
        };

        let expected = [
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<materialx version="1.38">"#,
            r#"  <nodegraph name="NG_ballMat">"#,
            r#"    <constant name="baseColor_val" type="color3">"#,
            r#"      <input name="value" type="color3" value="1.0,0.5,0.25" />"#,
            r#"    </constant>"#,
            r#"    <output name="base_color_output" type="color3" nodename="baseColor_val" />"#,
            r#"    <image name="roughness_tex" type="float">"#,
            r#"      <input name="file" type="filename" value="/t/rough.exr" />"#,
            r#"    </image>"#,
            r#"    <output name="roughness_output" type="float" nodename="roughness_tex" />"#,
            r#"    <constant name="coat_val" type="float">"#,
            r#"      <input name="value" type="float" value="0.3" />"#,
            r#"    </constant>"#,
            r#"    <output name="coat_output" type="float" nodename="coat_val" />"#,
            r#"    <texcoord name="st" type="vector2" />"#,
            r#"    <image name="normal_tex" type="vector3" GLSLFX_usage="normal">"#,
            r#"      <input name="file" type="filename" value="/t/normal.png" />"#,
            r#"      <input name="texcoord" type="vector2" nodename="st" />"#,
            r#"    </image>"#,
            r#"    <output name="normal_output" type="vector3" nodename="normal_tex" />"#,
            r#"  </nodegraph>"#,
            r#"  <standard_surface name="SR_ballMat" type="surfaceshader">"#,
            r#"    <input name="base_color" type="color3" output="base_color_output" nodegraph="NG_ballMat" />"#,
            r#"    <input name="specular_roughness" type="float" output="roughness_output" nodegraph="NG_ballMat" />"#,
            r#"    <input name="coat" type="float" output="coat_output" nodegraph="NG_ballMat" />"#,
            r#"    <input name="normal" type="vector3" output="normal_output" nodegraph="NG_ballMat" />"#,
            r#"  </standard_surface>"#,
            r#"  <surfacematerial name="ballMat" type="material">"#,
            r#"    <input name="surfaceshader" type="surfaceshader" nodename="SR_ballMat" />"#,
            r#"  </surfacematerial>"#,
            r#"</materialx>"#,
        ]
        .join("\n");

        assert_eq!(render_document(&bindings), expected);
    }

    #[test]
    fn output_path_prefers_dir_then_texture_then_fallback() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let textured = host_with(
            r#", { "source": "roughFile.outAlpha", "destination": "ballMat.specularRoughness" }"#,
            "",
        );
        let writer = MaterialXWriter::new(Some(temp.path().to_path_buf()));
        let bindings = writer.bindings(&textured, &NodePath::new("ballMat"));

        assert_eq!(
            writer.output_path(&bindings, Some(Path::new("/out")))?,
            PathBuf::from("/out/ballMat.mtlx")
        );
        assert_eq!(
            writer.output_path(&bindings, None)?,
            PathBuf::from("/textures/ball/ballMat.mtlx")
        );

        let plain = host_with("", r#", "ballMat.coat": 0.5"#);
        let bindings = writer.bindings(&plain, &NodePath::new("ballMat"));
        assert_eq!(
            writer.output_path(&bindings, None)?,
            temp.path().join("ballMat.mtlx")
        );
        Ok(())
    }

    #[test]
    fn fallback_directory_is_validated() {
        let host = host_with("", "");
        let bindings = MaterialXWriter::default().bindings(&host, &NodePath::new("ballMat"));

        assert_eq!(
            MaterialXWriter::default().output_path(&bindings, None),
            Err(MaterialXError::MissingFallbackDir)
        );
        let missing = PathBuf::from("/nonexistent/usdmtlx/fallback");
        assert_eq!(
            MaterialXWriter::new(Some(missing.clone())).output_path(&bindings, None),
            Err(MaterialXError::InvalidFallbackDir(missing))
        );
    }

    #[test]
    fn batch_continues_past_failures() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let host = host_with("", r#", "ballMat.coat": 0.5"#);
        let exporter = MaterialXExporter::new(MaterialXWriter::default());
        let selection = vec![ball(), NodePath::new("|bare")];

        let failed = exporter.export_selection(&host, &selection, None);
        assert_eq!(failed.failures.len(), 1);
        assert_eq!(failed.failures[0].subject, "|ball");
        assert_eq!(failed.without_material, vec![NodePath::new("|bare")]);

        let written = exporter.export_selection(&host, &selection, Some(temp.path()));
        assert_eq!(written.written, vec![temp.path().join("ballMat.mtlx")]);
        assert_eq!(written.output_dirs(), vec![temp.path().to_path_buf()]);
        let document = fs::read_to_string(temp.path().join("ballMat.mtlx"))?;
        assert!(document.contains(r#"<input name="value" type="float" value="0.5" />"#));
        Ok(())
    }

    #[test]
    fn floats_print_like_round_trip_reprs() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(0.30000001192092896), "0.30000001192092896");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(1e16), "1e+16");
    }
}
