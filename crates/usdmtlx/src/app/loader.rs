//! Companion script that rebuilds the exported layers as a sublayer chain downstream.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use minijinja::Environment;
use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::model::{ExportRecord, slash_path};

const TEMPLATE_NAME: &str = "houdini_loader";

/// Renders and writes the loader script from a built-in template.
pub struct LoaderScript {
    env: Environment<'static>,
}

impl LoaderScript {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(TEMPLATE_NAME, LOADER_TEMPLATE)
            .map_err(|err| anyhow!("failed to register loader template: {err}"))?;
        Ok(Self { env })
    }

    /// Render the script. Each layer becomes one sublayer node wired to the previous one; the
    /// last node gets the display flag.
    pub fn render(
        &self,
        layers: &[ExportRecord],
        output_dir: &Path,
        stage_path: &str,
    ) -> Result<String> {
        if layers.is_empty() {
            return Err(DomainError::NoLayers.into());
        }

        let nodes: Vec<TemplateLayer> = layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| TemplateLayer {
                var: format!("node{}", idx + 1),
                prev: (idx > 0).then(|| format!("node{idx}")),
                name: layer.name.clone(),
                path: layer.display_path(),
            })
            .collect();
        let context = TemplateContext {
            stage_path: stage_path.to_string(),
            output_dir: slash_path(output_dir),
            last: format!("node{}", nodes.len()),
            layers: nodes,
        };

        self.env
            .get_template(TEMPLATE_NAME)
            .map_err(|err| anyhow!("loader template missing: {err}"))?
            .render(&context)
            .map_err(|err| anyhow!("failed to render loader script: {err}"))
    }

    /// Render and write the script to `output_dir/script_name`.
    pub fn write(
        &self,
        layers: &[ExportRecord],
        output_dir: &Path,
        script_name: &str,
        stage_path: &str,
    ) -> Result<PathBuf> {
        let rendered = self.render(layers, output_dir, stage_path)?;
        let path = output_dir.join(script_name);
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write loader script to {}", path.display()))?;
        tracing::info!(path = %path.display(), layers = layers.len(), "loader script written");
        Ok(path)
    }
}

#[derive(Serialize)]
struct TemplateContext {
    stage_path: String,
    output_dir: String,
    layers: Vec<TemplateLayer>,
    last: String,
}

#[derive(Serialize)]
struct TemplateLayer {
    var: String,
    prev: Option<String>,
    name: String,
    path: String,
}

const LOADER_TEMPLATE: &str = r#"import hou

def create_loader():
    stage = hou.node("{{ stage_path }}")

{% for layer in layers %}
    {{ layer.var }} = stage.createNode("sublayer", node_name="{{ layer.name }}_sublayer")
    {{ layer.var }}.parm("filepath1").set("{{ output_dir }}/{{ layer.path }}")
{% if layer.prev %}
    {{ layer.var }}.setInput(0, {{ layer.prev }})
{% endif %}
{% endfor %}
    {{ last }}.setDisplayFlag(True)
    stage.layoutChildren()
create_loader()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_sublayers_and_flags_the_last() -> Result<()> {
        let layers = vec![
            ExportRecord::new("Props", "Props/Props_combine.usda"),
            ExportRecord::new("Set", "Set/Set_combine.usda"),
        ];
        let script = LoaderScript::new()?.render(&layers, Path::new("/shots/010"), "/stage")?;

        let expected = [
            "import hou",
            "",
            "def create_loader():",
            "    stage = hou.node(\"/stage\")",
            "",
            "    node1 = stage.createNode(\"sublayer\", node_name=\"Props_sublayer\")",
            "    node1.parm(\"filepath1\").set(\"/shots/010/Props/Props_combine.usda\")",
            "    node2 = stage.createNode(\"sublayer\", node_name=\"Set_sublayer\")",
            "    node2.parm(\"filepath1\").set(\"/shots/010/Set/Set_combine.usda\")",
            "    node2.setInput(0, node1)",
            "    node2.setDisplayFlag(True)",
            "    stage.layoutChildren()",
            "create_loader()",
        ]
        .join("\n");
        assert_eq!(script, expected);
        Ok(())
    }

    #[test]
    fn empty_layer_list_is_rejected() -> Result<()> {
        let err = LoaderScript::new()?
            .render(&[], Path::new("/out"), "/stage")
            .unwrap_err();
        assert_eq!(err.downcast_ref::<DomainError>(), Some(&DomainError::NoLayers));
        Ok(())
    }

    #[test]
    fn writes_script_into_output_dir() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let layers = vec![ExportRecord::new("Props", "Props/Props_combine.usda")];
        let path = LoaderScript::new()?.write(&layers, temp.path(), "houdini_loader.py", "/obj")?;
        assert_eq!(path, temp.path().join("houdini_loader.py"));
        let written = fs::read_to_string(path)?;
        assert!(written.contains("hou.node(\"/obj\")"));
        assert!(written.ends_with("create_loader()"));
        Ok(())
    }
}
