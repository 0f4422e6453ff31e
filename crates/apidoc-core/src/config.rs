use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default join between the names of a flattened cycle.
pub const DEFAULT_SEPARATOR: &str = "_In_";

/// Default property the `wrap` envelope moves the payload under.
pub const DEFAULT_RESULTS_PROPERTY: &str = "results";

/// Top-level project configuration loaded from `.apidoc.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApidocConfig {
    pub envelope: EnvelopeConfig,
    pub naming: NamingConfig,
    pub output: OutputConfig,
}

/// How successful responses are enveloped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub style: EnvelopeStyle,
    pub results_property: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            style: EnvelopeStyle::Wrap,
            results_property: DEFAULT_RESULTS_PROPERTY.to_string(),
        }
    }
}

/// Where the `success` block goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStyle {
    /// New object holding `success` and the original payload.
    #[default]
    Wrap,
    /// `success` is added to the payload definition itself.
    Inline,
}

/// Naming of synthesized definitions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub separator: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Output options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Serialization of the rewritten document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".apidoc.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<ApidocConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: ApidocConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# apidoc configuration
envelope:
  style: wrap               # wrap | inline
  results_property: results # payload property of the wrap envelope

naming:
  separator: _In_           # joins the names of a flattened cycle, deepest first

output:
  format: json              # json | yaml
"#
}
