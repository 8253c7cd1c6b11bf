//! Move chat templates in and out of `tokenizer_config.json` files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

const CHAT_TEMPLATE_KEY: &str = "chat_template";
const MODEL_TYPE_KEY: &str = "model_type";
const FALLBACK_MODEL_NAME: &str = "chat";

#[derive(Debug, Error)]
pub enum TemplateConfigError {
    #[error("{0} does not exist")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid JSON file: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} does not contain a JSON object")]
    NotAnObject(PathBuf),
    #[error("no chat_template found in {0}")]
    NoTemplate(PathBuf),
    #[error("chat_template in {0} is not a string")]
    NotAString(PathBuf),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write the `chat_template` of `config_path` to `output`, or to
/// `<templates_dir>/<model>_template.jinja` when no output is given.
/// Returns the path written.
pub fn extract(
    config_path: &Path,
    output: Option<&Path>,
    templates_dir: &Path,
) -> Result<PathBuf, TemplateConfigError> {
    let config = read_config(config_path)?;
    let template = match config.get(CHAT_TEMPLATE_KEY) {
        None => return Err(TemplateConfigError::NoTemplate(config_path.to_path_buf())),
        Some(Value::String(template)) => template,
        Some(_) => return Err(TemplateConfigError::NotAString(config_path.to_path_buf())),
    };

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            fs::create_dir_all(templates_dir).map_err(|source| TemplateConfigError::Write {
                path: templates_dir.to_path_buf(),
                source,
            })?;
            default_output_path(&config, config_path, templates_dir)
        }
    };

    fs::write(&output, template).map_err(|source| TemplateConfigError::Write {
        path: output.clone(),
        source,
    })?;

    info!(
        target = "chatlens::template_config",
        config = %config_path.display(),
        output = %output.display(),
        bytes = template.len(),
        "template extracted"
    );
    Ok(output)
}

/// Replace the `chat_template` of `config_path` with the contents of
/// `template_path`. Key order, non-ASCII text, and 2-space indentation are
/// preserved.
pub fn inject(template_path: &Path, config_path: &Path) -> Result<(), TemplateConfigError> {
    let template = read_text(template_path)?;
    let mut config = read_config(config_path)?;
    config.insert(CHAT_TEMPLATE_KEY.to_string(), Value::String(template));

    let encoded = serde_json::to_string_pretty(&Value::Object(config))
        .map_err(|source| TemplateConfigError::InvalidJson {
            path: config_path.to_path_buf(),
            source,
        })?;
    fs::write(config_path, encoded).map_err(|source| TemplateConfigError::Write {
        path: config_path.to_path_buf(),
        source,
    })?;

    info!(
        target = "chatlens::template_config",
        template = %template_path.display(),
        config = %config_path.display(),
        "template injected"
    );
    Ok(())
}

/// `<templates_dir>/<model>_template.jinja`, where `<model>` is the config's
/// `model_type` or the name of the directory holding the config.
pub fn default_output_path(
    config: &Map<String, Value>,
    config_path: &Path,
    templates_dir: &Path,
) -> PathBuf {
    let model = match config.get(MODEL_TYPE_KEY) {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Null) | None => config_path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Some(other) => other.to_string(),
    };
    let model = if model.is_empty() {
        FALLBACK_MODEL_NAME.to_string()
    } else {
        model
    };

    templates_dir.join(format!("{model}_template.jinja"))
}

fn read_text(path: &Path) -> Result<String, TemplateConfigError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => TemplateConfigError::Missing(path.to_path_buf()),
        _ => TemplateConfigError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn read_config(path: &Path) -> Result<Map<String, Value>, TemplateConfigError> {
    let raw = read_text(path)?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|source| TemplateConfigError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(TemplateConfigError::NotAnObject(path.to_path_buf())),
    }
}
