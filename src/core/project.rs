//! Project metadata: where it comes from and how it is persisted.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use toml::{Table, Value};

use crate::infra::config::{Features, ProjectSettings};
use crate::observer::Observer;

pub const DEFAULT_PYTHON_VERSION: &str = "3.9";

/// Author identity from version control configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Resolved project metadata plus feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    pub description: String,
    pub author: String,
    pub email: String,
    pub python_version: String,
    pub features: Features,
}

#[derive(Debug, Default)]
struct PoetryMetadata {
    name: Option<String>,
    description: Option<String>,
    author: Option<String>,
    email: Option<String>,
    python_version: Option<String>,
}

impl ProjectConfig {
    /// Field by field: explicit settings, then `[tool.poetry]`, then the VCS
    /// identity, then defaults.
    pub fn resolve(
        root: &Path,
        settings: &ProjectSettings,
        features: Features,
        identity: &Identity,
        observer: &dyn Observer,
    ) -> Self {
        let poetry = match read_poetry(&root.join("pyproject.toml")) {
            Ok(meta) => meta,
            Err(e) => {
                observer.on_warning(&format!("ignoring pyproject.toml metadata: {e:#}"));
                PoetryMetadata::default()
            }
        };

        let dir_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());

        Self {
            name: settings.name.clone().or(poetry.name).unwrap_or(dir_name),
            description: settings
                .description
                .clone()
                .or(poetry.description)
                .unwrap_or_default(),
            author: settings
                .author
                .clone()
                .or(poetry.author)
                .or_else(|| identity.name.clone())
                .unwrap_or_default(),
            email: settings
                .email
                .clone()
                .or(poetry.email)
                .or_else(|| identity.email.clone())
                .unwrap_or_default(),
            python_version: settings
                .python_version
                .clone()
                .or(poetry.python_version)
                .unwrap_or_else(|| DEFAULT_PYTHON_VERSION.to_string()),
            features,
        }
    }

    /// `Name <email>`, or just the name when no email is known.
    pub fn authors_entry(&self) -> String {
        if self.email.is_empty() {
            self.author.clone()
        } else {
            format!("{} <{}>", self.author, self.email)
        }
    }
}

fn read_poetry(path: &Path) -> Result<PoetryMetadata> {
    if !path.is_file() {
        return Ok(PoetryMetadata::default());
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let data: Table =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let Some(poetry) = data
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(Value::as_table)
    else {
        return Ok(PoetryMetadata::default());
    };

    let text_of = |key: &str| poetry.get(key).and_then(Value::as_str).map(str::to_string);
    let (author, email) = poetry
        .get("authors")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .map(split_author)
        .unwrap_or_default();

    Ok(PoetryMetadata {
        name: text_of("name"),
        description: text_of("description"),
        author,
        email,
        python_version: poetry
            .get("dependencies")
            .and_then(|d| d.get("python"))
            .and_then(Value::as_str)
            .map(|v| v.trim_start_matches('^').to_string()),
    })
}

/// Split `Jane Doe <jane@example.com>` into its parts.
fn split_author(entry: &str) -> (Option<String>, Option<String>) {
    match entry.split_once('<') {
        Some((name, rest)) => {
            let name = name.trim();
            let email = rest.trim_end().trim_end_matches('>').trim();
            (
                (!name.is_empty()).then(|| name.to_string()),
                (!email.is_empty()).then(|| email.to_string()),
            )
        }
        None => {
            let name = entry.trim();
            ((!name.is_empty()).then(|| name.to_string()), None)
        }
    }
}

fn table_mut<'a>(parent: &'a mut Table, key: &str) -> Result<&'a mut Table> {
    parent
        .entry(key.to_string())
        .or_insert(Value::Table(Table::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("`{key}` in pyproject.toml is not a table"))
}

/// Write `config` into `path`, keeping every key it does not own.
///
/// Owned keys: `[tool.poetry]` name, description, authors and
/// `dependencies.python`; `[tool.reorg]` feature toggles. A pyproject.toml
/// that does not parse is left untouched and reported as an error.
pub fn merge_pyproject(path: &Path, config: &ProjectConfig) -> Result<()> {
    let mut data: Table = if path.is_file() {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        Table::new()
    };

    let tool = table_mut(&mut data, "tool")?;

    let poetry = table_mut(tool, "poetry")?;
    poetry.insert("name".into(), Value::String(config.name.clone()));
    poetry.insert(
        "description".into(),
        Value::String(config.description.clone()),
    );
    poetry.insert(
        "authors".into(),
        Value::Array(vec![Value::String(config.authors_entry())]),
    );
    let deps = table_mut(poetry, "dependencies")?;
    deps.insert(
        "python".into(),
        Value::String(format!("^{}", config.python_version)),
    );

    let reorg = table_mut(tool, "reorg")?;
    reorg.insert("docs".into(), Value::Boolean(config.features.docs));
    reorg.insert("ci".into(), Value::Boolean(config.features.ci));
    reorg.insert("docker".into(), Value::Boolean(config.features.docker));

    let text = toml::to_string_pretty(&data).context("serializing pyproject.toml")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
