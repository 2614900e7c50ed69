use crate::model::ResourceKind;
use crate::view::TableStyles;
use anyhow::{Context, Result, anyhow};
use ratatui::style::Color;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

/// Default sort for a resource kind, resolved against the header by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDefault {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkiffConfig {
    pub source: Option<String>,
    pub styles: TableStyles,
    pub sort: HashMap<ResourceKind, SortDefault>,
    pub aliases: HashMap<String, ResourceKind>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    explicit: Option<PathBuf>,
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SkiffConfigFile {
    #[serde(default)]
    styles: StylesSpec,
    #[serde(default)]
    sort: BTreeMap<String, SortSpec>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct StylesSpec {
    #[serde(default)]
    table: TableStyleSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TableStyleSpec {
    fg: Option<String>,
    bg: Option<String>,
    cursor: Option<String>,
    mark: Option<String>,
    #[serde(default)]
    header: HeaderStyleSpec,
    add: Option<String>,
    modify: Option<String>,
    delete: Option<String>,
    error: Option<String>,
    pending: Option<String>,
    completed: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct HeaderStyleSpec {
    fg: Option<String>,
    bg: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SortSpec {
    column: String,
    #[serde(default = "default_ascending", alias = "asc")]
    ascending: bool,
}

impl SkiffConfig {
    pub fn from_yaml(raw: &str, source: Option<String>) -> Result<Self> {
        let parsed: SkiffConfigFile = if raw.trim().is_empty() {
            SkiffConfigFile::default()
        } else {
            serde_yaml::from_str(raw).context("invalid skiff config")?
        };

        let styles = parse_table_styles(&parsed.styles.table)?;

        let mut sort = HashMap::new();
        for (token, spec) in parsed.sort {
            let kind = ResourceKind::from_token(&token)
                .ok_or_else(|| anyhow!("sort: unknown resource kind '{token}'"))?;
            sort.insert(
                kind,
                SortDefault {
                    column: spec.column.trim().to_ascii_uppercase(),
                    ascending: spec.ascending,
                },
            );
        }

        let mut aliases = HashMap::new();
        for (alias, target) in parsed.aliases {
            let kind = ResourceKind::from_token(&target)
                .ok_or_else(|| anyhow!("alias '{alias}': unknown resource kind '{target}'"))?;
            aliases.insert(alias.trim().to_ascii_lowercase(), kind);
        }

        Ok(Self {
            source,
            styles,
            sort,
            aliases,
        })
    }

    pub fn resolve_kind(&self, token: &str) -> Option<ResourceKind> {
        let lower = token.trim().to_ascii_lowercase();
        self.aliases
            .get(&lower)
            .copied()
            .or_else(|| ResourceKind::from_token(&lower))
    }
}

impl RuntimeConfigWatcher {
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        let path = explicit.clone().or_else(discover_config_path);
        Self {
            explicit,
            path,
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<SkiffConfig> {
        let Some(path) = self.path.clone() else {
            return Ok(SkiffConfig::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        SkiffConfig::from_yaml(&raw, Some(path.display().to_string()))
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Polled on the refresh tick. `Some` means the effective config changed.
    pub fn reload_if_changed(&mut self) -> Result<Option<SkiffConfig>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            if self.explicit.is_some() {
                return Ok(None);
            }
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(SkiffConfig::default()));
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn parse_table_styles(spec: &TableStyleSpec) -> Result<TableStyles> {
    let defaults = TableStyles::default();
    Ok(TableStyles {
        fg: parse_color(spec.fg.as_deref(), defaults.fg)?,
        bg: parse_color(spec.bg.as_deref(), defaults.bg)?,
        cursor: parse_color(spec.cursor.as_deref(), defaults.cursor)?,
        mark: parse_color(spec.mark.as_deref(), defaults.mark)?,
        header_fg: parse_color(spec.header.fg.as_deref(), defaults.header_fg)?,
        header_bg: parse_color(spec.header.bg.as_deref(), defaults.header_bg)?,
        add: parse_color(spec.add.as_deref(), defaults.add)?,
        modify: parse_color(spec.modify.as_deref(), defaults.modify)?,
        delete: parse_color(spec.delete.as_deref(), defaults.delete)?,
        error: parse_color(spec.error.as_deref(), defaults.error)?,
        pending: parse_color(spec.pending.as_deref(), defaults.pending)?,
        completed: parse_color(spec.completed.as_deref(), defaults.completed)?,
    })
}

fn parse_color(raw: Option<&str>, fallback: Color) -> Result<Color> {
    match raw.map(str::trim) {
        None | Some("") => Ok(fallback),
        Some(value) => Color::from_str(value).map_err(|_| anyhow!("invalid color '{value}'")),
    }
}

fn default_ascending() -> bool {
    true
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SKIFF_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    for candidate in [PathBuf::from("skiff.yaml"), PathBuf::from(".skiff.yaml")] {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config/skiff/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}
