// src/normalize/projection.rs

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::request::Intent;
use crate::table::{Cell, Table};

const DEFAULT_SPECS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/config/projections.yaml"
));

pub const UNIVERSE_HEADER: [&str; 13] = [
    "Search Term",
    "Search Volume",
    "Level",
    "Branded Keyword",
    "ASIN1",
    "ASIN2",
    "ASIN3",
    "Click1",
    "Click2",
    "Click3",
    "Conv1",
    "Conv2",
    "Conv3",
];

/// A provider column, by name when pinned, by position otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnRef {
    #[serde(default)]
    pub field: Option<String>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Promote {
    #[serde(default)]
    pub field: Option<String>,
    pub position: usize,
    pub label: String,
}

impl Promote {
    fn column(&self) -> ColumnRef {
        ColumnRef {
            field: self.field.clone(),
            position: self.position,
        }
    }
}

/// Exactly one of `promote` (move a column to the front, keep the rest) or
/// `select` (keep only the listed columns, in order).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectionSpec {
    #[serde(default)]
    pub promote: Option<Promote>,
    #[serde(default)]
    pub select: Option<Vec<ColumnRef>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectionSpecs {
    pub version: u32,
    pub intents: BTreeMap<Intent, ProjectionSpec>,
}

impl Default for ProjectionSpecs {
    fn default() -> Self {
        Self::from_yaml(DEFAULT_SPECS).expect("embedded projections.yaml should be valid")
    }
}

impl ProjectionSpecs {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let specs: ProjectionSpecs = serde_yaml::from_str(text)
            .map_err(|e| AppError::Configuration(format!("invalid projection specs: {}", e)))?;
        for (intent, spec) in &specs.intents {
            match (&spec.promote, &spec.select) {
                (Some(_), None) => {}
                (None, Some(cols)) if !cols.is_empty() => {}
                _ => {
                    return Err(AppError::Configuration(format!(
                        "projection for {} needs exactly one of `promote` or a non-empty `select`",
                        intent.as_str()
                    )))
                }
            }
        }
        Ok(specs)
    }

    /// Load from `path` when given, else the embedded defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    AppError::Configuration(format!("reading {}: {}", p.display(), e))
                })?;
                let specs = Self::from_yaml(&text)?;
                info!(path = %p.display(), version = specs.version, "loaded projection specs");
                Ok(specs)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn get(&self, intent: Intent) -> Result<&ProjectionSpec> {
        self.intents.get(&intent).ok_or_else(|| {
            AppError::Configuration(format!("no projection configured for {}", intent.as_str()))
        })
    }
}

/// `"search_volume"` → `"Search Volume"`: underscores to spaces, lowercase,
/// then capitalise every letter that follows a non-word character.
pub fn format_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_word = false;
    for ch in raw.replace('_', " ").to_lowercase().chars() {
        let is_word = ch.is_ascii_alphanumeric() || ch == '_';
        if is_word && !prev_word {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        prev_word = is_word;
    }
    out
}

fn resolve(col: &ColumnRef, header: &[String], intent: Intent) -> Result<usize> {
    if let Some(name) = &col.field {
        if let Some(idx) = header.iter().position(|h| h == name) {
            return Ok(idx);
        }
        warn!(
            intent = intent.as_str(),
            field = %name,
            position = col.position,
            "projected field missing from provider response, falling back to position"
        );
    }
    if col.position < header.len() {
        Ok(col.position)
    } else {
        Err(AppError::SchemaMismatch(format!(
            "{} projection wants column {} but the response has {} columns",
            intent.as_str(),
            col.position,
            header.len()
        )))
    }
}

/// Apply the intent's projection to a normalized table and prettify the header.
pub fn project(intent: Intent, table: Table, specs: &ProjectionSpecs) -> Result<Table> {
    if table.is_no_data() {
        return Ok(table);
    }
    let spec = specs.get(intent)?;
    let (header, rows) = table.into_parts();

    let (header, rows) = if let Some(promote) = &spec.promote {
        let idx = resolve(&promote.column(), &header, intent)?;
        let mut header = move_to_front(header, idx);
        header[0] = promote.label.clone();
        let rows = rows.into_iter().map(|r| move_to_front(r, idx)).collect();
        (header, rows)
    } else {
        let cols = spec.select.as_deref().unwrap_or_default();
        let picks = cols
            .iter()
            .map(|c| resolve(c, &header, intent))
            .collect::<Result<Vec<_>>>()?;
        let new_header = picks.iter().map(|&i| header[i].clone()).collect();
        let rows = rows
            .into_iter()
            .map(|r| picks.iter().map(|&i| r[i].clone()).collect())
            .collect();
        (new_header, rows)
    };

    let header = header.iter().map(|h| format_header(h)).collect();
    Table::new(header, rows)
}

fn move_to_front<T>(mut v: Vec<T>, idx: usize) -> Vec<T> {
    let item = v.remove(idx);
    v.insert(0, item);
    v
}

/// Null, missing, empty, zero and `false` all render as the empty string.
fn or_empty(v: Option<&Value>) -> Cell {
    match v {
        Some(Value::String(s)) if !s.is_empty() => Cell::Text(s.clone()),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Cell::Number(n.clone()),
        Some(Value::Bool(true)) => Cell::from("true"),
        Some(other @ (Value::Array(_) | Value::Object(_))) => Cell::from_json(other),
        _ => Cell::blank(),
    }
}

/// Provider percentage → fraction. Missing counts as 0; unparseable text is null.
fn share_fraction(v: Option<&Value>) -> Cell {
    let pct = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(true)) => Some(1.0),
        Some(Value::Array(_) | Value::Object(_)) => None,
        _ => Some(0.0),
    };
    match pct {
        Some(p) => Cell::from_f64(p / 100.0),
        None => Cell::Null,
    }
}

fn is_own_brand(record: &serde_json::Map<String, Value>, own_brand: &str) -> bool {
    match record.get("matched_brand") {
        Some(Value::String(b)) if !b.trim().is_empty() => {
            b.to_lowercase() == own_brand.to_lowercase()
        }
        _ => false,
    }
}

/// Build the fixed 13-column universe table from named provider fields,
/// dropping rows whose matched brand is the caller's own.
pub fn project_universe(records: &[Value], own_brand: Option<&str>) -> Result<Table> {
    let own_brand = own_brand.filter(|b| !b.trim().is_empty());
    let mut rows = Vec::with_capacity(records.len());
    let mut filtered = 0usize;

    for (idx, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            AppError::SchemaMismatch(format!("universe record {} is not an object", idx))
        })?;
        if let Some(brand) = own_brand {
            if is_own_brand(obj, brand) {
                filtered += 1;
                continue;
            }
        }
        let field = |name: &str| obj.get(name);
        rows.push(vec![
            field("search_term").map(Cell::from_json).unwrap_or(Cell::Null),
            field("search_volume").map(Cell::from_json).unwrap_or(Cell::Null),
            field("level").map(Cell::from_json).unwrap_or(Cell::Null),
            or_empty(field("matched_brand")),
            or_empty(field("num_1_asin")),
            or_empty(field("num_2_asin")),
            or_empty(field("num_3_asin")),
            share_fraction(field("num_1_click_share")),
            share_fraction(field("num_2_click_share")),
            share_fraction(field("num_3_click_share")),
            share_fraction(field("num_1_conversion_share")),
            share_fraction(field("num_2_conversion_share")),
            share_fraction(field("num_3_conversion_share")),
        ]);
    }

    if filtered > 0 {
        info!(filtered, "own-brand rows removed");
    }
    Table::new(UNIVERSE_HEADER.iter().map(|h| h.to_string()).collect(), rows)
}
