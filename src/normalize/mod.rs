// src/normalize/mod.rs
//! Provider JSON → canonical [`Table`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::request::Intent;
use crate::table::{Cell, Table};

pub mod projection;

pub use projection::{format_header, project, project_universe, ProjectionSpecs};

/// Pick the record array out of a provider response.
/// Exact-match responses wrap it in `{overview: [...]}`; everything else is the array itself.
pub fn unwrap_records(intent: Intent, response: &Value) -> &[Value] {
    let data = match (intent, response) {
        (Intent::ExactMatch | Intent::UniverseExpand, Value::Object(obj)) => {
            obj.get("overview").unwrap_or(response)
        }
        _ => response,
    };
    match data {
        Value::Array(items) => items.as_slice(),
        Value::Null => &[],
        other => {
            warn!(intent = intent.as_str(), kind = %value_kind(other), "response is not an array");
            &[]
        }
    }
}

/// Convert a provider response into a header-plus-rows table.
///
/// The header is the first record's field names in provider order. Every other
/// record must carry the same field set; values are read by name so a record
/// that merely reorders its fields still lands in the right columns.
pub fn normalize(intent: Intent, response: &Value) -> Result<Table> {
    let records = unwrap_records(intent, response);
    let Some(first) = records.first() else {
        return Ok(Table::no_data());
    };

    let first = as_object(first, 0)?;
    let header: Vec<String> = first.keys().cloned().collect();
    debug!(intent = intent.as_str(), columns = ?header, "normalized header");

    let mut rows = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let obj = as_object(record, idx)?;
        if obj.len() != header.len() || !header.iter().all(|k| obj.contains_key(k)) {
            let found: Vec<&String> = obj.keys().collect();
            return Err(AppError::SchemaMismatch(format!(
                "record {} has fields {:?}, expected {:?}",
                idx, found, header
            )));
        }
        rows.push(header.iter().map(|k| Cell::from_json(&obj[k])).collect());
    }

    Table::new(header, rows)
}

fn as_object(record: &Value, idx: usize) -> Result<&Map<String, Value>> {
    record.as_object().ok_or_else(|| {
        AppError::SchemaMismatch(format!(
            "record {} is {}, expected an object",
            idx,
            value_kind(record)
        ))
    })
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
