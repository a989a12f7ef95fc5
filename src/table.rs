// src/table.rs

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{AppError, Result};

/// Header text of the single-row table returned when there is nothing to show.
pub const NO_DATA: &str = "NO DATA";

/// One cell of a [`Table`]. Strings and numbers stay distinct on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(Number),
    Text(String),
    Null,
}

impl Cell {
    /// The empty string used for missing time-series samples.
    pub fn blank() -> Self {
        Cell::Text(String::new())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }

    /// Map a provider value onto a cell. Booleans and nested values are rendered as text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Whole values are emitted as integers so `0.0` serialises as `0`.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
            return Cell::Number(Number::from(v as i64));
        }
        Number::from_f64(v).map(Cell::Number).unwrap_or(Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => n.as_f64(),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Null => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Number(Number::from(v))
    }
}

/// Header row plus data rows. Every data row has the header's length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, rejecting ragged rows. No rows collapses to the sentinel.
    pub fn new(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if rows.is_empty() {
            return Ok(Self::no_data());
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != header.len())
        {
            return Err(AppError::SchemaMismatch(format!(
                "row {} has {} cells, header has {}",
                idx,
                row.len(),
                header.len()
            )));
        }
        Ok(Self { header, rows })
    }

    pub fn no_data() -> Self {
        Self {
            header: vec![NO_DATA.to_string()],
            rows: Vec::new(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.rows.is_empty() && self.header.len() == 1 && self.header[0] == NO_DATA
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.header, self.rows)
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len() + 1))?;
        seq.serialize_element(&self.header)?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Table {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut raw: Vec<Vec<Cell>> = Vec::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(de::Error::custom("table has no header row"));
        }
        let rows = raw.split_off(1);
        let header = raw
            .remove(0)
            .into_iter()
            .map(|c| match c {
                Cell::Text(s) => Ok(s),
                other => Err(de::Error::custom(format!(
                    "header cell must be a string, got {:?}",
                    other
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Table::new(header, rows).map_err(de::Error::custom)
    }
}
