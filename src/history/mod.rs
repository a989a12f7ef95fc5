// src/history/mod.rs
//! Flat (period, term, volume) samples → date × keyword matrix.

use serde_json::{Number, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::Result;
use crate::table::{Cell, Table};

pub mod fill;

pub use fill::{decay_fill, DecaySource, RandomDecay};

/// At most one volume per (period, term); later samples overwrite earlier ones.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeywordSeries {
    samples: HashMap<(String, String), Option<Number>>,
    terms: Vec<String>,
    periods: BTreeSet<String>,
}

fn as_int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `"<year>-<zero-padded month>"`, which sorts chronologically as text.
pub fn period_key(year: i64, month: i64) -> String {
    format!("{:04}-{:02}", year, month)
}

impl KeywordSeries {
    /// Collect samples from `{year, month, search_term, search_volume_estimate}` records.
    /// Records without a usable period or term are skipped.
    pub fn from_records(records: &[Value]) -> Self {
        let mut series = Self::default();
        let mut seen_terms = HashSet::new();

        for (idx, record) in records.iter().enumerate() {
            let year = as_int(record.get("year"));
            let month = as_int(record.get("month"));
            let term = record
                .get("search_term")
                .and_then(Value::as_str)
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty());

            let (Some(year), Some(month), Some(term)) = (year, month, term) else {
                warn!(idx, "skipping history record without year/month/search_term");
                continue;
            };

            let volume = match record.get("search_volume_estimate") {
                Some(Value::Number(n)) => Some(n.clone()),
                Some(Value::String(s)) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .map(Number::from)
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
                }
                _ => None,
            };

            let period = period_key(year, month);
            if seen_terms.insert(term.clone()) {
                series.terms.push(term.clone());
            }
            series.periods.insert(period.clone());
            series.samples.insert((period, term), volume);
        }

        series
    }

    /// Distinct terms, first-seen order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Distinct periods, ascending.
    pub fn periods(&self) -> impl Iterator<Item = &String> {
        self.periods.iter()
    }

    pub fn get(&self, period: &str, term: &str) -> Option<&Number> {
        self.samples
            .get(&(period.to_string(), term.to_string()))
            .and_then(Option::as_ref)
    }

    /// Header `["Date", term..]`, one row per period, `""` where no sample exists
    /// and `null` where the provider reported one without a volume.
    pub fn to_rows(&self) -> (Vec<String>, Vec<Vec<Cell>>) {
        let mut header = Vec::with_capacity(self.terms.len() + 1);
        header.push("Date".to_string());
        header.extend(self.terms.iter().cloned());

        let rows = self
            .periods
            .iter()
            .map(|period| {
                let mut row = Vec::with_capacity(header.len());
                row.push(Cell::Text(period.clone()));
                row.extend(self.terms.iter().map(|term| {
                    match self.samples.get(&(period.clone(), term.clone())) {
                        Some(Some(volume)) => Cell::Number(volume.clone()),
                        Some(None) => Cell::Null,
                        None => Cell::blank(),
                    }
                }));
                row
            })
            .collect();

        (header, rows)
    }
}

/// Pivot provider history records and fill the gaps with decayed carries.
pub fn pivot(records: &[Value], decay: &mut dyn DecaySource) -> Result<Table> {
    let series = KeywordSeries::from_records(records);
    if series.terms.is_empty() {
        return Ok(Table::no_data());
    }

    let (header, mut rows) = series.to_rows();
    debug!(
        periods = rows.len(),
        terms = header.len() - 1,
        "pivoted keyword history"
    );
    decay_fill(&mut rows, decay);
    Table::new(header, rows)
}
