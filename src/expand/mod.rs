// src/expand/mod.rs
//! Universe expansion with a single reseed-and-retry when the first query comes back empty.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::normalize::unwrap_records;
use crate::provider::Provider;
use crate::request::{build_seed_asin_lookup, build_seed_phrase_lookup, Intent, UniverseRequest};

/// Maximum number of seed keywords taken from the similarity lookup.
pub const FALLBACK_SEEDS: usize = 10;

/// Which expansion call produced the final records. Both states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Primary,
    Retried,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionOutcome {
    pub state: FallbackState,
    pub records: Vec<Value>,
    /// Seeds used for the retry; empty when no retry happened.
    pub seeds: Vec<String>,
}

impl ExpansionOutcome {
    fn primary(records: Vec<Value>) -> Self {
        Self {
            state: FallbackState::Primary,
            records,
            seeds: Vec::new(),
        }
    }
}

fn overview(response: &Value) -> Vec<Value> {
    unwrap_records(Intent::UniverseExpand, response).to_vec()
}

/// `search_term`, else `keyword`, of the first [`FALLBACK_SEEDS`] items.
pub fn seeds_from(response: &Value) -> Vec<String> {
    let Some(items) = response.as_array() else {
        return Vec::new();
    };
    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    items
        .iter()
        .take(FALLBACK_SEEDS)
        .filter_map(|item| text(item, "search_term").or_else(|| text(item, "keyword")))
        .collect()
}

/// Ask the provider for similar terms: by phrase when the request had keywords,
/// otherwise by its first ASIN. Any failure yields no seeds.
async fn fallback_seeds(provider: &dyn Provider, request: &UniverseRequest) -> Vec<String> {
    let lookup = if !request.keywords().is_empty() {
        build_seed_phrase_lookup(request.keywords(), FALLBACK_SEEDS as u32)
    } else if let Some(first) = request.asins().first() {
        build_seed_asin_lookup(first, FALLBACK_SEEDS as u32)
    } else {
        return Vec::new();
    };

    let lookup = match lookup {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, "could not build seed lookup");
            return Vec::new();
        }
    };

    match provider.send(&lookup).await {
        Ok(resp) => seeds_from(&resp),
        Err(e) => {
            warn!(endpoint = %lookup.endpoint, error = %e, "seed lookup failed");
            Vec::new()
        }
    }
}

/// Run the expansion. A failing primary call is an error; after that, every
/// failure degrades to an empty result.
#[instrument(level = "info", skip_all, fields(levels = request.levels))]
pub async fn expand_with_fallback(
    provider: &dyn Provider,
    request: &UniverseRequest,
) -> Result<ExpansionOutcome> {
    let primary = provider.send(&request.to_provider_request()?).await?;
    let records = overview(&primary);
    if !records.is_empty() {
        info!(rows = records.len(), "expansion returned rows");
        return Ok(ExpansionOutcome::primary(records));
    }

    info!("no results from initial request, attempting fallback");
    let seeds = fallback_seeds(provider, request).await;
    if seeds.is_empty() {
        info!("fallback produced no seeds");
        return Ok(ExpansionOutcome::primary(Vec::new()));
    }

    info!(seeds = ?seeds, "retrying expansion with fallback seeds");
    let retry = request.with_keywords(seeds.clone());
    let records = match provider.send(&retry.to_provider_request()?).await {
        Ok(resp) => overview(&resp),
        Err(e) => {
            warn!(error = %e, "fallback expansion failed");
            Vec::new()
        }
    };
    info!(rows = records.len(), "fallback expansion finished");

    Ok(ExpansionOutcome {
        state: FallbackState::Retried,
        records,
        seeds,
    })
}
