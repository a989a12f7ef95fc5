// src/service.rs
//! One entry point per user operation: build, call, normalize, project.

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::expand::{expand_with_fallback, FallbackState};
use crate::history::{self, DecaySource, RandomDecay};
use crate::normalize::{self, project, project_universe, unwrap_records, ProjectionSpecs};
use crate::provider::{HttpProvider, Provider, TokenAuth};
use crate::request::{build_history, build_search, build_universe, Intent};
use crate::table::Table;

pub struct KeywordService {
    provider: Arc<dyn Provider>,
    specs: ProjectionSpecs,
    decay_seed: Option<u64>,
}

impl KeywordService {
    pub fn new(provider: Arc<dyn Provider>, specs: ProjectionSpecs) -> Self {
        Self {
            provider,
            specs,
            decay_seed: None,
        }
    }

    /// Wire the live provider from process settings. Missing credentials are
    /// only reported when a call is made.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let specs = ProjectionSpecs::load(settings.projections_file.as_deref())?;
        if !settings.has_credentials() {
            warn!("BC_CLIENT_ID / BC_CLIENT_SECRET not set; provider calls will fail");
        }

        let client = Client::new();
        let auth = TokenAuth::new(
            client.clone(),
            settings.api_base.clone(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
            settings.token_ttl,
        );
        let provider = HttpProvider::new(client, settings.api_base.clone(), Arc::new(auth));
        Ok(Self::new(Arc::new(provider), specs))
    }

    /// Make the history gap fill reproducible.
    pub fn with_decay_seed(mut self, seed: u64) -> Self {
        self.decay_seed = Some(seed);
        self
    }

    fn decay_source(&self) -> Box<dyn DecaySource> {
        match self.decay_seed {
            Some(seed) => Box::new(RandomDecay::seeded(seed)),
            None => Box::new(RandomDecay::from_entropy()),
        }
    }

    /// Phrase, exact-match or ASIN lookup.
    #[instrument(level = "info", skip(self, input), fields(intent = intent.as_str()))]
    pub async fn search(&self, intent: Intent, input: &str) -> Result<Table> {
        let request = build_search(intent, input)?;
        debug!(endpoint = %request.endpoint, payload = %request.payload, "built request");

        let response = self.provider.send(&request).await?;
        let table = normalize::normalize(intent, &response)?;
        let table = project(intent, table, &self.specs)?;
        info!(rows = table.len(), "search finished");
        Ok(table)
    }

    /// Keyword universe expansion with the one-shot reseed fallback.
    #[instrument(level = "info", skip(self, keywords, asins))]
    pub async fn expand(
        &self,
        keywords: &str,
        asins: &str,
        levels: Option<i64>,
        own_brand: Option<&str>,
    ) -> Result<Table> {
        let request = build_universe(keywords, asins, levels)?;
        debug!(request = ?request, "built universe request");

        let outcome = expand_with_fallback(self.provider.as_ref(), &request).await?;
        if outcome.state == FallbackState::Retried {
            info!(seeds = outcome.seeds.len(), "used fallback seeds");
        }
        let table = project_universe(&outcome.records, own_brand)?;
        info!(rows = table.len(), "expansion finished");
        Ok(table)
    }

    /// Monthly volume history, pivoted to date × keyword.
    #[instrument(level = "info", skip(self, keywords))]
    pub async fn history(&self, keywords: &str) -> Result<Table> {
        let request = build_history(keywords)?;
        debug!(payload = %request.payload, "built history request");

        let response = self.provider.send(&request).await?;
        let table = self.pivot(&response)?;
        info!(rows = table.len(), "history finished");
        Ok(table)
    }

    fn pivot(&self, response: &Value) -> Result<Table> {
        let records = unwrap_records(Intent::History, response);
        let mut decay = self.decay_source();
        history::pivot(records, &mut *decay)
    }
}
