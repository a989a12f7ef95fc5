// src/request/mod.rs
//! Turns a user intent plus raw text into the provider endpoint and JSON payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValidationError};

pub const PHRASE_RESULTS: u32 = 100;
pub const EXACT_ROW_LIMIT: u32 = 1000;
pub const ASIN_TERMS: u32 = 100;
pub const MAX_LOOKUP_ASINS: usize = 5;
pub const MAX_UNIVERSE_KEYWORDS: usize = 100;
pub const MAX_UNIVERSE_ASINS: usize = 10;
pub const MAX_HISTORY_KEYWORDS: usize = 10;
pub const DEFAULT_LEVELS: i64 = 2;
pub const MIN_KEYWORD_LENGTH: u32 = 5;
pub const DOMAIN: &str = "US";

static DISALLOWED_PHRASE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9,.\s-]").expect("phrase filter regex should compile"));

/// The user-facing search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    PhraseMatch,
    ExactMatch,
    AsinLookup,
    UniverseExpand,
    History,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PhraseMatch => "phrase-match",
            Intent::ExactMatch => "exact-match",
            Intent::AsinLookup => "asin-lookup",
            Intent::UniverseExpand => "universe-expand",
            Intent::History => "history",
        }
    }

    /// Parse the `searchType` values the finder UI sends.
    pub fn from_search_type(s: &str) -> std::result::Result<Self, ValidationError> {
        match s.trim() {
            "ai-phrase" | "phrase-match" => Ok(Intent::PhraseMatch),
            "exact-match" => Ok(Intent::ExactMatch),
            "asin-lookup" => Ok(Intent::AsinLookup),
            other => Err(ValidationError::UnknownSearchType(other.to_string())),
        }
    }
}

/// Provider endpoints, relative to the configured API base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Token,
    LikeTerms,
    KeywordFuzzyLandscape,
    AsinVectorTerms,
    KeywordFlatLandscape,
    KeywordVolumeHistory,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Token => "token",
            Endpoint::LikeTerms => "like-terms",
            Endpoint::KeywordFuzzyLandscape => "keyword-fuzzy-landscape",
            Endpoint::AsinVectorTerms => "asin-vector-terms",
            Endpoint::KeywordFlatLandscape => "keyword-flat-landscape",
            Endpoint::KeywordVolumeHistory => "keyword-volume-history",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// A fully built provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub endpoint: Endpoint,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
struct LikeTermsPayload {
    input_text: String,
    num_results: u32,
}

#[derive(Debug, Clone, Serialize)]
struct FuzzyLandscapePayload<'a> {
    keyword_match: &'a str,
    row_limit: u32,
    domain: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct AsinTermsPayload {
    asins: Vec<String>,
    num_terms: u32,
    view: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct HistoryPayload {
    keywords: Vec<String>,
}

/// Volume-model coefficients sent with every expansion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchVolumeParams {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl Default for SearchVolumeParams {
    fn default() -> Self {
        Self {
            a: 15_000_000,
            x: -0.5818,
            y: -0.0205,
        }
    }
}

/// Payload for `keyword-flat-landscape`. Kept typed so the fallback can swap the seeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniverseRequest {
    pub levels: i64,
    pub min_keyword_length: u32,
    pub return_keepa_data: bool,
    pub search_volume_params: SearchVolumeParams,
    pub domain: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asins: Option<Vec<String>>,
}

impl UniverseRequest {
    pub fn keywords(&self) -> &[String] {
        self.keywords.as_deref().unwrap_or_default()
    }

    pub fn asins(&self) -> &[String] {
        self.asins.as_deref().unwrap_or_default()
    }

    /// Same request with the keyword list replaced; every other field unchanged.
    pub fn with_keywords(&self, keywords: Vec<String>) -> Self {
        Self {
            keywords: Some(keywords),
            ..self.clone()
        }
    }

    pub fn to_provider_request(&self) -> Result<ProviderRequest> {
        Ok(ProviderRequest {
            endpoint: Endpoint::KeywordFlatLandscape,
            payload: serde_json::to_value(self)?,
        })
    }
}

/// Remove everything but letters, digits, comma, period, whitespace and hyphen,
/// then glue the comma-separated pieces back together without a separator.
pub fn sanitize_phrase(raw: &str) -> String {
    DISALLOWED_PHRASE_CHARS
        .replace_all(raw, "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// Split on newline or comma, trim, map case, drop empties, keep the first `limit`.
fn split_list(raw: &str, limit: usize, upper: bool) -> Vec<String> {
    raw.split(|c: char| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if upper {
                s.to_uppercase()
            } else {
                s.to_lowercase()
            }
        })
        .take(limit)
        .collect()
}

/// Build the request for one of the finder intents.
pub fn build_search(intent: Intent, raw: &str) -> Result<ProviderRequest> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingInput.into());
    }
    let (endpoint, payload) = match intent {
        Intent::PhraseMatch => {
            let input_text = sanitize_phrase(raw);
            if input_text.is_empty() {
                return Err(ValidationError::MissingInput.into());
            }
            (
                Endpoint::LikeTerms,
                serde_json::to_value(LikeTermsPayload {
                    input_text,
                    num_results: PHRASE_RESULTS,
                })?,
            )
        }
        Intent::ExactMatch => (
            Endpoint::KeywordFuzzyLandscape,
            serde_json::to_value(FuzzyLandscapePayload {
                keyword_match: raw,
                row_limit: EXACT_ROW_LIMIT,
                domain: DOMAIN,
            })?,
        ),
        Intent::AsinLookup => {
            let asins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_LOOKUP_ASINS)
                .map(str::to_string)
                .collect();
            if asins.is_empty() {
                return Err(ValidationError::MissingInput.into());
            }
            (Endpoint::AsinVectorTerms, asin_terms_payload(asins, ASIN_TERMS)?)
        }
        Intent::UniverseExpand | Intent::History => {
            return Err(ValidationError::UnknownSearchType(intent.as_str().to_string()).into())
        }
    };
    Ok(ProviderRequest { endpoint, payload })
}

/// Build the expansion request. Keyword and ASIN lists are each optional, not both.
pub fn build_universe(keywords: &str, asins: &str, levels: Option<i64>) -> Result<UniverseRequest> {
    let levels = levels.unwrap_or(DEFAULT_LEVELS);
    let kw_list = split_list(keywords, MAX_UNIVERSE_KEYWORDS, false);
    let asin_list = split_list(asins, MAX_UNIVERSE_ASINS, true);

    if kw_list.is_empty() && asin_list.is_empty() {
        return Err(ValidationError::MissingInput.into());
    }
    if !(1..=4).contains(&levels) {
        return Err(ValidationError::LevelsOutOfRange(levels).into());
    }

    Ok(UniverseRequest {
        levels,
        min_keyword_length: MIN_KEYWORD_LENGTH,
        return_keepa_data: false,
        search_volume_params: SearchVolumeParams::default(),
        domain: DOMAIN,
        keywords: (!kw_list.is_empty()).then_some(kw_list),
        asins: (!asin_list.is_empty()).then_some(asin_list),
    })
}

/// Build the volume-history request.
pub fn build_history(keywords: &str) -> Result<ProviderRequest> {
    let keywords = split_list(keywords, MAX_HISTORY_KEYWORDS, false);
    if keywords.is_empty() {
        return Err(ValidationError::MissingInput.into());
    }
    Ok(ProviderRequest {
        endpoint: Endpoint::KeywordVolumeHistory,
        payload: serde_json::to_value(HistoryPayload { keywords })?,
    })
}

/// Seed lookup by phrase similarity, used by the expansion fallback.
pub fn build_seed_phrase_lookup(keywords: &[String], limit: u32) -> Result<ProviderRequest> {
    Ok(ProviderRequest {
        endpoint: Endpoint::LikeTerms,
        payload: serde_json::to_value(LikeTermsPayload {
            input_text: keywords.join(" "),
            num_results: limit,
        })?,
    })
}

/// Seed lookup by ASIN similarity, used by the expansion fallback.
pub fn build_seed_asin_lookup(asin: &str, limit: u32) -> Result<ProviderRequest> {
    Ok(ProviderRequest {
        endpoint: Endpoint::AsinVectorTerms,
        payload: asin_terms_payload(vec![asin.to_string()], limit)?,
    })
}

fn asin_terms_payload(asins: Vec<String>, num_terms: u32) -> Result<Value> {
    Ok(serde_json::to_value(AsinTermsPayload {
        asins,
        num_terms,
        view: "summary",
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    fn validation(err: AppError) -> ValidationError {
        match err {
            AppError::Validation(v) => v,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn phrase_input_is_sanitized_and_joined() {
        let req = build_search(Intent::PhraseMatch, "wireless, head$phones!, ").unwrap();
        assert_eq!(req.endpoint, Endpoint::LikeTerms);
        assert_eq!(
            req.payload,
            json!({"input_text": "wirelessheadphones", "num_results": 100})
        );
    }

    #[test]
    fn phrase_keeps_spaces_periods_and_hyphens() {
        assert_eq!(sanitize_phrase("usb-c 3.0 cable"), "usb-c 3.0 cable");
        assert_eq!(sanitize_phrase("a , b"), "ab");
        assert_eq!(sanitize_phrase("héllo™"), "hllo");
    }

    #[test]
    fn exact_match_passes_input_verbatim() {
        let req = build_search(Intent::ExactMatch, "Yoga Mat!").unwrap();
        assert_eq!(req.endpoint, Endpoint::KeywordFuzzyLandscape);
        assert_eq!(
            req.payload,
            json!({"keyword_match": "Yoga Mat!", "row_limit": 1000, "domain": "US"})
        );
    }

    #[test]
    fn asin_lookup_caps_at_five() {
        let req = build_search(Intent::AsinLookup, "A1, A2,,A3 ,A4,A5,A6,A7").unwrap();
        assert_eq!(req.endpoint, Endpoint::AsinVectorTerms);
        assert_eq!(
            req.payload,
            json!({"asins": ["A1", "A2", "A3", "A4", "A5"], "num_terms": 100, "view": "summary"})
        );
    }

    #[test]
    fn asin_lookup_never_exceeds_limit() {
        for n in 0..30 {
            let raw = (0..n).map(|i| format!("B{:03}", i)).collect::<Vec<_>>().join(",");
            if let Ok(req) = build_search(Intent::AsinLookup, &raw) {
                let asins = req.payload["asins"].as_array().unwrap();
                assert!(asins.len() <= MAX_LOOKUP_ASINS);
            }
        }
    }

    #[test]
    fn blank_search_input_is_rejected() {
        let err = build_search(Intent::ExactMatch, "   ").unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingInput);
        let err = build_search(Intent::AsinLookup, " , ,").unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingInput);
    }

    #[test]
    fn universe_requires_some_input() {
        let err = build_universe("", "", Some(2)).unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingInput);
        let err = build_universe(" \n , ", "", None).unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingInput);
    }

    #[test]
    fn universe_levels_are_bounded() {
        let err = build_universe("shoes", "", Some(5)).unwrap_err();
        assert_eq!(validation(err), ValidationError::LevelsOutOfRange(5));
        let err = build_universe("shoes", "", Some(0)).unwrap_err();
        assert_eq!(validation(err), ValidationError::LevelsOutOfRange(0));
        assert_eq!(build_universe("shoes", "", None).unwrap().levels, 2);
    }

    #[test]
    fn universe_payload_shape() {
        let req = build_universe("Running Shoes\ntrail shoes", "b0abc, b0def", Some(3)).unwrap();
        let pr = req.to_provider_request().unwrap();
        assert_eq!(pr.endpoint, Endpoint::KeywordFlatLandscape);
        assert_eq!(
            pr.payload,
            json!({
                "levels": 3,
                "min_keyword_length": 5,
                "return_keepa_data": false,
                "search_volume_params": {"A": 15000000, "X": -0.5818, "Y": -0.0205},
                "domain": "US",
                "keywords": ["running shoes", "trail shoes"],
                "asins": ["B0ABC", "B0DEF"]
            })
        );
    }

    #[test]
    fn universe_omits_empty_lists_and_caps_asins() {
        let asins = (0..25).map(|i| format!("b{}", i)).collect::<Vec<_>>().join("\n");
        let req = build_universe("", &asins, None).unwrap();
        assert!(req.keywords.is_none());
        assert_eq!(req.asins().len(), MAX_UNIVERSE_ASINS);
        let payload = req.to_provider_request().unwrap().payload;
        assert!(payload.get("keywords").is_none());
    }

    #[test]
    fn universe_keywords_are_lowercased_and_capped_in_order() {
        let raw = (0..150)
            .map(|i| format!("Trail Shoe {}", i))
            .enumerate()
            .map(|(i, kw)| if i % 2 == 0 { format!("{}\n", kw) } else { format!("{},", kw) })
            .collect::<String>();
        let req = build_universe(&raw, "", None).unwrap();
        let kws = req.keywords();
        assert_eq!(kws.len(), MAX_UNIVERSE_KEYWORDS);
        assert_eq!(kws.len(), 100);
        assert_eq!(kws[0], "trail shoe 0");
        assert_eq!(kws[99], "trail shoe 99");
        assert!(kws.iter().all(|k| k.chars().all(|c| !c.is_uppercase())));
        let expected: Vec<String> = (0..100).map(|i| format!("trail shoe {}", i)).collect();
        assert_eq!(kws, expected.as_slice());
    }

    #[test]
    fn with_keywords_leaves_everything_else() {
        let req = build_universe("", "B01", Some(4)).unwrap();
        let retry = req.with_keywords(vec!["seed".into()]);
        assert_eq!(retry.keywords(), ["seed".to_string()]);
        assert_eq!(retry.asins, req.asins);
        assert_eq!(retry.levels, 4);
    }

    #[test]
    fn history_keywords_are_normalized_and_capped() {
        let raw = (0..15).map(|i| format!(" KW{} ", i)).collect::<Vec<_>>().join(",");
        let req = build_history(&raw).unwrap();
        assert_eq!(req.endpoint, Endpoint::KeywordVolumeHistory);
        let kws = req.payload["keywords"].as_array().unwrap();
        assert_eq!(kws.len(), MAX_HISTORY_KEYWORDS);
        assert_eq!(kws[0], json!("kw0"));

        let err = build_history("\n,\n").unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingInput);
    }

    #[test]
    fn seed_lookups() {
        let req = build_seed_phrase_lookup(&["a b".into(), "c".into()], 10).unwrap();
        assert_eq!(req.payload, json!({"input_text": "a b c", "num_results": 10}));
        let req = build_seed_asin_lookup("B0X", 10).unwrap();
        assert_eq!(
            req.payload,
            json!({"asins": ["B0X"], "num_terms": 10, "view": "summary"})
        );
    }

    #[test]
    fn search_types_map_to_intents() {
        assert_eq!(Intent::from_search_type("ai-phrase").unwrap(), Intent::PhraseMatch);
        assert_eq!(Intent::from_search_type("asin-lookup").unwrap(), Intent::AsinLookup);
        assert_eq!(
            Intent::from_search_type("bogus").unwrap_err().code(),
            "unknown-search-type"
        );
    }
}
