//! Request, response and scoring types shared by every layer.

use std::{collections::BTreeMap, fmt, ops::RangeInclusive};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_json::{Map, Value};

use crate::core::error::{Error, Result};

/// Allowed values for `num_prompts`.
pub const NUM_PROMPTS_RANGE: RangeInclusive<usize> = 1..=10;

/// Canonical form of a provider key: trimmed and lower-cased.
pub fn normalize_model_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Normalizes keys and drops blanks and duplicates while keeping first-seen order.
pub fn normalize_model_keys(keys: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let key = normalize_model_key(key);
        if !key.is_empty() && !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

/// Best-effort numeric reading of an LLM-produced score.
pub fn coerce_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Label → score mapping that keeps insertion order.
///
/// Serialized as a JSON object. Integral scores are written as integers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    entries: Vec<(String, f64)>,
}

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON object, skipping entries whose value is not numeric.
    /// Returns `None` when `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(
            object
                .iter()
                .filter_map(|(label, score)| coerce_score(score).map(|s| (label.clone(), s)))
                .collect(),
        )
    }

    /// Inserts or replaces `label`, keeping the original position on replace.
    pub fn insert(&mut self, label: impl Into<String>, score: f64) {
        let label = label.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == label) {
            slot.1 = score;
        } else {
            self.entries.push((label, score));
        }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| *v)
    }

    pub fn contains_key(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Like [`ScoreMap::contains_key`], ignoring case and surrounding whitespace.
    pub fn contains_label(&self, label: &str) -> bool {
        let wanted = label.trim().to_lowercase();
        self.labels().any(|l| l.trim().to_lowercase() == wanted)
    }

    /// Exactly the labels in `allowed`, spelled as there. Entries matching no
    /// allowed label are dropped; allowed labels with no entry get
    /// `missing_score`. Sorted highest first.
    pub fn restricted_to(&self, allowed: &[String], missing_score: f64) -> Self {
        let mut scores = ScoreMap::new();
        for (label, score) in self.iter() {
            let wanted = label.trim().to_lowercase();
            if let Some(canonical) = allowed.iter().find(|a| a.trim().to_lowercase() == wanted) {
                scores.insert(canonical.clone(), score);
            }
        }
        for label in allowed {
            if !scores.contains_key(label) {
                scores.insert(label.clone(), missing_score);
            }
        }
        scores.sorted_descending()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Highest score first. Stable, so ties keep their relative order.
    pub fn sort_descending(&mut self) {
        self.entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    pub fn sorted_descending(mut self) -> Self {
        self.sort_descending();
        self
    }
}

impl FromIterator<(String, f64)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut map = ScoreMap::new();
        for (label, score) in iter {
            map.insert(label, score);
        }
        map
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, score) in &self.entries {
            if score.fract() == 0.0 && score.abs() < i64::MAX as f64 {
                map.serialize_entry(label, &(*score as i64))?;
            } else {
                map.serialize_entry(label, score)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScoreMapVisitor;

        impl<'de> Visitor<'de> for ScoreMapVisitor {
            type Value = ScoreMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of label to score")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<ScoreMap, A::Error> {
                let mut map = ScoreMap::new();
                while let Some((label, value)) = access.next_entry::<String, Value>()? {
                    if let Some(score) = coerce_score(&value) {
                        map.insert(label, score);
                    }
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ScoreMapVisitor)
    }
}

/// Structured scores produced by one evaluation call.
///
/// A section is `None` when the evaluator omitted it (or produced something
/// that was not an object); an evaluation that failed entirely is all `None`
/// and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_visibility: Option<ScoreMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_mentions: Option<ScoreMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_visibility: Option<ScoreMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_visibility: Option<ScoreMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_visibility: Option<ScoreMap>,
}

impl EvaluationResult {
    /// Picks the known sections out of a parsed evaluator object and sorts
    /// each one highest-score-first. Unknown keys are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let section = |name: &str| {
            object
                .get(name)
                .and_then(ScoreMap::from_value)
                .map(ScoreMap::sorted_descending)
        };
        Self {
            brand_visibility: section("brand_visibility"),
            brand_mentions: section("brand_mentions"),
            persona_visibility: section("persona_visibility"),
            topic_visibility: section("topic_visibility"),
            model_visibility: section("model_visibility"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brand_visibility.is_none()
            && self.brand_mentions.is_none()
            && self.persona_visibility.is_none()
            && self.topic_visibility.is_none()
            && self.model_visibility.is_none()
    }

    /// Lists `brand` in each brand section the evaluator returned, at `score`
    /// where it was left out. Absent sections stay absent.
    pub fn with_subject_brand(mut self, brand: &str, score: f64) -> Self {
        let brand = brand.trim();
        if brand.is_empty() {
            return self;
        }
        for section in [&mut self.brand_visibility, &mut self.brand_mentions]
            .into_iter()
            .flatten()
        {
            if !section.contains_label(brand) {
                section.insert(brand, score);
                section.sort_descending();
            }
        }
        self
    }

    /// Per-model results never carry a model comparison.
    pub fn without_model_visibility(mut self) -> Self {
        self.model_visibility = None;
        self
    }
}

/// Terminal artifact of the report pipeline. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub per_model: BTreeMap<String, EvaluationResult>,
    pub combined: EvaluationResult,
}

// ---------------------------------------------------------------------------
// Prompts and analysis
// ---------------------------------------------------------------------------

/// A prompt submitted for execution: either owned by one model or broadcast to all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptItem {
    Tagged { model: String, prompt: String },
    Broadcast(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub models: Vec<String>,
    #[serde(default = "default_num_prompts")]
    pub num_prompts: usize,
    pub topic: String,
    #[serde(deserialize_with = "first_of_one_or_many")]
    pub persona: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub brand: String,
}

fn default_num_prompts() -> usize {
    3
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<()> {
        if !NUM_PROMPTS_RANGE.contains(&self.num_prompts) {
            return Err(Error::InvalidRequest(format!(
                "num_prompts must be between {} and {} (got {})",
                NUM_PROMPTS_RANGE.start(),
                NUM_PROMPTS_RANGE.end(),
                self.num_prompts
            )));
        }
        if self.model_keys().is_empty() {
            return Err(Error::InvalidRequest(
                "at least one model must be selected".into(),
            ));
        }
        Ok(())
    }

    pub fn model_keys(&self) -> Vec<String> {
        normalize_model_keys(&self.models)
    }
}

/// Prompts produced by one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrompts {
    pub model: String,
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptBatch {
    pub total_prompts: usize,
    pub results: Vec<ModelPrompts>,
}

impl PromptBatch {
    pub fn from_results(results: Vec<ModelPrompts>) -> Self {
        Self {
            total_prompts: results.iter().map(|r| r.prompts.len()).sum(),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub brand: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub personas: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<PromptItem>,
    #[serde(default)]
    pub models: Vec<String>,
}

impl ReportRequest {
    pub fn model_keys(&self) -> Vec<String> {
        normalize_model_keys(&self.models)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyVerifyRequest {
    pub url: String,
}

/// Outcome of company verification. Never an error: failures become `valid: false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyVerification {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CompanyVerification {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            company: None,
            reason: Some(reason.into()),
        }
    }

    pub fn verified(company: impl Into<String>) -> Self {
        Self {
            valid: true,
            company: Some(company.into()),
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRequest {
    pub company: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRequest {
    pub company: String,
    #[serde(alias = "category")]
    pub product: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRequest {
    pub company: String,
    pub product: String,
    pub persona: String,
}

// ---------------------------------------------------------------------------
// Scoring, content, selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandScoreRequest {
    pub company: String,
    #[serde(default)]
    pub category: String,
    pub corpus: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandScore {
    pub brand_visibility: ScoreMap,
    pub brand_mentions: ScoreMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaScoreRequest {
    pub personas: Vec<String>,
    pub corpus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicScoreRequest {
    pub topics: Vec<String>,
    pub corpus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPiece {
    pub topic: String,
    pub content_type: String,
    pub content: String,
}

/// Which provider evaluates and scores. Snapshotted once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub evaluator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectModelRequest {
    pub model: String,
}

fn first_of_one_or_many<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => value,
        OneOrMany::Many(values) => values.into_iter().next().unwrap_or_default(),
    })
}
