//! Standalone brand, persona and topic scorers.
//!
//! The model proposes relative scores; everything after that (coercion,
//! clamping, label clean-up, ordering and the visibility percentage) is
//! computed locally and is deterministic.

use serde_json::{Map, Value, json};

use crate::{
    core::{
        domain::{BrandScore, ScoreMap, coerce_score},
        error::{Error, Result},
        ports::{LlmClient, PromptRenderer},
    },
    utils::{extract_json_object, title_case, truncate_chars},
};

/// Score given to the subject brand when the model left it out.
const MISSING_BRAND_SCORE: f64 = 1.0;

/// Integer part of a model-produced score, clamped to `0..=100`.
/// Anything non-numeric counts as 0.
fn clamp_score(value: &Value) -> f64 {
    coerce_score(value).unwrap_or(0.0).trunc().clamp(0.0, 100.0)
}

/// Title-cases labels, clamps scores, makes sure `company` is present and
/// sorts highest first. Applying it to its own output changes nothing.
pub fn normalize_brand_scores(raw: &Map<String, Value>, company: &str) -> ScoreMap {
    let mut scores: ScoreMap = raw
        .iter()
        .map(|(label, value)| (title_case(label), clamp_score(value)))
        .collect();
    let subject = title_case(company);
    if !scores.contains_key(&subject) {
        scores.insert(subject, MISSING_BRAND_SCORE);
    }
    scores.sorted_descending()
}

/// Share of the subject brand in the total, as a rounded percentage.
pub fn brand_visibility(scores: &ScoreMap, company: &str) -> ScoreMap {
    let subject = title_case(company);
    let total = match scores.total() {
        t if t == 0.0 => 1.0,
        t => t,
    };
    let share = scores.get(&subject).unwrap_or(0.0) / total * 100.0;
    ScoreMap::from_iter([(subject, share.round())])
}

/// Keeps only labels from `allowed` (matched ignoring case), reported with
/// the caller's spelling. Sorted highest first.
pub fn normalize_label_scores(raw: &Map<String, Value>, allowed: &[String]) -> ScoreMap {
    let mut scores = ScoreMap::new();
    for (label, value) in raw {
        let wanted = label.trim().to_lowercase();
        match allowed.iter().find(|a| a.trim().to_lowercase() == wanted) {
            Some(canonical) => scores.insert(canonical.clone(), clamp_score(value)),
            None => tracing::debug!(%label, "dropping label the caller did not ask for"),
        }
    }
    scores.sorted_descending()
}

async fn ask_for_object(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    data: &Value,
) -> Result<Map<String, Value>> {
    let prompt = renderer.render(template, data)?;
    let response = llm.invoke(&prompt).await?;
    Ok(extract_json_object(&response.text()))
}

fn label_list(labels: &[String]) -> Result<String> {
    serde_json::to_string(labels).map_err(|err| Error::System(err.to_string()))
}

pub async fn score_brand(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    corpus_chars: usize,
    company: &str,
    category: &str,
    corpus: &str,
) -> Result<BrandScore> {
    let data = json!({
        "company": company,
        "category": category,
        "corpus": truncate_chars(corpus, corpus_chars),
    });
    let raw = ask_for_object(llm, renderer, template, &data).await?;
    let mentions = normalize_brand_scores(&raw, company);
    Ok(BrandScore {
        brand_visibility: brand_visibility(&mentions, company),
        brand_mentions: mentions,
    })
}

pub async fn score_personas(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    corpus_chars: usize,
    personas: &[String],
    corpus: &str,
) -> Result<ScoreMap> {
    let data = json!({
        "personas": label_list(personas)?,
        "corpus": truncate_chars(corpus, corpus_chars),
    });
    let raw = ask_for_object(llm, renderer, template, &data).await?;
    Ok(normalize_label_scores(&raw, personas))
}

pub async fn score_topics(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    corpus_chars: usize,
    topics: &[String],
    corpus: &str,
) -> Result<ScoreMap> {
    let data = json!({
        "topics": label_list(topics)?,
        "corpus": truncate_chars(corpus, corpus_chars),
    });
    let raw = ask_for_object(llm, renderer, template, &data).await?;
    Ok(normalize_label_scores(&raw, topics))
}
