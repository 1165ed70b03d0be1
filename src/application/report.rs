//! Multi-model execution and evaluation.
//!
//! A report runs in three stages. First every selected model answers its
//! prompts, with models running concurrently and prompts within one model in
//! submission order. Then the evaluator scores each model's answers and,
//! once, all answers together. Finally everything is assembled into a
//! [`Report`]. The combined evaluation never starts before every answer set
//! is in.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::json;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    application::templates::PromptTemplates,
    core::{
        config::ExecutionFailurePolicy,
        domain::{EvaluationResult, PromptItem, Report, ReportRequest},
        error::{Error, Result},
        ports::{LlmClient, LlmRegistry, PromptRenderer},
    },
    utils::extract_json_object,
};

/// Groups prompts by the model that should answer them, in `models` order.
///
/// Tagged prompts go to their model only and are dropped when that model is
/// not selected. Untagged prompts are copied into every group.
pub fn partition_prompts(models: &[String], prompts: &[PromptItem]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> =
        models.iter().map(|model| (model.clone(), Vec::new())).collect();
    for item in prompts {
        match item {
            PromptItem::Broadcast(prompt) => {
                for (_, group) in groups.iter_mut() {
                    group.push(prompt.clone());
                }
            }
            PromptItem::Tagged { model, prompt } => {
                let owner = crate::core::domain::normalize_model_key(model);
                match groups.iter_mut().find(|(key, _)| *key == owner) {
                    Some((_, group)) => group.push(prompt.clone()),
                    None => tracing::debug!(model = %owner, "ignoring prompt for unselected model"),
                }
            }
        }
    }
    groups
}

/// Runs `prompts` against `client` one at a time, keeping their order.
pub async fn collect_answers(
    client: &dyn LlmClient,
    prompts: &[String],
    policy: ExecutionFailurePolicy,
) -> Result<Vec<String>> {
    let mut answers = Vec::with_capacity(prompts.len());
    for (index, prompt) in prompts.iter().enumerate() {
        match client.invoke(prompt).await {
            Ok(response) => answers.push(response.text()),
            Err(err) => match policy {
                ExecutionFailurePolicy::Abort => return Err(err),
                ExecutionFailurePolicy::Isolate => {
                    tracing::warn!(
                        provider = client.provider(),
                        prompt_index = index,
                        answered = answers.len(),
                        error = %err,
                        "model failed, keeping the answers collected so far"
                    );
                    break;
                }
            },
        }
    }
    Ok(answers)
}

/// Score given to the subject brand when the evaluator left it out.
const MISSING_BRAND_SCORE: f64 = 1.0;

/// Score given to a selected model the combined evaluation did not rate,
/// the floor of the range the evaluator is asked to use.
const UNRATED_MODEL_SCORE: f64 = 40.0;

/// Asks the evaluator once. Failures and malformed replies give an empty result.
async fn evaluate(evaluator: &dyn LlmClient, label: &str, instruction: &str) -> EvaluationResult {
    match evaluator.invoke(instruction).await {
        Ok(response) => {
            let object = extract_json_object(&response.text());
            if object.is_empty() {
                tracing::warn!(target_model = label, "evaluator reply held no JSON object");
            }
            EvaluationResult::from_object(&object)
        }
        Err(err) => {
            tracing::warn!(target_model = label, error = %err, "evaluation failed");
            EvaluationResult::default()
        }
    }
}

/// Which evaluation a finished task belongs to.
enum Slot {
    Model(String),
    Combined,
}

#[derive(Clone)]
pub struct ReportPipeline {
    registry: Arc<dyn LlmRegistry>,
    renderer: Arc<dyn PromptRenderer>,
    templates: Arc<PromptTemplates>,
    policy: ExecutionFailurePolicy,
}

impl ReportPipeline {
    pub fn new(
        registry: Arc<dyn LlmRegistry>,
        renderer: Arc<dyn PromptRenderer>,
        templates: Arc<PromptTemplates>,
        policy: ExecutionFailurePolicy,
    ) -> Self {
        Self {
            registry,
            renderer,
            templates,
            policy,
        }
    }

    /// Builds a report, scoring with the provider named by `evaluator`.
    pub async fn run(&self, request: &ReportRequest, evaluator: &str) -> Result<Report> {
        let models = request.model_keys();
        let span = tracing::info_span!(
            "report",
            request_id = %Uuid::new_v4(),
            evaluator = %evaluator,
            models = models.len()
        );
        self.run_inner(request, models, evaluator)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request: &ReportRequest,
        models: Vec<String>,
        evaluator_key: &str,
    ) -> Result<Report> {
        if models.is_empty() {
            tracing::info!("no models selected, returning an empty report");
            return Ok(Report::default());
        }

        let evaluator = self.registry.acquire(evaluator_key)?;
        let groups = partition_prompts(&models, &request.prompts);
        let mut clients = Vec::with_capacity(groups.len());
        for (model, prompts) in groups {
            let client = self.registry.acquire(&model)?;
            clients.push((model, client, prompts));
        }

        let answers = self.execute(clients).await?;
        tracing::info!(
            answers = answers.iter().map(|(_, a)| a.len()).sum::<usize>(),
            "execution finished"
        );

        self.evaluate_all(request, evaluator, answers).await
    }

    async fn execute(
        &self,
        clients: Vec<(String, Arc<dyn LlmClient>, Vec<String>)>,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let mut slots: Vec<Option<(String, Vec<String>)>> = vec![None; clients.len()];
        let mut tasks = JoinSet::new();
        for (index, (model, client, prompts)) in clients.into_iter().enumerate() {
            let policy = self.policy;
            tasks.spawn(
                async move {
                    tracing::debug!(%model, prompts = prompts.len(), "executing prompts");
                    let answers = collect_answers(client.as_ref(), &prompts, policy).await;
                    (index, model, answers)
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, model, answers) =
                joined.map_err(|err| Error::System(format!("execution task failed: {err}")))?;
            let answers = answers.inspect_err(|err| {
                tracing::error!(%model, error = %err, "execution failed, aborting report");
            })?;
            slots[index] = Some((model, answers));
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn evaluate_all(
        &self,
        request: &ReportRequest,
        evaluator: Arc<dyn LlmClient>,
        answers: Vec<(String, Vec<String>)>,
    ) -> Result<Report> {
        let personas = request.personas.join(", ");
        let topics = request.topics.join(", ");

        let mut instructions = Vec::with_capacity(answers.len() + 1);
        for (model, model_answers) in &answers {
            let data = json!({
                "brand": request.brand,
                "product": request.product,
                "personas": personas,
                "topics": topics,
                "model": model,
                "answers": model_answers,
            });
            let instruction = self.renderer.render(&self.templates.evaluate_model, &data)?;
            instructions.push((Slot::Model(model.clone()), instruction));
        }

        let outputs: Vec<_> = answers
            .iter()
            .map(|(model, model_answers)| json!({ "model": model, "answers": model_answers }))
            .collect();
        let model_list = answers
            .iter()
            .map(|(model, _)| model.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let combined_data = json!({
            "brand": request.brand,
            "product": request.product,
            "personas": personas,
            "topics": topics,
            "outputs": outputs,
            "model_list": model_list,
        });
        let combined_instruction = self
            .renderer
            .render(&self.templates.evaluate_combined, &combined_data)?;
        instructions.push((Slot::Combined, combined_instruction));

        let mut tasks = JoinSet::new();
        for (slot, instruction) in instructions {
            let evaluator = evaluator.clone();
            tasks.spawn(
                async move {
                    let label = match &slot {
                        Slot::Model(model) => model.as_str(),
                        Slot::Combined => "combined",
                    };
                    let result = evaluate(evaluator.as_ref(), label, &instruction).await;
                    (slot, result)
                }
                .in_current_span(),
            );
        }

        let models: Vec<String> = answers.into_iter().map(|(model, _)| model).collect();
        let mut per_model = BTreeMap::new();
        let mut combined = EvaluationResult::default();
        while let Some(joined) = tasks.join_next().await {
            let (slot, result) =
                joined.map_err(|err| Error::System(format!("evaluation task failed: {err}")))?;
            let result = result.with_subject_brand(&request.brand, MISSING_BRAND_SCORE);
            match slot {
                Slot::Model(model) => {
                    per_model.insert(model, result.without_model_visibility());
                }
                Slot::Combined => {
                    let model_visibility = result
                        .model_visibility
                        .as_ref()
                        .map(|scores| scores.restricted_to(&models, UNRATED_MODEL_SCORE));
                    combined = EvaluationResult {
                        model_visibility,
                        ..result
                    };
                }
            }
        }

        Ok(Report {
            per_model,
            combined,
        })
    }
}
