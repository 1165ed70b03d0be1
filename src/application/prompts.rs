use serde_json::json;

use crate::{
    core::{
        domain::{AnalysisRequest, ModelPrompts, PromptBatch},
        error::Result,
        ports::{LlmClient, LlmRegistry, PromptRenderer},
    },
    utils::extract_string_list,
};

const DEFAULT_HINT: &str = "analytical thinking";

/// Thinking style suggested for a persona. Matching ignores case and padding.
pub fn persona_hint(persona: &str) -> &'static str {
    match persona.trim().to_lowercase().as_str() {
        "founder" => "strategy, market positioning, long-term vision",
        "product manager" => "feature tradeoffs, roadmap, user value",
        "marketing analyst" => "market demand, segmentation, messaging",
        "technical lead" => "architecture, scalability, system risks",
        "investor" => "ROI, growth potential, competitive advantage",
        "designer" => "UX clarity, usability, accessibility",
        "researcher" => "evidence, metrics, validation methodology",
        _ => DEFAULT_HINT,
    }
}

/// Context shared by every model's prompt-generation call.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    pub topic: &'a str,
    pub persona: &'a str,
    pub product: &'a str,
    pub brand: &'a str,
}

/// Asks `llm` once for `count` analytical prompts.
///
/// The count is only requested, not enforced. Malformed replies give an
/// empty list; a failing call is returned as an error.
pub async fn generate_prompts(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    context: &PromptContext<'_>,
    count: usize,
) -> Result<Vec<String>> {
    let persona = context.persona.trim().to_lowercase();
    let data = json!({
        "count": count,
        "topic": context.topic,
        "persona": persona,
        "product": context.product.trim(),
        "brand": context.brand.trim(),
        "hint": persona_hint(&persona),
    });
    let prompt = renderer.render(template, &data)?;
    let response = llm.invoke(&prompt).await?;
    Ok(extract_string_list(&response.text()))
}

/// Generates prompts with each selected model, one model after another.
pub async fn run_analysis(
    registry: &dyn LlmRegistry,
    renderer: &dyn PromptRenderer,
    template: &str,
    request: &AnalysisRequest,
) -> Result<PromptBatch> {
    request.validate()?;
    let models = request.model_keys();
    // Resolve every model before spending tokens on any of them.
    let clients = models
        .iter()
        .map(|model| registry.acquire(model).map(|client| (model.clone(), client)))
        .collect::<Result<Vec<_>>>()?;

    let context = PromptContext {
        topic: &request.topic,
        persona: &request.persona,
        product: &request.product,
        brand: &request.brand,
    };

    let mut results = Vec::with_capacity(clients.len());
    for (model, client) in clients {
        let prompts =
            generate_prompts(client.as_ref(), renderer, template, &context, request.num_prompts)
                .await?;
        tracing::info!(%model, prompts = prompts.len(), "generated prompts");
        results.push(ModelPrompts { model, prompts });
    }
    Ok(PromptBatch::from_results(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        templates::PromptTemplates,
        testing::{FakeLlm, FakeRegistry, renderer},
    };
    use crate::core::error::Error;

    fn request(models: &[&str], num_prompts: usize) -> AnalysisRequest {
        AnalysisRequest {
            models: models.iter().map(|m| m.to_string()).collect(),
            num_prompts,
            topic: "market trends".into(),
            persona: "Founder".into(),
            product: String::new(),
            brand: "Acme Corp".into(),
        }
    }

    #[test]
    fn hints_fall_back_to_analytical_thinking() {
        assert_eq!(
            persona_hint("  Technical Lead "),
            "architecture, scalability, system risks"
        );
        assert_eq!(persona_hint("astronaut"), "analytical thinking");
    }

    #[tokio::test]
    async fn forwards_count_and_context_into_the_instruction() {
        let llm = FakeLlm::replying("openai", r#"["Q1?", 7, " ", "Q2?"]"#);
        let context = PromptContext {
            topic: "market trends",
            persona: "Investor",
            product: "Phones",
            brand: "",
        };
        let prompts = generate_prompts(
            llm.as_ref(),
            renderer().as_ref(),
            &PromptTemplates::default().prompts,
            &context,
            4,
        )
        .await
        .unwrap();
        assert_eq!(prompts, vec!["Q1?".to_string(), "Q2?".to_string()]);

        let instruction = &llm.calls()[0];
        assert!(instruction.contains("Generate exactly 4"));
        assert!(instruction.contains("ROI, growth potential"));
        assert!(instruction.contains("Product / category: \"Phones\""));
        assert!(!instruction.contains("Brand under study"));
    }

    #[tokio::test]
    async fn malformed_reply_degrades_to_empty() {
        let llm = FakeLlm::replying("openai", "no json here");
        let prompts = generate_prompts(
            llm.as_ref(),
            renderer().as_ref(),
            &PromptTemplates::default().prompts,
            &PromptContext::default(),
            3,
        )
        .await
        .unwrap();
        assert!(prompts.is_empty());
    }

    #[tokio::test]
    async fn one_call_per_model_in_request_order() {
        let openai = FakeLlm::replying("openai", r#"["A1", "A2", "A3"]"#);
        let gemini = FakeLlm::replying("gemini", r#"["G1", "G2"]"#);
        let registry = FakeRegistry::new(vec![openai.clone(), gemini.clone()]);

        let batch = run_analysis(
            &registry,
            renderer().as_ref(),
            &PromptTemplates::default().prompts,
            &request(&["OpenAI", "gemini", "openai "], 3),
        )
        .await
        .unwrap();

        assert_eq!(batch.total_prompts, 5);
        let models: Vec<_> = batch.results.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(models, ["openai", "gemini"]);
        assert_eq!(openai.call_count(), 1);
        assert_eq!(gemini.call_count(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_requests_before_calling_models() {
        let openai = FakeLlm::replying("openai", "[]");
        let registry = FakeRegistry::new(vec![openai.clone()]);
        let template = PromptTemplates::default().prompts;

        let err = run_analysis(&registry, renderer().as_ref(), &template, &request(&["openai"], 11))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = run_analysis(
            &registry,
            renderer().as_ref(),
            &template,
            &request(&["openai", "claude"], 3),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(ref key) if key == "claude"));
        assert_eq!(openai.call_count(), 0);
    }
}
