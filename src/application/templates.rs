/// Handlebars sources for every instruction the pipeline sends.
///
/// Defaults are compiled in; the config file may replace any of them.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub products: String,
    pub personas: String,
    pub topics: String,
    pub verify_company: String,
    pub prompts: String,
    pub evaluate_model: String,
    pub evaluate_combined: String,
    pub score_brand: String,
    pub score_personas: String,
    pub score_topics: String,
    pub content: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            products: include_str!("../../templates/products.hbs").into(),
            personas: include_str!("../../templates/personas.hbs").into(),
            topics: include_str!("../../templates/topics.hbs").into(),
            verify_company: include_str!("../../templates/verify_company.hbs").into(),
            prompts: include_str!("../../templates/prompts.hbs").into(),
            evaluate_model: include_str!("../../templates/evaluate_model.hbs").into(),
            evaluate_combined: include_str!("../../templates/evaluate_combined.hbs").into(),
            score_brand: include_str!("../../templates/score_brand.hbs").into(),
            score_personas: include_str!("../../templates/score_personas.hbs").into(),
            score_topics: include_str!("../../templates/score_topics.hbs").into(),
            content: include_str!("../../templates/content.hbs").into(),
        }
    }
}
