use serde_json::json;

use crate::core::{
    domain::ContentPiece,
    error::{Error, Result},
    ports::{LlmClient, PromptRenderer},
};

pub const BLOG_CONTENT_TYPE: &str = "blog";

/// Writes a long-form blog article about `topic`.
pub async fn generate_content(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    topic: &str,
) -> Result<ContentPiece> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(Error::InvalidRequest("topic must not be empty".into()));
    }
    let prompt = renderer.render(template, &json!({ "topic": topic }))?;
    let response = llm.invoke(&prompt).await?;
    tracing::info!(provider = llm.provider(), topic, "generated content");
    Ok(ContentPiece {
        topic: topic.to_string(),
        content_type: BLOG_CONTENT_TYPE.to_string(),
        content: response.text(),
    })
}
