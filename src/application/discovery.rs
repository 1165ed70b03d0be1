//! Company, product, persona and topic discovery.
//!
//! Every generator renders one instruction, makes one call against the
//! discovery model and pulls a JSON container out of the reply. Model
//! failures and malformed output degrade to an empty result.

use reqwest::Url;
use serde_json::{Value, json};

use crate::{
    core::{
        domain::CompanyVerification,
        error::Result,
        ports::{LlmClient, PromptRenderer, SiteProbe},
    },
    utils::{extract_json_array, extract_json_object, truncate_chars},
};

/// Items requested from the persona and topic generators.
pub const DISCOVERY_LIST_LEN: usize = 6;

/// Renders `template`, asks `llm` once and returns the first JSON array in the reply.
pub async fn ask_for_list(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    data: &Value,
) -> Result<Vec<Value>> {
    let prompt = renderer.render(template, data)?;
    match llm.invoke(&prompt).await {
        Ok(response) => Ok(extract_json_array(&response.text())),
        Err(err) => {
            tracing::warn!(provider = llm.provider(), error = %err, "discovery call failed");
            Ok(Vec::new())
        }
    }
}

pub async fn discover_products(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    company: &str,
) -> Result<Vec<Value>> {
    ask_for_list(llm, renderer, template, &json!({ "company": company })).await
}

pub async fn discover_personas(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    company: &str,
    product: &str,
) -> Result<Vec<Value>> {
    let data = json!({
        "count": DISCOVERY_LIST_LEN,
        "company": company,
        "product": product,
    });
    ask_for_list(llm, renderer, template, &data).await
}

pub async fn discover_topics(
    llm: &dyn LlmClient,
    renderer: &dyn PromptRenderer,
    template: &str,
    company: &str,
    product: &str,
    persona: &str,
) -> Result<Vec<Value>> {
    let data = json!({
        "count": DISCOVERY_LIST_LEN,
        "company": company,
        "product": product,
        "persona": persona,
    });
    ask_for_list(llm, renderer, template, &data).await
}

/// Statuses that mean "a bot was turned away" rather than "the site is broken".
const BLOCKED_STATUSES: [u16; 3] = [401, 403, 429];

/// Checks that `url` belongs to a real operating company.
///
/// The hostname must resolve and the homepage must be reachable before the
/// model is consulted; those checks fail with a negative verdict and no model
/// call.
pub async fn verify_company(
    llm: &dyn LlmClient,
    probe: &dyn SiteProbe,
    renderer: &dyn PromptRenderer,
    template: &str,
    page_chars: usize,
    url: &str,
) -> Result<CompanyVerification> {
    let Some((url, hostname)) = normalize_url(url) else {
        return Ok(CompanyVerification::invalid("Invalid URL"));
    };

    if !probe.resolves(&hostname).await {
        return Ok(CompanyVerification::invalid("Domain does not resolve"));
    }

    let page = match probe.fetch(&url).await {
        Ok(page) => page,
        Err(err) => {
            tracing::info!(%url, error = %err, "company website unreachable");
            return Ok(CompanyVerification::invalid("Website unreachable"));
        }
    };

    let page_text = if BLOCKED_STATUSES.contains(&page.status) {
        tracing::info!(%url, status = page.status, "website blocked the fetch, judging by domain");
        format!(
            "Website at {hostname} blocked automated access. \
             Judge the company from the domain name alone."
        )
    } else if page.status >= 400 {
        return Ok(CompanyVerification::invalid("Website returned error"));
    } else {
        truncate_chars(&page.body, page_chars).to_string()
    };

    let prompt = renderer.render(
        template,
        &json!({ "hostname": hostname, "page": page_text }),
    )?;
    let reply = match llm.invoke(&prompt).await {
        Ok(response) => response.text(),
        Err(err) => {
            tracing::warn!(provider = llm.provider(), error = %err, "verification call failed");
            return Ok(CompanyVerification::invalid("LLM verification failed"));
        }
    };

    Ok(read_verdict(&reply, &hostname))
}

/// Adds a scheme when missing and extracts the hostname.
fn normalize_url(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = Url::parse(&url).ok()?;
    let hostname = parsed.host_str().filter(|h| !h.is_empty())?.to_string();
    Some((url, hostname))
}

fn read_verdict(reply: &str, hostname: &str) -> CompanyVerification {
    let verdict = extract_json_object(reply);
    match verdict.get("valid").and_then(Value::as_bool) {
        Some(true) => {
            let company = verdict
                .get("company")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(hostname);
            CompanyVerification::verified(company)
        }
        Some(false) => {
            let reason = verdict
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .unwrap_or("Not a real company");
            CompanyVerification::invalid(reason)
        }
        None => CompanyVerification::invalid("LLM parse failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        templates::PromptTemplates,
        testing::{FakeLlm, FakeProbe, renderer},
    };
    use crate::core::{error::Error, ports::FetchedPage};

    #[tokio::test]
    async fn products_parse_the_array_out_of_chatty_replies() {
        let llm = FakeLlm::replying("gemini", "Sure!\n```json\n[\"Phones\", \"Tablets\"]\n```");
        let templates = PromptTemplates::default();
        let products =
            discover_products(llm.as_ref(), renderer().as_ref(), &templates.products, "Acme")
                .await
                .unwrap();
        assert_eq!(products, vec![json!("Phones"), json!("Tablets")]);
        assert!(llm.calls()[0].contains("\"Acme\""));
    }

    #[tokio::test]
    async fn malformed_or_failed_calls_yield_empty_lists() {
        let templates = PromptTemplates::default();
        let garbled = FakeLlm::replying("gemini", "I cannot help with [that");
        let out = discover_personas(
            garbled.as_ref(),
            renderer().as_ref(),
            &templates.personas,
            "Acme",
            "Phones",
        )
        .await
        .unwrap();
        assert!(out.is_empty());

        let failing = FakeLlm::failing("gemini");
        let out = discover_topics(
            failing.as_ref(),
            renderer().as_ref(),
            &templates.topics,
            "Acme",
            "Phones",
            "Founder",
        )
        .await
        .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn persona_and_topic_prompts_ask_for_six_items() {
        let llm = FakeLlm::replying("gemini", "[]");
        let templates = PromptTemplates::default();
        discover_topics(
            llm.as_ref(),
            renderer().as_ref(),
            &templates.topics,
            "Acme",
            "Phones",
            "Investor",
        )
        .await
        .unwrap();
        let prompt = &llm.calls()[0];
        assert!(prompt.contains("Generate exactly 6"));
        assert!(prompt.contains("Persona: Investor"));
    }

    #[tokio::test]
    async fn unresolvable_domain_never_reaches_the_model() {
        let llm = FakeLlm::replying("gemini", r#"{"valid": true, "company": "X"}"#);
        let probe = FakeProbe {
            resolves: false,
            page: Ok(FetchedPage {
                status: 200,
                body: String::new(),
            }),
        };
        let templates = PromptTemplates::default();
        let verdict = verify_company(
            llm.as_ref(),
            &probe,
            renderer().as_ref(),
            &templates.verify_company,
            6000,
            "http://this-domain-does-not-exist-xyz123.test",
        )
        .await
        .unwrap();
        assert_eq!(verdict, CompanyVerification::invalid("Domain does not resolve"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn verified_company_from_truncated_page() {
        let llm = FakeLlm::replying("gemini", r#"Result: {"valid": true, "company": "Acme Corp"}"#);
        let body = format!("<h1>Acme</h1>{}", "x".repeat(10_000));
        let probe = FakeProbe::page(200, &body);
        let templates = PromptTemplates::default();
        let verdict = verify_company(
            llm.as_ref(),
            &probe,
            renderer().as_ref(),
            &templates.verify_company,
            100,
            "acme.com",
        )
        .await
        .unwrap();
        assert_eq!(verdict, CompanyVerification::verified("Acme Corp"));
        let prompt = &llm.calls()[0];
        assert!(prompt.contains("Website domain: acme.com"));
        assert!(!prompt.contains(&"x".repeat(200)));
    }

    #[tokio::test]
    async fn fetch_outcomes_map_to_reasons() {
        let templates = PromptTemplates::default();
        let run = |probe: FakeProbe, llm: std::sync::Arc<FakeLlm>| {
            let template = templates.verify_company.clone();
            async move {
                verify_company(
                    llm.as_ref(),
                    &probe,
                    renderer().as_ref(),
                    &template,
                    6000,
                    "https://acme.com",
                )
                .await
                .unwrap()
            }
        };

        let llm = FakeLlm::replying("gemini", "{}");
        let unreachable = FakeProbe {
            resolves: true,
            page: Err(Error::Network("refused".into())),
        };
        assert_eq!(
            run(unreachable, llm.clone()).await,
            CompanyVerification::invalid("Website unreachable")
        );
        assert_eq!(
            run(FakeProbe::page(500, "oops"), llm.clone()).await,
            CompanyVerification::invalid("Website returned error")
        );
        assert_eq!(llm.call_count(), 0);

        assert_eq!(
            run(FakeProbe::page(200, "hello"), llm.clone()).await,
            CompanyVerification::invalid("LLM parse failure")
        );
    }

    #[tokio::test]
    async fn blocked_sites_are_judged_by_domain() {
        let llm = FakeLlm::replying("gemini", r#"{"valid": false, "reason": "Parked domain"}"#);
        let templates = PromptTemplates::default();
        let verdict = verify_company(
            llm.as_ref(),
            &FakeProbe::page(403, "Forbidden"),
            renderer().as_ref(),
            &templates.verify_company,
            6000,
            "https://acme.com/about",
        )
        .await
        .unwrap();
        assert_eq!(verdict, CompanyVerification::invalid("Parked domain"));
        assert!(llm.calls()[0].contains("blocked automated access"));
    }

    #[test]
    fn urls_without_scheme_get_https() {
        assert_eq!(
            normalize_url("acme.com/x"),
            Some(("https://acme.com/x".into(), "acme.com".into()))
        );
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("http://"), None);
    }
}
