//! CLI inbound adapter that translates command-line arguments into application service calls.

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

pub use crate::cli::*;

use crate::core::{
    domain::{
        AnalysisRequest, BrandScoreRequest, CompanyVerifyRequest, ContentRequest, PersonaRequest,
        PersonaScoreRequest, ProductRequest, ReportRequest, TopicRequest, TopicScoreRequest,
    },
    ports::IntelService,
};

/// CLI adapter that consumes the `IntelService` and prints JSON results.
pub struct CliAdapter {
    service: Arc<dyn IntelService>,
}

impl CliAdapter {
    pub fn new(service: Arc<dyn IntelService>) -> Self {
        Self { service }
    }

    /// Execute a CLI command by dispatching to the appropriate service method.
    pub async fn execute(&self, command: Commands) -> Result<()> {
        let output = self.run(command).await?;
        println!("{output}");
        Ok(())
    }

    /// Runs `command` and returns its pretty-printed JSON result.
    pub async fn run(&self, command: Commands) -> Result<String> {
        match command {
            Commands::VerifyCompany(args) => {
                let request = CompanyVerifyRequest { url: args.url };
                to_json(&self.service.verify_company(request).await?)
            }
            Commands::Products(args) => {
                let request = ProductRequest {
                    company: args.company,
                };
                to_json(&self.service.products(request).await?)
            }
            Commands::Personas(args) => {
                let request = PersonaRequest {
                    company: args.company,
                    product: args.product,
                };
                to_json(&self.service.personas(request).await?)
            }
            Commands::Topics(args) => {
                let request = TopicRequest {
                    company: args.company,
                    product: args.product,
                    persona: args.persona,
                };
                to_json(&self.service.topics(request).await?)
            }
            Commands::Prompts(args) => {
                let request = AnalysisRequest {
                    models: args.models,
                    num_prompts: args.num_prompts,
                    topic: args.topic,
                    persona: args.persona,
                    product: args.product,
                    brand: args.brand,
                };
                to_json(&self.service.prompts(request).await?)
            }
            Commands::Report(args) => {
                let raw = read_input(&args.input)?;
                let request: ReportRequest = serde_json::from_str(&raw).with_context(|| {
                    format!("{} is not a valid report request", args.input.display())
                })?;
                to_json(&self.service.report(request).await?)
            }
            Commands::Score(ScoreCommand::Brand(args)) => {
                let request = BrandScoreRequest {
                    company: args.company,
                    category: args.category,
                    corpus: read_input(&args.corpus)?,
                };
                to_json(&self.service.score_brand(request).await?)
            }
            Commands::Score(ScoreCommand::Personas(args)) => {
                let request = PersonaScoreRequest {
                    personas: args.labels,
                    corpus: read_input(&args.corpus)?,
                };
                to_json(&self.service.score_personas(request).await?)
            }
            Commands::Score(ScoreCommand::Topics(args)) => {
                let request = TopicScoreRequest {
                    topics: args.labels,
                    corpus: read_input(&args.corpus)?,
                };
                to_json(&self.service.score_topics(request).await?)
            }
            Commands::Content(args) => {
                let request = ContentRequest { topic: args.topic };
                to_json(&self.service.generate_content(request).await?)
            }
            Commands::Serve(_) => {
                // Serve needs the composition root to own the listener.
                Err(anyhow!(
                    "Serve command should be handled by the composition root"
                ))
            }
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}
