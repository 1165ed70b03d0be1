use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Geointel CLI definition.
#[derive(Debug, Parser)]
#[command(name = "geointel")]
#[command(about = "Multi-model competitive intelligence pipeline", version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "YAML configuration file (built-in defaults when omitted)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Provider key used for evaluation and scoring (overrides GEOINTEL_ACTIVE_LLM)"
    )]
    pub evaluator: Option<String>,

    #[arg(long, short, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(
        long,
        global = true,
        help = "Also write JSON debug logs under $GEOINTEL_HOME/.geointel/logs"
    )]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Check that a URL belongs to a real operating company.
    VerifyCompany(VerifyCompanyArgs),
    /// Discover product categories for a company.
    Products(ProductsArgs),
    /// Discover analyst personas for a company and product.
    Personas(PersonasArgs),
    /// Discover report topics for a company, product and persona.
    Topics(TopicsArgs),
    /// Generate analytical prompts with one or more models.
    Prompts(PromptsArgs),
    /// Run prompts against models and print the scored report.
    Report(ReportArgs),
    /// Score brand, persona or topic visibility in a text.
    #[command(subcommand)]
    Score(ScoreCommand),
    /// Write a blog article for a topic.
    Content(ContentArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1", help = "Address to bind")]
    pub bind: String,

    #[arg(long, default_value_t = 8000, help = "Port to listen on")]
    pub port: u16,
}

#[derive(Debug, Args, Clone)]
pub struct VerifyCompanyArgs {
    #[arg(help = "Company website, with or without scheme")]
    pub url: String,
}

#[derive(Debug, Args, Clone)]
pub struct ProductsArgs {
    #[arg(long)]
    pub company: String,
}

#[derive(Debug, Args, Clone)]
pub struct PersonasArgs {
    #[arg(long)]
    pub company: String,

    #[arg(long, alias = "category")]
    pub product: String,
}

#[derive(Debug, Args, Clone)]
pub struct TopicsArgs {
    #[arg(long)]
    pub company: String,

    #[arg(long)]
    pub product: String,

    #[arg(long)]
    pub persona: String,
}

#[derive(Debug, Args, Clone)]
pub struct PromptsArgs {
    #[arg(
        long = "model",
        required = true,
        help = "Provider key; repeat for several models"
    )]
    pub models: Vec<String>,

    #[arg(long, default_value_t = 3, help = "Prompts per model (1-10)")]
    pub num_prompts: usize,

    #[arg(long)]
    pub topic: String,

    #[arg(long)]
    pub persona: String,

    #[arg(long, default_value = "")]
    pub product: String,

    #[arg(long, default_value = "")]
    pub brand: String,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[arg(
        long,
        help = "JSON file with {brand, product, personas, topics, prompts, models}"
    )]
    pub input: PathBuf,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ScoreCommand {
    /// Competitor relevance and the brand's share of it.
    Brand(ScoreBrandArgs),
    /// How strongly each persona perspective appears.
    Personas(ScoreLabelsArgs),
    /// How relevant each topic is.
    Topics(ScoreLabelsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ScoreBrandArgs {
    #[arg(long)]
    pub company: String,

    #[arg(long, default_value = "")]
    pub category: String,

    #[arg(long, help = "Text file to score")]
    pub corpus: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreLabelsArgs {
    #[arg(long = "label", required = true, help = "Persona or topic; repeat for several")]
    pub labels: Vec<String>,

    #[arg(long, help = "Text file to score")]
    pub corpus: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ContentArgs {
    #[arg(long)]
    pub topic: String,
}
