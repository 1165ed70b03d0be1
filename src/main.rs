mod tracing_setup;

use std::{
    fs,
    net::SocketAddr,
    path::Path,
    sync::{Arc, OnceLock},
};

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;

use geointel::{
    adapters::{
        inbound::{cli::CliAdapter, server::ServerAdapter},
        outbound::{
            llm::build_http_client, registry::ProviderRegistry, site::HttpSiteProbe,
            templating::HandlebarsRenderer,
        },
    },
    application::AppService,
    cli::{Cli, Commands, ServeArgs},
    config::GeoConfig,
    core::ports::IntelService,
    paths::home_env_path,
};

/// Environment variable naming the initial evaluator.
const ACTIVE_LLM_ENV: &str = "GEOINTEL_ACTIVE_LLM";

/// UTF-8 width bound used to size the page read for `page_chars` characters.
const MAX_BYTES_PER_CHAR: usize = 4;

static HOME_ENV_ONCE: OnceLock<()> = OnceLock::new();

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ensure_home_env_loaded();
    let _log_guard = tracing_setup::init(cli.verbose, cli.log_json, cli.log_file);

    let config = load_config(cli.config.as_deref())?;
    let evaluator = pick_evaluator(cli.evaluator, std::env::var(ACTIVE_LLM_ENV).ok());
    let service = build_service(&config, evaluator.as_deref())?;

    match cli.command {
        Commands::Serve(args) => serve_command(args, service).await,
        command => CliAdapter::new(service).execute(command).await,
    }
}

async fn serve_command(args: ServeArgs, service: Arc<dyn IntelService>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("Invalid bind/port combination for serve command")?;
    eprintln!("Serving geointel API on http://{addr}");
    ServerAdapter::new(service).run(addr).await
}

fn load_config(path: Option<&Path>) -> Result<GeoConfig> {
    match path {
        Some(path) => GeoConfig::from_path(path),
        None => Ok(GeoConfig::default()),
    }
}

fn build_service(config: &GeoConfig, evaluator: Option<&str>) -> Result<Arc<dyn IntelService>> {
    let settings = config.pipeline_settings();
    let http_client = build_http_client()?;
    let registry = Arc::new(ProviderRegistry::new(config.providers.clone(), http_client));
    let probe = Arc::new(HttpSiteProbe::new(
        settings.fetch_timeout,
        settings.page_chars * MAX_BYTES_PER_CHAR,
    )?);
    let service = AppService::new(
        registry,
        probe,
        Arc::new(HandlebarsRenderer::new()),
        config.prompt_templates(),
        settings,
    );
    if let Some(key) = evaluator {
        service.select_model(key)?;
    }
    Ok(Arc::new(service))
}

/// The `--evaluator` flag wins over the environment; blanks count as unset.
fn pick_evaluator(cli_value: Option<String>, env_value: Option<String>) -> Option<String> {
    normalize_value(cli_value).or_else(|| normalize_value(env_value))
}

fn normalize_value(value: Option<String>) -> Option<String> {
    value.and_then(|candidate| {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn ensure_home_env_loaded() {
    HOME_ENV_ONCE.get_or_init(|| {
        if let Some(path) = home_env_path()
            && let Ok(contents) = fs::read_to_string(&path)
        {
            apply_env_contents(&contents);
        }
    });
}

fn apply_env_contents(contents: &str) {
    for line in contents.lines() {
        if let Some((key, value)) = parse_env_assignment(line)
            && std::env::var_os(&key).is_none()
        {
            unsafe {
                std::env::set_var(&key, &value);
            }
        }
    }
}

fn parse_env_assignment(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim();

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key.to_string(), unquote(value.trim())))
}

fn unquote(raw: &str) -> String {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}
