//! Batch runner: reads company rows from CSV or JSON, resolves domains and
//! contacts through `resolve_core`, and writes the merged output.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use resolve_core::adapters::{
    B2bEnrichAdapter, DirectoryScrapeAdapter, EmailVerifyAdapter, PageFetchAdapter,
    PlacesNameMatchAdapter, PlacesPhoneVerifyAdapter, TextExtractAdapter, WebSearchKgAdapter,
};

use resolve_core::llm::{AnthropicClient, ClientConfig};
use resolve_core::{
    io, Config, ContactDiscoveryController, ContactServices, DomainResolver, DomainServices,
    ExitCode, Orchestrator, PipelineServices,
};

#[derive(Parser, Debug)]
#[command(name = "resolve", about = "Batch company domain and contact resolution")]
struct Cli {
    /// Input file: CSV or JSON rows of company data.
    #[arg(long)]
    input: PathBuf,

    /// Input format, inferred from the input extension when omitted.
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// TOML config file; falls back to defaults when absent.
    #[arg(long, default_value = "resolve.toml")]
    config: PathBuf,

    /// Output path. Written as CSV unless it ends in `.json`.
    #[arg(long)]
    out: PathBuf,

    /// SQLite jobs database. Defaults to an in-memory store.
    #[arg(long)]
    jobs_db: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum InputFormat {
    Csv,
    Json,
}

fn env_key(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn main() -> ProcessExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RESOLVE_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ProcessExitCode::from(ExitCode::Fatal as u8);
        }
    };

    runtime.block_on(run())
}

async fn run() -> ProcessExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ProcessExitCode::from(ExitCode::ConfigError as u8);
        }
    };

    let format = cli.format.unwrap_or_else(|| {
        if cli.input.extension().and_then(|e| e.to_str()) == Some("json") {
            InputFormat::Json
        } else {
            InputFormat::Csv
        }
    });

    let data = match std::fs::read_to_string(&cli.input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("reading {}: {e}", cli.input.display());
            return ProcessExitCode::from(ExitCode::Fatal as u8);
        }
    };

    let inputs = match format {
        InputFormat::Csv => io::read_companies_csv(&data),
        InputFormat::Json => io::read_companies_json(&data),
    };
    let inputs = match inputs {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("parsing input: {e}");
            return ProcessExitCode::from(ExitCode::Fatal as u8);
        }
    };

    let store = match &cli.jobs_db {
        Some(path) => resolve_core::JobStore::open(path),
        None => resolve_core::JobStore::open_in_memory(),
    };
    let store = match store {
        Ok(s) => s,
        Err(e) => {
            eprintln!("opening jobs store: {e}");
            return ProcessExitCode::from(ExitCode::Fatal as u8);
        }
    };

    let http = reqwest::Client::new();
    let llm_client: Arc<dyn resolve_core::LLMClient> = Arc::new(AnthropicClient::new(
        ClientConfig::new(env_key("ANTHROPIC_API_KEY"))
            .with_base_url(config.llm.endpoint.clone())
            .with_default_model(config.llm.model.clone())
            .with_timeout(config.llm.timeout_secs),
    ));

    let domain_services = Arc::new(DomainServices {
        places_phone_verify: Arc::new(PlacesPhoneVerifyAdapter::new(
            http.clone(),
            "https://maps.googleapis.com/maps/api/place",
            env_key("PLACES_API_KEY"),
        )),
        places_name_match: Arc::new(PlacesNameMatchAdapter::new(
            http.clone(),
            "https://maps.googleapis.com/maps/api/place",
            env_key("PLACES_API_KEY"),
        )),
        web_search: Arc::new(WebSearchKgAdapter::new(
            http.clone(),
            "https://google.serper.dev/search",
            env_key("SERPER_API_KEY"),
        )),
        directory: Arc::new(DirectoryScrapeAdapter::new(
            http.clone(),
            "https://google.serper.dev/search",
            env_key("SERPER_API_KEY"),
        )),
        b2b: Arc::new(B2bEnrichAdapter::new(
            http.clone(),
            "https://api.clearbit.com/v2/companies/find",
            env_key("B2B_API_KEY"),
        )),
        page_fetch: Arc::new(
            PageFetchAdapter::new(http.clone()).with_anti_bot(
                "https://api.zenrows.com/v1",
                env_key("ZENROWS_API_KEY"),
            ),
        ),
        text_extract: Arc::new(TextExtractAdapter::new()),
        llm_client: Arc::clone(&llm_client),
        judge_model: config.llm.model.clone(),
    });

    let contact_services = Arc::new(ContactServices {
        page_fetch: Arc::new(PageFetchAdapter::new(http.clone())),
        text_extract: Arc::new(TextExtractAdapter::new()),
        web_search: Arc::new(WebSearchKgAdapter::new(
            http.clone(),
            "https://google.serper.dev/search",
            env_key("SERPER_API_KEY"),
        )),
        email_verify: Arc::new(EmailVerifyAdapter::new(
            http.clone(),
            "https://api.millionverifier.com/api/v3",
            std::env::var("MILLIONVERIFIER_API_KEY").ok(),
        )),
    });

    let services = Arc::new(PipelineServices {
        domain_resolver: DomainResolver::new(domain_services, config.thresholds.accept_threshold)
            .with_routing(config.routing.clone())
            .with_adapter_config(&config.adapters),
        contact_controller: ContactDiscoveryController::new(
            contact_services,
            config.thresholds.max_contact_steps,
            config.thresholds.per_row_cost_budget_usd,
        )
        .with_adapter_config(&config.adapters),
        store,
    });

    let orchestrator = Orchestrator::new(services, config);
    let report = orchestrator.run_batch(inputs).await;

    let records: Vec<_> = report.records.iter().map(|(_, r)| r.clone()).collect();
    let write_result = if cli.out.extension().and_then(|e| e.to_str()) == Some("json") {
        io::write_records_json(&records)
    } else {
        io::write_records_csv(&report.records)
    };

    match write_result.and_then(|body| {
        std::fs::write(&cli.out, body).map_err(|e| {
            resolve_core::Error::persistence_error(format!("writing {}: {e}", cli.out.display()))
        })
    }) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("writing output: {e}");
            return ProcessExitCode::from(ExitCode::Fatal as u8);
        }
    }

    tracing::info!(
        total = report.total_count,
        failed = report.failed_count,
        "batch complete"
    );

    ProcessExitCode::from(report.exit_code(0.25) as u8)
}

fn load_config(path: &PathBuf) -> resolve_core::Result<Config> {
    if path.exists() {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}
