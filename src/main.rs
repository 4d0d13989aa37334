//! agent-web-search CLI - web search for agents from the command line.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use agent_web_search::{
    build_client,
    providers::{Bing, StaticProvider},
    HttpFetcher, ProviderConfig, Query, QuerySummary, SearchProvider, ServiceConfig,
    WebSearchService, DEFAULT_AGENT_ID,
};

/// agent-web-search - web search, page previews and summaries for agents
#[derive(Parser)]
#[command(name = "agent-web-search")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the web and summarize the top results
    Query(QueryArgs),

    /// Fetch a single page and print its text
    Fetch(FetchArgs),

    /// List available search providers
    Providers,
}

#[derive(Args)]
struct ServiceArgs {
    /// Maximum in-flight calls per agent
    #[arg(long, global = true, env = "MAX_CONCURRENT_PER_AGENT", default_value = "5")]
    max_concurrent: usize,

    /// Maximum queries per minute across all agents
    #[arg(long, global = true, env = "MAX_QUERIES_PER_MIN", default_value = "60")]
    max_queries_per_min: usize,

    /// Result cache lifetime in seconds (0 disables caching)
    #[arg(long, global = true, env = "CACHE_TTL_SECONDS", default_value = "600")]
    cache_ttl: u64,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "REQUEST_TIMEOUT_SECONDS", default_value = "10")]
    request_timeout: u64,

    /// Search results endpoint
    #[arg(long, global = true, env = "SEARCH_API_URL")]
    endpoint: Option<String>,

    /// Default region/language, e.g. us-en
    #[arg(long, global = true, env = "SEARCH_LANGUAGE")]
    search_language: Option<String>,

    /// User agent sent with every request
    #[arg(long, global = true, env = "SEARCH_USER_AGENT")]
    user_agent: Option<String>,

    /// Search provider
    #[arg(long, global = true, env = "SEARCH_PROVIDER", default_value = "ddg")]
    provider: ProviderChoice,

    /// Subscription key for the Bing API
    #[arg(long, global = true, env = "SEARCH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Answer from the built-in sample table instead of the network
    #[arg(long, global = true, env = "USE_STUB_DATA")]
    stub: bool,

    /// Only fetch pages from these domains (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    allow_domain: Vec<String>,

    /// Honor robots.txt when fetching pages
    #[arg(long, global = true)]
    respect_robots: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// Search query
    query: String,

    /// Maximum number of sources
    #[arg(short = 'n', long, default_value = "5")]
    max_results: usize,

    /// Calling agent identity
    #[arg(short, long, default_value = DEFAULT_AGENT_ID)]
    agent_id: String,

    /// Region/language for this query
    #[arg(short, long)]
    language: Option<String>,

    /// Overall time budget in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
struct FetchArgs {
    /// Page URL
    url: String,

    /// Calling agent identity
    #[arg(short, long, default_value = DEFAULT_AGENT_ID)]
    agent_id: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderChoice {
    /// DuckDuckGo HTML results
    #[value(alias = "duckduckgo", alias = "duckduckgo_html")]
    Ddg,
    /// Bing Web Search API (needs an API key)
    #[value(alias = "bing_api")]
    Bing,
    /// Built-in sample results, no network
    Static,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Query(args) => run_query(&cli.service, args).await,
        Commands::Fetch(args) => run_fetch(&cli.service, args).await,
        Commands::Providers => list_providers(),
    }
}

fn list_providers() -> Result<()> {
    println!("Available search providers:\n");
    println!("    ddg      - DuckDuckGo (HTML results page)");
    println!("    bing     - Bing Web Search API (requires SEARCH_API_KEY)");
    println!("    static   - Built-in sample results (offline)");
    println!();
    println!("Usage: agent-web-search query \"rust ownership model\" --provider ddg");
    Ok(())
}

fn service_config(args: &ServiceArgs) -> ServiceConfig {
    let defaults = ServiceConfig::default();
    ServiceConfig {
        concurrency_limit: args.max_concurrent,
        global_quota_per_minute: args.max_queries_per_min,
        cache_ttl_seconds: args.cache_ttl,
        fetch_timeout_secs: args.request_timeout,
        search_timeout_secs: args.request_timeout,
        domain_allow_list: args.allow_domain.clone(),
        respect_robots: args.respect_robots,
        user_agent: args.user_agent.clone().unwrap_or(defaults.user_agent.clone()),
        search_endpoint: args.endpoint.clone().unwrap_or(defaults.search_endpoint.clone()),
        search_language: args
            .search_language
            .clone()
            .unwrap_or(defaults.search_language.clone()),
        ..defaults
    }
}

fn build_service(args: &ServiceArgs) -> Result<WebSearchService> {
    let config = service_config(args);
    let provider: Arc<dyn SearchProvider> = match (args.provider, args.api_key.as_deref()) {
        _ if args.stub => Arc::new(StaticProvider::sample()),
        (ProviderChoice::Ddg, _) => {
            return WebSearchService::from_http_config(config).context("Invalid configuration")
        }
        (ProviderChoice::Static, _) => Arc::new(StaticProvider::sample()),
        (ProviderChoice::Bing, None) => {
            warn!("SEARCH_API_KEY is not set, answering from the built-in sample results");
            Arc::new(StaticProvider::sample())
        }
        (ProviderChoice::Bing, Some(key)) => {
            let client = build_client(&config.user_agent, config.search_timeout())?;
            let mut bing = Bing::new(client, key).with_config(ProviderConfig {
                name: "Bing".to_string(),
                shortcut: "bing".to_string(),
                timeout: config.search_timeout_secs,
            });
            if let Some(endpoint) = &args.endpoint {
                bing = bing.with_endpoint(endpoint);
            }
            Arc::new(bing)
        }
    };

    let client = build_client(&config.user_agent, config.fetch_timeout())?;
    WebSearchService::new(config, provider, Arc::new(HttpFetcher::with_client(client)))
        .context("Invalid configuration")
}

async fn run_query(service_args: &ServiceArgs, args: QueryArgs) -> Result<()> {
    let service = build_service(service_args)?;

    let mut query = Query::new(&args.query)
        .with_max_results(args.max_results)
        .with_agent(&args.agent_id);
    if let Some(language) = &args.language {
        query = query.with_language(language);
    }
    if let Some(secs) = args.timeout {
        query = query.with_timeout(Duration::from_secs(secs));
    }

    let summary = service.query(query).await?;

    match args.format {
        OutputFormat::Text => print_summary(&args.query, &summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn print_summary(query: &str, summary: &QuerySummary) {
    println!("\nSummary for \"{}\" ({} sources):\n", query, summary.sources.len());
    println!("{}\n", summary.overview);

    if !summary.highlights.is_empty() {
        println!("Highlights:");
        for highlight in &summary.highlights {
            println!("  - {}", highlight);
        }
        println!();
    }

    println!("Sources:");
    for (i, source) in summary.sources.iter().enumerate() {
        println!("{}. {}", i + 1, source.title);
        println!("   URL: {}", source.url);
        let fetched = summary.fetched_pages.iter().find(|p| p.url() == source.url);
        match fetched {
            Some(page) if page.is_success() => println!(
                "   Fetched: {} chars",
                page.text().map(|t| t.chars().count()).unwrap_or(0)
            ),
            Some(page) => println!(
                "   Fetch failed: {}",
                page.error().map(|e| e.to_string()).unwrap_or_default()
            ),
            None => {}
        }
        println!();
    }
}

async fn run_fetch(service_args: &ServiceArgs, args: FetchArgs) -> Result<()> {
    let service = build_service(service_args)?;
    let outcome = service.fetch_page_for(&args.agent_id, &args.url).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => match outcome.error() {
            Some(kind) => {
                let status = outcome
                    .status_code()
                    .map(|s| format!(" (HTTP {s})"))
                    .unwrap_or_default();
                anyhow::bail!("Failed to fetch {}: {}{}", args.url, kind, status);
            }
            None => {
                if let Some(content_type) = outcome.content_type() {
                    eprintln!("Content-Type: {}", content_type);
                }
                println!("{}", outcome.text().unwrap_or_default());
            }
        },
    }
    Ok(())
}
