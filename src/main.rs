use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use newsdigest::crawler::{resolve_and_load, save_articles};
use newsdigest::llm::{PromptTemplate, ResponseParser};
use newsdigest::models::Report;
use newsdigest::report::{generate_report, render_markdown, render_text, write_report};
use newsdigest::{
    BatchConfig, BatchProcessor, CompletionClient, Config, Crawler, CrawlerConfig,
    ProviderRegistry,
};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Parser, Debug)]
#[command(name = "newsdigest")]
#[command(version = "0.1.0")]
#[command(about = "Crawl news sites, filter and translate articles with an LLM, and build a digest")]
struct Args {
    /// Skip crawling and process the newest saved article file
    #[arg(long)]
    skip_crawl: bool,

    /// Article file to process (implies --skip-crawl)
    #[arg(short, long)]
    articles: Option<PathBuf>,

    /// Provider to use for every article (overrides AI_PROVIDER)
    #[arg(short, long)]
    provider: Option<String>,

    /// Do not retry failed articles at the end of the run
    #[arg(long)]
    no_retry: bool,

    /// List providers and their availability, then exit
    #[arg(long)]
    providers: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the summary to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("newsdigest=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(ref path) = args.articles {
        config.articles_file = Some(path.clone());
    }
    if args.no_retry {
        config.retry_failed = false;
    }

    let registry = ProviderRegistry::new(&config.env);
    let client = CompletionClient::new(
        registry,
        config.default_provider.as_str(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    if args.providers {
        print_providers(&client);
        return Ok(());
    }

    // Configuration problems abort here, before any crawling or model calls.
    let provider = client.resolve(args.provider.as_deref())?;
    if !provider.is_available() {
        tracing::warn!(
            provider = provider.name,
            missing = %provider.missing_credentials().join(", "),
            "Selected provider is missing credentials; every article will fail"
        );
    }
    tracing::info!(
        provider = provider.name,
        model = %provider.defaults.model,
        "Using AI provider"
    );

    let today = Local::now().date_naive();

    if !args.skip_crawl && config.articles_file.is_none() {
        let crawler = Crawler::new(CrawlerConfig::from(&config))?;
        let crawled = crawler.crawl().await;
        if crawled.is_empty() {
            tracing::warn!("Crawl produced no articles, falling back to saved article files");
        } else if let Err(e) = save_articles(&config.data_dir, today, &crawled).await {
            tracing::warn!(error = %e, "Failed to save crawled articles");
        }
    }

    let (articles_path, articles) =
        resolve_and_load(config.articles_file.as_deref(), &config.data_dir).await?;
    tracing::info!(
        "Processing {} articles from {}",
        articles.len(),
        articles_path.display()
    );

    let template = PromptTemplate::load(
        config.prompt_template.as_deref(),
        &config.prompt_template_file,
        config.response_format,
        &config.target_language,
    );
    let parser = ResponseParser::new(config.response_format, config.response_fields.as_deref())?;
    let batch_config = BatchConfig {
        provider: args.provider.clone(),
        ..BatchConfig::from(&config)
    };

    let processor = BatchProcessor::new(Arc::new(client), template, parser, batch_config);

    let date_dir = today.format("%Y%m%d").to_string();
    let checkpoint_path = config.checkpoint_path(&date_dir);
    let records = processor.run(&articles, &checkpoint_path).await?;

    let report = generate_report(&records, Utc::now());
    write_report(&report, &config.report_dir.join(&date_dir)).await?;

    output_report(&report, &args)?;

    Ok(())
}

fn print_providers(client: &CompletionClient) {
    println!("\n=== AI Providers ===\n");
    for status in client.status() {
        let marker = if status.available { "x" } else { " " };
        println!(
            "  [{}] {:<9} {:<18} model: {}",
            marker, status.name, status.display_name, status.model
        );
        if !status.available {
            println!("        missing: {}", status.missing.join(", "));
        }
    }

    let available = client.registry().list_available();
    if available.is_empty() {
        println!("\nNo provider is available. Set the credentials for at least one.");
    } else {
        println!("\nAvailable: {}", available.join(", "));
    }
}

fn output_report(report: &Report, args: &Args) -> anyhow::Result<()> {
    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Markdown => render_markdown(report),
        OutputFormat::Text => render_text(report),
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Summary written to: {}", path.display());
    } else {
        println!("{}", output);
    }

    Ok(())
}
