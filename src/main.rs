// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use ioc_harvest::utils::logging::{format_info, format_success, format_warning};
use ioc_harvest::{
    Config, EnrichmentEngine, IocExtractor, MemoryStore, Orchestrator, ReferenceData, RunOptions,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ioc_harvest")]
#[command(version = "0.1.0")]
#[command(about = "Threat intelligence crawler extracting IOCs from security news", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full crawl pipeline against the configured sources
    Crawl {
        /// Reprocess links even if scanned recently
        #[arg(long)]
        ignore_history: bool,

        #[arg(long, value_name = "NUM")]
        limit: Option<usize>,
    },

    /// Extract and enrich indicators from a local text file
    Extract {
        file: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.color {
        colored::control::set_override(false);
    }
    ioc_harvest::utils::logging::init_logger(cli.color, cli.verbose);

    info!("IOC Harvest crawler");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Crawl {
            ignore_history,
            limit,
        } => {
            cmd_crawl(&config, ignore_history, limit, cli.color).await?;
        }
        Commands::Extract { file, pretty } => {
            cmd_extract(&config, &file, pretty)?;
        }
        Commands::ShowConfig => {
            cmd_show_config(&config)?;
        }
    }

    Ok(())
}

async fn cmd_crawl(
    config: &Config,
    ignore_history: bool,
    limit: Option<usize>,
    colored_output: bool,
) -> Result<()> {
    info!("Starting crawl pipeline");

    let store = MemoryStore::new();
    store
        .seed_from_dir(&config.extraction.settings_dir)
        .context("Failed to seed entity store")?;

    let options = RunOptions {
        ignore_history,
        limit,
        colored_output,
    };
    let orchestrator = Orchestrator::new(config, &store);
    let summary = orchestrator
        .run(&options)
        .await
        .context("Crawl run failed")?;

    println!();
    println!("{}", format_success("Crawl run complete"));
    println!(
        "{}",
        format_info(&format!(
            "Links: {} | Extracted: {} | Failed: {} | Indicators: {}",
            summary.links_found,
            summary.articles_extracted,
            summary.articles_failed,
            summary.indicators_produced
        ))
    );
    if summary.articles_failed > 0 {
        println!(
            "{}",
            format_warning(&format!(
                "Extraction success rate: {:.1}%",
                summary.extraction_success_rate()
            ))
        );
    }

    for record in store.indicators().context("Failed to read indicators")? {
        let line = format!(
            "{:<12} {} ({} sighting{})",
            record.ioc_type.as_str(),
            record.ioc_value,
            record.occurrence_count,
            if record.occurrence_count == 1 { "" } else { "s" }
        );
        if colored_output {
            println!("  {}", line.cyan());
        } else {
            println!("  {}", line);
        }
    }

    Ok(())
}

fn cmd_extract(config: &Config, file: &PathBuf, pretty: bool) -> Result<()> {
    info!("Extracting indicators from {}", file.display());

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let store = MemoryStore::new();
    store
        .seed_from_dir(&config.extraction.settings_dir)
        .context("Failed to seed entity store")?;

    let reference = ReferenceData::load(&config.extraction.settings_dir, &store)
        .context("Failed to load reference data")?;
    let extractor = IocExtractor::new(reference, config.extraction.context_window_chars);
    let findings = extractor.extract(&text, 0);

    let article_urls = vec![format!("file://{}", file.display())];
    let mut article_texts = std::collections::HashMap::new();
    article_texts.insert(0, text);

    let engine = EnrichmentEngine::new(&store, config.enrichment.proximity_window_chars);
    let records = engine
        .process(&findings, &article_urls, &article_texts)
        .context("Enrichment failed")?;

    let json = if pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    println!("{}", json);

    Ok(())
}

fn cmd_show_config(config: &Config) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
