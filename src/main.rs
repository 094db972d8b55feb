//! Marketplace Scout command line entry point
//!
//! Runs a single search, streams progress to the log and prints the final
//! result as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use rust_decimal::Decimal;
use tracing::{info, warn};

use marketplace_scout::AnalysisEngine;
use marketplace_scout::crawling::OrchestratorBuilder;
use marketplace_scout::domain::{
    ExportFormat, ExportRenderer, Platform, SearchFilters, SearchRequest, SearchStatus, SortBy,
};
use marketplace_scout::infrastructure::{
    AppConfig, InMemoryHistoryStore, JsonExporter, init_logging, live_adapters, offline_adapters,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Relevance,
    PriceAsc,
    PriceDesc,
    Rating,
    Sold,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Relevance => SortBy::Relevance,
            SortArg::PriceAsc => SortBy::PriceAsc,
            SortArg::PriceDesc => SortBy::PriceDesc,
            SortArg::Rating => SortBy::Rating,
            SortArg::Sold => SortBy::Sold,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Search keyword
    keyword: String,

    /// Platforms to search, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    platforms: Vec<Platform>,

    /// Maximum listings per platform (default from config)
    #[arg(short, long)]
    limit: Option<u32>,

    /// Only consider listings at or below this price for best sellers
    #[arg(long)]
    max_price: Option<Decimal>,

    /// Only consider listings rated at least this for best sellers
    #[arg(long)]
    min_rating: Option<f64>,

    /// Number of best sellers to report
    #[arg(long)]
    top_n: Option<u32>,

    /// Ordering of the combined listing summary
    #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
    sort_by: SortArg,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use built-in sample listings instead of the network
    #[arg(long)]
    offline: bool,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| AppConfig::default_path().filter(|p| p.exists()));
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging)?;

    info!("Starting Marketplace Scout v{}", env!("CARGO_PKG_VERSION"));

    let adapters = if args.offline {
        info!("Offline mode: using sample listings");
        offline_adapters()
    } else {
        live_adapters(&config.scraper)?
    };

    let orchestrator = OrchestratorBuilder::from_config(&config)
        .adapters(adapters)
        .history_store(Arc::new(InMemoryHistoryStore::new()))
        .build();

    let platforms = if args.platforms.is_empty() {
        Platform::ALL.to_vec()
    } else {
        args.platforms.clone()
    };
    let filters = SearchFilters {
        max_price: args.max_price,
        min_rating: args.min_rating,
        top_n: args.top_n,
        sort_by: args.sort_by.into(),
    };
    let request = SearchRequest::new(
        args.keyword.as_str(),
        platforms,
        args.limit.unwrap_or(config.scraper.default_limit),
    )
    .with_filters(filters.clone());

    let id = orchestrator.start(request).await?;

    if let Some(mut events) = orchestrator.subscribe(id) {
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event.platform {
                    Some(platform) => info!("[{:>3}%] {} ({})", event.progress, event.message, platform),
                    None => info!("[{:>3}%] {}", event.progress, event.message),
                }
            }
        });
    }

    let result = tokio::select! {
        result = orchestrator.wait(id) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling search {}", id);
            orchestrator.shutdown();
            orchestrator.wait(id).await
        }
    };
    let Some(result) = result else {
        bail!("search {id} disappeared before finishing");
    };

    if filters.sort_by != SortBy::Relevance {
        let top = AnalysisEngine::new().sorted_view(&result.results, filters.sort_by);
        for product in top.iter().take(filters.top_n()) {
            info!("{} | {} | {}", product.platform, product.price, product.name);
        }
    }

    let rendered = JsonExporter.render(&result, ExportFormat::Json)?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("writing result to {}", path.display()))?;
            info!("Result written to {}", path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&rendered)),
    }

    if result.status == SearchStatus::Failed {
        bail!(
            "search failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
