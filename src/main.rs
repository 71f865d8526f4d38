use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use marketplace_scout::messaging::{LocalConnector, MarketplaceClient, PageAgent};
use marketplace_scout::{
    detect, BrowserPage, ExtractionOrchestrator, ExtractionOutcome, HttpPage, JsonFileStorage,
    Listing, PageContext, ScoutConfig, SearchOptions, SortKey, StaticPage, StorageRepo,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "marketplace-scout", about = "Extract and search marketplace listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which marketplace a URL belongs to
    Detect { url: String },
    /// Extract listings from a page
    Extract {
        url: String,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run the marketplace's own search and extract the results
    Search {
        url: String,
        query: String,
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List saved listings, or delete some by id
    Saved {
        #[arg(long, num_args = 1..)]
        delete: Vec<String>,
    },
    /// Show recent search queries
    History,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Drive headless Chrome instead of fetching static HTML
    #[arg(long, conflicts_with = "file")]
    browser: bool,
    /// Read the page from a saved HTML file
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write the listings as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Add the listings to saved listings
    #[arg(long)]
    save: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Price,
    Date,
    Relevance,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Price => SortKey::Price,
            SortArg::Date => SortKey::Date,
            SortArg::Relevance => SortKey::Relevance,
        }
    }
}

async fn open_page(url: &str, source: &SourceArgs, config: &ScoutConfig) -> anyhow::Result<Arc<dyn PageContext>> {
    if let Some(path) = &source.file {
        let html = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Arc::new(StaticPage::new(url, html)));
    }
    if source.browser {
        let page = BrowserPage::launch(url, config.headless)
            .await
            .context("Failed to open page in Chrome")?;
        return Ok(Arc::new(page));
    }
    let page = HttpPage::open(url).await.context("Failed to fetch page")?;
    Ok(Arc::new(page))
}

fn connect(page: Arc<dyn PageContext>, config: &ScoutConfig, storage: Arc<dyn StorageRepo>) -> MarketplaceClient {
    let orchestrator = Arc::new(ExtractionOrchestrator::new(page, config.clone()));
    let agent = Arc::new(PageAgent::new(orchestrator).with_storage(storage));
    let client = MarketplaceClient::new(Arc::new(LocalConnector::new(agent)), config.request_timeout());
    client.on_progress(|progress| {
        info!(
            "Progress: {}% ({}/{} listings)",
            progress.percentage, progress.processed_count, progress.total_count
        )
    });
    client
}

/// Wait for the operation, cancelling it on Ctrl-C
async fn until_done<F>(client: &MarketplaceClient, operation: F) -> anyhow::Result<ExtractionOutcome>
where
    F: std::future::Future<Output = marketplace_scout::Result<ExtractionOutcome>>,
{
    tokio::pin!(operation);
    tokio::select! {
        outcome = &mut operation => Ok(outcome?),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling...");
            client.cancel_search().await?;
            Ok(operation.await?)
        }
    }
}

fn print_listings(listings: &[Listing]) {
    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {} ({})", i + 1, listing.title, listing.price);
        if let Some(location) = &listing.location {
            println!("   Location: {}", location);
        }
        if let Some(posted) = listing.date_posted {
            println!("   Posted: {}", posted.format("%Y-%m-%d %H:%M"));
        }
        println!("   Marketplace: {}", listing.marketplace);
        println!("   ID: {}", listing.id);
        println!("   URL: {}", listing.url);
        println!();
    }
}

async fn finish(
    client: &MarketplaceClient,
    outcome: ExtractionOutcome,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    if outcome.is_cancelled() {
        warn!("Cancelled; showing {} listings gathered so far", outcome.listings().len());
    }
    let listings = outcome.into_listings();
    info!("✅ Found {} listings\n", listings.len());
    print_listings(&listings);

    if let Some(path) = &output.output {
        write_json(path, &listings).await?;
        info!("💾 Saved all listings to {}", path.display());
    }

    if output.save {
        for listing in &listings {
            client.save_listing(listing.clone()).await?;
        }
        info!("💾 Added {} listings to saved listings", listings.len());
    }
    Ok(())
}

async fn write_json(path: &Path, listings: &[Listing]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(listings)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ScoutConfig::from_env().context("Failed to load configuration")?;
    let storage: Arc<dyn StorageRepo> = Arc::new(JsonFileStorage::new(config.storage_path.clone()));

    match cli.command {
        Command::Detect { url } => match detect(&url) {
            Some(marketplace) => println!("{}", marketplace.display_name()),
            None => println!("Unknown (generic extraction will be used)"),
        },

        Command::Extract { url, source, output } => {
            let page = open_page(&url, &source, &config).await?;
            let client = connect(page, &config, Arc::clone(&storage));

            info!("🛒 Marketplace Scout");
            match client.current_marketplace().await? {
                Some(name) => info!("Extracting listings from {}", name),
                None => info!("Unrecognized page, using generic extraction"),
            }

            let outcome = until_done(&client, client.extract_listings()).await?;
            finish(&client, outcome, &output).await?;
        }

        Command::Search {
            url,
            query,
            source,
            min_price,
            max_price,
            location,
            max_results,
            sort,
            output,
        } => {
            if detect(&url).is_none() {
                bail!("Search needs a supported marketplace page, got {url}");
            }
            let page = open_page(&url, &source, &config).await?;
            let client = connect(page, &config, Arc::clone(&storage));

            let options = SearchOptions {
                min_price,
                max_price,
                location,
                max_results,
                sort_by: sort.map(SortKey::from),
                ..Default::default()
            };
            info!("🔎 Searching for {:?}", query);
            let outcome = until_done(&client, client.search_listings(&query, options)).await?;

            let mut history = storage.read_search_history().await?;
            history.retain(|q| q != &query);
            history.push(query);
            storage.store_search_history(history).await?;

            finish(&client, outcome, &output).await?;
        }

        Command::Saved { delete } => {
            if !delete.is_empty() {
                storage.delete_saved_listings(&delete).await?;
                info!("Deleted {} saved listings", delete.len());
            }
            let saved = storage.read_saved_listings().await?;
            info!("{} saved listings\n", saved.len());
            print_listings(&saved);
        }

        Command::History => {
            for (i, query) in storage.read_search_history().await?.iter().rev().enumerate() {
                println!("{}. {}", i + 1, query);
            }
        }
    }

    Ok(())
}
