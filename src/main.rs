mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, ImportArgs, InspectArgs};
use subhub::config::Config;
use subhub::fetch::{self, HttpConfig, HttpFetcher, Orchestrator};
use subhub::humanize::format_bytes;
use subhub::observability::{self, Metrics};
use subhub::store::{FjallStore, StoreExport};
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;

    match cli.command {
        Commands::Server(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            subhub::api::run(config).await?
        }
        Commands::Refresh => refresh(&config).await?,
        Commands::Inspect(args) => inspect(&config, args).await?,
        Commands::Import(args) => import(&config, args)?,
    }

    Ok(())
}

async fn refresh(config: &Config) -> Result<(), AnyError> {
    let store = FjallStore::open(&config.server.store_path)
        .map_err(|e| format!("Failed to open Fjall store: {}", e))?;
    let fetcher = HttpFetcher::new(HttpConfig::from(&config.fetch))?;

    let mut sources = store.load_sources()?;
    let updated = fetch::probe_all(
        &fetcher,
        &mut sources,
        &config.fetch.probe_user_agent,
        config.fetch.probe_timeout(),
    )
    .await;

    store.save_sources(&sources)?;
    store.persist()?;
    info!(updated, total = sources.len(), "Traffic info refreshed");
    Ok(())
}

async fn inspect(config: &Config, args: InspectArgs) -> Result<(), AnyError> {
    let user_agent = args.user_agent.as_deref().unwrap_or(config.fetch.probe_user_agent.as_str());
    let fetcher = Arc::new(HttpFetcher::new(HttpConfig::from(&config.fetch))?);

    let body_timeout = config.fetch.body_timeout();
    let body = fetch::fetch_with_timeout(&*fetcher, &args.url, user_agent, body_timeout).await?;
    let orchestrator = Orchestrator::new(fetcher.clone(), body_timeout, Arc::new(Metrics::new()));
    let links = orchestrator.links_from_body(&body, user_agent).await;

    println!("{} nodes", links.len());

    let probed = fetch::probe_with_timeout(
        &*fetcher,
        &args.url,
        &config.fetch.probe_user_agent,
        config.fetch.probe_timeout(),
    )
    .await;

    match probed {
        Ok(Some(header)) => match fetch::parse_userinfo(&header) {
            Some(info) => {
                println!(
                    "traffic: {} used of {}, {} remaining",
                    format_bytes(info.used()),
                    format_bytes(info.total),
                    format_bytes(info.remaining())
                );
                if let Some(expiry) = info.expires_at() {
                    println!("expires: {}", expiry.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            None => println!("traffic: unparseable header {:?}", header),
        },
        Ok(None) => println!("traffic: not reported"),
        Err(e) => println!("traffic: probe failed ({})", e),
    }

    for link in &links {
        println!("{}", link);
    }
    Ok(())
}

fn import(config: &Config, args: ImportArgs) -> Result<(), AnyError> {
    let raw = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("Failed to read {}: {}", args.file.display(), e))?;
    let export: StoreExport = serde_json::from_str(&raw)?;

    let store = FjallStore::open(&config.server.store_path)
        .map_err(|e| format!("Failed to open Fjall store: {}", e))?;
    let written = store.import(&export)?;
    let keys: Vec<&str> = written.iter().map(|key| key.as_str()).collect();
    info!(file = %args.file.display(), keys = ?keys, "Import complete");
    Ok(())
}
