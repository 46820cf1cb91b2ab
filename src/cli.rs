use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "subhub")]
#[command(about = "Proxy subscription aggregator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Probe every enabled remote source and store its traffic info
    Refresh,
    /// Fetch one feed and print what the aggregator would extract from it
    Inspect(InspectArgs),
    /// Load subscriptions, profiles and settings from a JSON export
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Feed URL
    pub url: String,

    /// User agent sent to the feed (defaults to `fetch.probe_user_agent`)
    #[arg(long)]
    pub user_agent: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// JSON file with optional `subscriptions`, `profiles` and `settings` keys
    pub file: PathBuf,
}
