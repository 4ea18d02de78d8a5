//! An example of several resources sharing clients through a provider.
//!
//! You can run this command with the following command:
//!
//! `cargo run --release --example resources -- --host tcp://127.0.0.1:2375`

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use dockwright::Provider;
use dockwright::ProviderConfig;
use dockwright::config::connection::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Debug, Parser)]
#[allow(missing_docs)]
pub struct Args {
    /// The hosts assigned to resources through their override blocks.
    #[arg(long = "host")]
    hosts: Vec<String>,

    /// The number of resources per host.
    #[arg(short, long, default_value_t = 3)]
    resources: usize,
}

/// Starting point for the example.
async fn run(args: Args) -> Result<()> {
    let config = ProviderConfig::load().context("loading the provider configuration")?;
    config.validate()?;

    let token = CancellationToken::new();
    let provider = Provider::configure(config, &token).await?;

    for (i, host) in args.hosts.iter().enumerate() {
        for j in 0..args.resources {
            provider.register_override(
                format!("docker_container.c{i}_{j}"),
                Config::builder().host(host).build().into(),
            );
        }
    }

    for i in 0..args.hosts.len() {
        for j in 0..args.resources {
            let id = format!("docker_container.c{i}_{j}");
            let client = provider.make_client_for(&token, &id).await?;
            info!("`{id}` uses `{}` ({})", client.host(), client.strategy());
        }
    }

    info!("{} client(s) were created", provider.cache().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    run(args).await
}
