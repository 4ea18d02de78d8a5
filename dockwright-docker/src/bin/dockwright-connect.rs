//! A command line tool to test the [`dockwright_docker`] crate.
//!
//! This binary will typically only be useful to developers of this crate.
#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use dockwright_config::ProviderConfig;
use dockwright_config::connection::Config;
use dockwright_config::connection::Override;
use dockwright_docker::Provider;
use tokio_util::sync::CancellationToken;
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

/// Connects to a Docker daemon and reports its version.
#[derive(clap::Parser)]
struct Args {
    /// Additional configuration files to load.
    #[arg(short, long)]
    config: Vec<PathBuf>,

    /// Overrides the Docker host.
    #[arg(long)]
    host: Option<String>,

    /// Overrides the certificate directory.
    #[arg(long)]
    cert_path: Option<String>,

    /// Overrides the SSH options (may be repeated).
    #[arg(long = "ssh-opt", allow_hyphen_values = true)]
    ssh_opts: Vec<String>,

    #[command(flatten)]
    verbose: Verbosity,
}

impl Args {
    /// Gets the override described by the command line arguments.
    fn overrides(&self) -> Override {
        Config::builder()
            .host(self.host.clone().unwrap_or_default())
            .cert_path(self.cert_path.clone().unwrap_or_default())
            .ssh_opts(self.ssh_opts.clone())
            .build()
            .into()
    }
}

async fn run(args: &Args, token: CancellationToken) -> Result<()> {
    let config = ProviderConfig::load_with_paths(&args.config)
        .context("failed to load the provider configuration")?;
    config.validate()?;

    let provider = Provider::configure(config, &token).await?;
    let client = provider.make_client(&token, Some(&args.overrides())).await?;

    println!("host: {}", client.host());
    println!("strategy: {}", client.strategy());

    let version = client.version().await?;
    println!(
        "server version: {}",
        version.version.as_deref().unwrap_or("unknown")
    );
    println!(
        "API version: {}",
        version.api_version.as_deref().unwrap_or("unknown")
    );

    Ok(())
}

pub fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    runtime.block_on(async {
        let token = CancellationToken::new();
        let cancel = token.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        run(&args, token).await
    })
}
