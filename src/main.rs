//! crew - a minimalist website engine.
//!
//! Usage:
//!   crew [OPTIONS]                 Serve the content root
//!   crew serve [OPTIONS]           Same as above
//!   crew tree --root DIR           Print every node's path
//!   crew print-template            Print the built-in page template
//!   crew --help                    Show help

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

use crew_core::ContentTree;
use crew_server::{AppState, ServerConfig};

#[derive(Parser)]
#[command(
    name = "crew",
    version,
    about = "A minimalist website engine",
    long_about = "crew maps a directory tree onto URLs and renders each node as a page.\n\n\
                  Sidecar `_<name>.conf.json` files set titles, visibility, render \
                  strategy and access rules."
)]
struct Cli {
    #[command(flatten)]
    site: SiteArgs,

    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct SiteArgs {
    /// TOML config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Content root directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, global = true)]
    addr: Option<String>,

    /// Key-value database path
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Site name shown as the page headline
    #[arg(long, global = true)]
    sitename: Option<String>,

    /// Sub-headline shown under the site name
    #[arg(long, global = true)]
    site_subtitle: Option<String>,

    /// Page template file (defaults to the built-in template)
    #[arg(long, global = true)]
    page_tpl: Option<PathBuf>,

    /// Admin console secret; the console is disabled without one
    #[arg(long, env = "CREW_ADMIN_SECRET", hide_env_values = true, global = true)]
    admin_secret: Option<String>,

    /// Script wall-clock budget in milliseconds
    #[arg(long, global = true)]
    script_timeout_ms: Option<u64>,

    /// Script memory ceiling in MiB
    #[arg(long, global = true)]
    script_memory_mb: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the site over HTTP (default)
    Serve,

    /// Print the filesystem path of every node, hidden ones included
    Tree,

    /// Print the built-in page template
    PrintTemplate,
}

impl SiteArgs {
    /// Config file values, then flag overrides.
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)?,
            None => ServerConfig::new(self.root.clone().unwrap_or_else(|| PathBuf::from("."))),
        };

        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(addr) = self.addr {
            config.addr = addr;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(name) = self.sitename {
            config.site_name = name;
        }
        if let Some(subtitle) = self.site_subtitle {
            config.site_subtitle = subtitle;
        }
        if let Some(template) = self.page_tpl {
            config.page_template = Some(template);
        }
        if let Some(secret) = self.admin_secret {
            config.admin_secret = Some(secret);
        }
        if let Some(timeout) = self.script_timeout_ms {
            config.script_timeout_ms = timeout;
        }
        if let Some(memory) = self.script_memory_mb {
            config.script_memory_mb = memory;
        }

        config.check()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(cli.site.into_config()?).await,
        Command::Tree => run_tree(&cli.site.into_config()?),
        Command::PrintTemplate => {
            print!("{}", crew_render::DEFAULT_TEMPLATE);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run_serve(config: ServerConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let state = AppState::from_config(&config)
        .with_context(|| format!("Failed to open site at {}", config.root.display()))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    crew_server::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

fn run_tree(config: &ServerConfig) -> Result<()> {
    let tree = ContentTree::open(&config.root)
        .with_context(|| format!("Invalid content root {}", config.root.display()))?;
    println!("{}", crew_server::console::list_tree(&tree));
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
