//!
//! src/main.rs  Andrew Belles  Oct 16th, 2026
//!
//! Command line entry of the discogs release watcher. Wires config,
//! logging, the id store and the discogs client into a Watcher session
//!
//!

mod config;
mod errors;
mod logging;
mod types;

mod fetch;
mod input;
mod persistent;
mod pipeline;
mod render;

use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::WatcherError;
use crate::fetch::DiscogsClient;
use crate::persistent::{FileStore, IdentifierStore};
use crate::pipeline::{RefreshOutcome, Watcher};
use crate::types::{OutputFormat, SortDirection, SortKey, SortSpec, ViewFilter};

#[derive(Parser, Debug)]
#[command(name = "discogs-watcher", version, about = "Track Discogs releases and their marketplace prices")]
struct Cli {
    #[command(flatten)]
    view: ViewArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Copy)]
struct ViewArgs {
    /// Column to sort by
    #[arg(long, value_enum, default_value_t = SortKey::Lowest, global = true)]
    sort: SortKey,

    /// Sort descending
    #[arg(long, global = true)]
    desc: bool,

    /// Only show releases with copies for sale
    #[arg(long, global = true)]
    in_stock: bool,

    /// Show the full size cover image instead of the thumbnail
    #[arg(long, global = true)]
    full_images: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,
}

impl ViewArgs {
    fn filter(&self) -> ViewFilter {
        ViewFilter { only_in_stock: self.in_stock }
    }

    fn sort(&self) -> SortSpec {
        let direction = if self.desc { SortDirection::Desc } else { SortDirection::Asc };
        SortSpec { key: self.sort, direction }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track a release by id or release url, then refresh
    Add { input: String },
    /// Stop tracking a release, then refresh
    Remove { id: u64 },
    /// Print tracked ids
    Ids,
    /// Refresh and print the table (default)
    Show,
    /// Refresh on an interval until ctrl-c
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
        every: u64,
    },
}

async fn print_view(watcher: &Watcher, view: ViewArgs) -> Result<(), WatcherError> {
    let ids  = watcher.ids().await;
    let rows = watcher.display_rows(view.filter(), view.sort()).await;
    let state = watcher.snapshot().await;
    match view.format {
        OutputFormat::Human => print!("{}", render::render_view(&ids, &state, &rows, view.full_images)),
        OutputFormat::Json => println!("{}", render::render_json(&ids, &state, &rows)?)
    }
    Ok(())
}

async fn refresh_and_print(watcher: &Watcher, view: ViewArgs) -> Result<ExitCode, WatcherError> {
    let outcome = watcher.refresh().await;
    print_view(watcher, view).await?;
    Ok(match outcome {
        RefreshOutcome::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS
    })
}

async fn watch(watcher: Arc<Watcher>, view: ViewArgs, every: Duration) -> ExitCode {
    let shutdown = CancellationToken::new();
    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(msg = "shutting watcher down", "watch.signal");
                shutdown.cancel();
            }
        })
    };

    info!(every_secs = every.as_secs(), "watch.start");
    let mut ticker = tokio::time::interval(every);
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let watcher = Arc::clone(&watcher);
                inflight.spawn(async move {
                    let outcome = watcher.refresh().await;
                    if matches!(outcome, RefreshOutcome::Superseded { .. }) {
                        return;
                    }
                    if let Err(e) = print_view(&watcher, view).await {
                        error!(error = %e, "watch.print.failed");
                    }
                });
            }
            Some(_) = inflight.join_next() => {}
        }
    }

    inflight.abort_all();
    trigger.abort();
    info!("watch.exit");
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<ExitCode, WatcherError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "discogs-watcher",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );
    if cfgs.discogs.token.is_none() {
        info!("DISCOGS_TOKEN not set, requests are unauthenticated");
    }

    let store = IdentifierStore::load(
        Box::new(FileStore::new(&cfgs.store.root)),
        cfgs.store.key.clone()
    );
    let client = DiscogsClient::new(&cfgs.http, &cfgs.discogs)?;
    let watcher = Arc::new(Watcher::new(store, Arc::new(client)));
    let view = cli.view;

    let code = match cli.command.unwrap_or(Commands::Show) {
        Commands::Add { input } => match input::parse_release_id(&input) {
            Ok(id) => {
                watcher.add(id).await;
                refresh_and_print(&watcher, view).await?
            },
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(2)
            }
        },
        Commands::Remove { id } => {
            watcher.remove(id).await;
            refresh_and_print(&watcher, view).await?
        },
        Commands::Ids => {
            for id in watcher.ids().await {
                println!("{id}");
            }
            ExitCode::SUCCESS
        },
        Commands::Show => refresh_and_print(&watcher, view).await?,
        Commands::Watch { every } => {
            watch(Arc::clone(&watcher), view, Duration::from_secs(every)).await
        }
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
