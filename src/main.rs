mod cache;
mod config;
mod manifest;
mod network;
mod origin;
#[cfg(test)]
mod testing;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cache::{CacheStoreProvider, Request, SqliteStorage};
use network::{CacheMode, Fetcher, HttpFetcher};
use worker::{spawn_event, Event, EventOutcome, FetchOutcome, Synchronizer};

#[derive(Parser, Debug)]
#[command(name = "precache")]
#[command(about = "Versioned offline-first cache synchronizer for deployed web applications")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./precache.yaml or $XDG_CONFIG_HOME/precache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level (overridden by PRECACHE_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install the deployed manifest and activate it
  Sync,
  /// Fetch the application shell into the temp store and wait
  Install,
  /// Activate a previously installed manifest
  Activate,
  /// Fetch resources through the worker
  Fetch {
    /// Absolute URLs or origin-relative paths
    #[arg(required = true)]
    targets: Vec<String>,
  },
  /// Post a message to the worker (skipWaiting, downloadOffline)
  Message { value: String },
  /// Show worker state and store contents
  Status,
  /// Delete every store
  Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = init_tracing(config.log_dir.as_deref(), args.verbose)?;

  let storage = SqliteStorage::open(&config.database_path()?)?;
  let network = HttpFetcher::new()?;
  let worker = Arc::new(
    Synchronizer::new(
      storage.clone(),
      network.clone(),
      config.origin()?,
      config.load_manifest()?,
      config.shell(),
    )?
    .with_store_names(config.stores.clone()),
  );

  match args.command {
    Command::Sync => {
      worker.install().await?;
      if worker.ready_to_activate()? {
        let report = worker.activate().await?;
        println!(
          "Activated {} resources: {} shell, {} retained, {} evicted{}",
          worker.manifest().len(),
          report.shell,
          report.retained,
          report.evicted,
          if report.first_install { " (first install)" } else { "" }
        );
      } else {
        println!("Installed; waiting to activate");
      }
    }
    Command::Install => {
      worker.install().await?;
      println!("Installed; run `precache activate` to activate");
    }
    Command::Activate => {
      worker.restore()?;
      let report = worker.activate().await?;
      println!(
        "Activated: {} shell, {} retained, {} evicted",
        report.shell, report.retained, report.evicted
      );
    }
    Command::Fetch { targets } => {
      worker.restore()?;
      let handles: Vec<_> = targets
        .iter()
        .map(|target| {
          let request = Request::get(worker.origin().resolve(target));
          (request.clone(), spawn_event(&worker, Event::Fetch(request)))
        })
        .collect();

      for (request, handle) in handles {
        let outcome = handle
          .await
          .map_err(|e| eyre!("Fetch task for {} failed: {}", request.url, e))?;
        match outcome {
          Ok(EventOutcome::Fetched(FetchOutcome::Respond(result))) => println!(
            "{} {} {} bytes ({})",
            result.data.status,
            request.url,
            result.data.body.len(),
            result.source
          ),
          Ok(_) => {
            let response = network.fetch(&request, CacheMode::Default).await?;
            println!(
              "{} {} {} bytes (passthrough)",
              response.status,
              request.url,
              response.body.len()
            );
          }
          Err(e) => println!("ERR {} {}", request.url, e),
        }
      }
    }
    Command::Message { value } => {
      worker.restore()?;
      worker.dispatch(Event::Message(value)).await?;
    }
    Command::Status => {
      worker.restore()?;
      print_status(&worker.status()?);
    }
    Command::Reset => {
      for name in config.stores.all() {
        let existed = storage.delete(name)?;
        println!("{} {}", if existed { "deleted" } else { "absent " }, name);
      }
    }
  }

  Ok(())
}

/// Log to `precache.log` in `log_dir` when configured, stderr otherwise.
fn init_tracing(log_dir: Option<&Path>, verbose: bool) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_env("PRECACHE_LOG")
    .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

  let (writer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "precache.log"))
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(log_dir.is_none())
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn print_status(report: &worker::StatusReport) {
  println!(
    "state: {}{}{}",
    report.state,
    if report.skip_waiting { " (skip waiting)" } else { "" },
    if report.clients_claimed { " (controlling clients)" } else { "" }
  );

  for store in &report.stores {
    println!(
      "store {}: {}",
      store.name,
      if store.exists { "present" } else { "absent" }
    );
  }

  match report.recorded_resources {
    Some(count) if report.recorded_is_current => {
      println!("recorded manifest: {} resources (current)", count)
    }
    Some(count) => println!("recorded manifest: {} resources (previous version)", count),
    None => println!("recorded manifest: none"),
  }

  println!("cached: {}", report.entries.len());
  for entry in &report.entries {
    println!(
      "  {:>3} {:>9} {}  {}",
      entry.status,
      entry.size,
      entry.cached_at.format("%Y-%m-%d %H:%M:%S"),
      entry.path
    );
  }

  println!("missing: {}", report.missing.len());
  for path in &report.missing {
    println!("  {}", path);
  }
}
