mod cache;
mod config;
mod db;
mod error;
mod logging;
mod query;
mod remote;
mod render;
mod selection;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use cache::{CacheLayer, CacheStorage, SqliteStorage, Synchronizer};
use config::Config;
use query::Query;
use remote::types::Base;
use remote::RemoteClient;
use selection::Selection;

#[derive(Parser, Debug)]
#[command(name = "connect")]
#[command(about = "Base directory that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/connect/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List all bases; followed ones are marked with *
  Bases,
  /// Follow the given bases (replacing the current selection) and sync them
  Follow {
    #[arg(required = true)]
    ids: Vec<String>,
  },
  /// List followed bases
  Followed,
  /// Refresh the local cache for every followed base
  Sync,
  /// Show a base's organizations and page
  View { id: String },
  /// Show whether cached data is available and how old it is
  Status,
  /// Forget followed bases and wipe the local cache
  Clear,
}

type Loader = CacheLayer<RemoteClient, SqliteStorage>;

struct App {
  loader: Loader,
  synchronizer: Synchronizer<RemoteClient, SqliteStorage>,
  storage: Arc<SqliteStorage>,
  selection: Selection,
}

impl App {
  fn new(config: &Config) -> Result<Self> {
    let remote = Arc::new(RemoteClient::new(config)?);
    let storage = Arc::new(SqliteStorage::open(&config.database_path()?)?);
    Ok(Self {
      loader: CacheLayer::new(Arc::clone(&remote), Arc::clone(&storage)),
      synchronizer: Synchronizer::new(remote, Arc::clone(&storage))
        .with_concurrency(config.sync.concurrency),
      storage,
      selection: Selection::new(config.selection_path()?),
    })
  }

  async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Bases => self.bases().await,
      Command::Follow { ids } => self.follow(&ids).await,
      Command::Followed => self.followed(),
      Command::Sync => self.sync().await,
      Command::View { id } => self.view(id).await,
      Command::Status => self.status(),
      Command::Clear => self.clear(),
    }
  }

  async fn bases(&self) -> Result<()> {
    let result = self.loader.load_bases().await?;
    if result.from_cache() {
      println!("{}", render::offline_banner(result.cached_at));
    }
    let followed: HashSet<String> = self.selection.load()?.into_iter().map(|b| b.id).collect();
    for base in &result.data {
      println!("{}", render::base_line(base, followed.contains(&base.id)));
    }
    Ok(())
  }

  async fn follow(&self, ids: &[String]) -> Result<()> {
    let all = self.loader.load_bases().await?.data;
    let mut chosen = Vec::new();
    for id in ids {
      let base = all
        .iter()
        .find(|b| &b.id == id)
        .ok_or_else(|| eyre!("Unknown base: {}", id))?;
      chosen.push(base.clone());
    }

    let previous = self.selection.load()?;
    self.selection.save(&chosen)?;
    info!("Following {} bases", chosen.len());

    for dropped in previous.iter().filter(|p| !chosen.iter().any(|c| c.id == p.id)) {
      info!("Dropping cached data for unfollowed base {}", dropped.id);
      self.storage.clear_base(&dropped.id)?;
    }
    self.sync().await
  }

  fn followed(&self) -> Result<()> {
    let followed = self.selection.load()?;
    if followed.is_empty() {
      println!("No bases followed. Use `connect follow <id>`.");
    }
    for base in &followed {
      println!("{}", render::base_line(base, true));
    }
    Ok(())
  }

  async fn sync(&self) -> Result<()> {
    if self.selection.is_empty()? {
      println!("No bases followed, nothing to sync.");
      return Ok(());
    }
    let followed = self.selection.load()?;
    let report = self.synchronizer.spawn(followed).await?;
    print!("{}", render::sync_report(&report));
    Ok(())
  }

  async fn view(&self, id: String) -> Result<()> {
    if let Some(base) = self.storage.get_by_id::<Base>(&id)? {
      println!("{} ({}, {})\n", base.name, base.city, base.state);
    }

    let loader = self.loader.clone();
    let mut query = Query::new(move || {
      let loader = loader.clone();
      let id = id.clone();
      async move { loader.load_base_view(&id).await }
    });

    query.fetch();
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    while !query.poll() {
      tick.tick().await;
    }

    let state = query.state();
    if let Some(result) = state.data() {
      print!("{}", render::base_view(result));
      Ok(())
    } else if let Some(e) = state.error() {
      Err(eyre!("{}", e))
    } else {
      Err(eyre!("load did not finish"))
    }
  }

  fn status(&self) -> Result<()> {
    let followed = self.selection.load()?;
    let cached_bases = self.loader.subscribe_bases().borrow().len();
    println!(
      "Followed bases: {} ({})",
      followed.len(),
      self.selection.path().display()
    );
    println!(
      "Cached data:    {} ({} bases)",
      if self.loader.has_cached_data()? { "yes" } else { "no" },
      cached_bases
    );
    println!(
      "Last updated:   {}",
      render::timestamp(self.loader.last_update_time()?)
    );
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self.selection.clear()?;
    self.storage.clear_all()?;
    println!("Cleared followed bases and cached data.");
    Ok(())
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _guard = logging::init(&Config::data_dir()?.join("logs"), config.log.level.as_deref())?;

  let app = App::new(&config)?;
  app.run(args.command).await
}
