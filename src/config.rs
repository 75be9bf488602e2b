use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cache::SqliteStorage;
use crate::manifest::{CoreShellSet, ResourceManifest};
use crate::origin::Origin;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin the application is served from, e.g. https://app.example.com
  pub origin: String,
  /// Path to the deployed resource manifest (JSON object of path -> fingerprint)
  pub manifest: PathBuf,
  /// Paths fetched during install, before the application can render
  #[serde(default)]
  pub shell: Vec<String>,
  #[serde(default)]
  pub stores: StoreNames,
  /// SQLite database holding the stores (default: $XDG_DATA_HOME/precache/cache.db)
  pub database: Option<PathBuf>,
  /// Write logs to precache.log in this directory instead of stderr
  pub log_dir: Option<PathBuf>,
}

/// Names of the three stores the synchronizer owns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreNames {
  /// Live content served to pages
  pub content: String,
  /// Scratch space filled during install
  pub temp: String,
  /// Snapshot of the last activated manifest
  pub manifest: String,
}

impl Default for StoreNames {
  fn default() -> Self {
    Self {
      content: "app-cache".to_string(),
      temp: "app-temp-cache".to_string(),
      manifest: "app-manifest".to_string(),
    }
  }
}

impl StoreNames {
  pub fn all(&self) -> [&str; 3] {
    [&self.content, &self.temp, &self.manifest]
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./precache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/precache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    if let Some(p) = explicit_path {
      if !p.exists() {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
      return Self::load_from_path(p);
    }

    let candidates = Self::search_paths();
    match candidates.iter().find(|p| p.exists()) {
      Some(p) => Self::load_from_path(p),
      None => Err(Self::not_found(&candidates)),
    }
  }

  /// Implicit config locations, most specific first.
  fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("precache.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
      paths.push(config_dir.join("precache").join("config.yaml"));
    }
    paths
  }

  fn not_found(searched: &[PathBuf]) -> color_eyre::Report {
    let searched: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
    eyre!(
      "No configuration file found (searched {}).\n\
       See config.example.yaml for the format.",
      searched.join(", ")
    )
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.relative_to(base))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  /// Resolve relative file paths against the directory holding the config file.
  fn relative_to(mut self, base: &Path) -> Self {
    let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
    self.manifest = resolve(self.manifest);
    self.database = self.database.map(resolve);
    self.log_dir = self.log_dir.map(resolve);
    self
  }

  pub fn origin(&self) -> Result<Origin> {
    Origin::parse(&self.origin)
  }

  pub fn load_manifest(&self) -> Result<ResourceManifest> {
    let manifest = ResourceManifest::load(&self.manifest)?;
    if manifest.is_empty() {
      warn!("Resource manifest {} lists no resources", self.manifest.display());
    }
    Ok(manifest)
  }

  pub fn shell(&self) -> CoreShellSet {
    CoreShellSet::new(self.shell.clone())
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database {
      Some(path) => Ok(path.clone()),
      None => SqliteStorage::default_path(),
    }
  }
}
