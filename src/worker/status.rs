//! Read-only inspection of the stores a worker owns.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::collections::HashSet;

use super::{Synchronizer, WorkerState};
use crate::cache::{CacheStore, CacheStoreProvider};
use crate::network::Fetcher;

#[derive(Debug, Clone)]
pub struct StoreStatus {
  pub name: String,
  pub exists: bool,
}

#[derive(Debug, Clone)]
pub struct EntryStatus {
  /// Logical path, or the full URL for entries outside the origin
  pub path: String,
  pub status: u16,
  pub size: usize,
  pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
  pub state: WorkerState,
  pub skip_waiting: bool,
  pub clients_claimed: bool,
  pub stores: Vec<StoreStatus>,
  /// Entries in the content store
  pub entries: Vec<EntryStatus>,
  /// Number of resources in the recorded manifest snapshot, if any
  pub recorded_resources: Option<usize>,
  /// Whether the recorded snapshot is this worker's manifest
  pub recorded_is_current: bool,
  /// Manifest paths not in the content store
  pub missing: Vec<String>,
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Describe the stores without creating or modifying any of them.
  pub fn status(&self) -> Result<StatusReport> {
    let (state, skip_waiting, clients_claimed) = {
      let lifecycle = self.lifecycle()?;
      (
        lifecycle.state(),
        lifecycle.skip_waiting(),
        lifecycle.clients_claimed(),
      )
    };

    let mut stores = Vec::new();
    for name in self.stores.all() {
      stores.push(StoreStatus {
        name: name.to_string(),
        exists: self.provider.has(name)?,
      });
    }

    let mut entries = Vec::new();
    if self.provider.has(&self.stores.content)? {
      let content = self.provider.open(&self.stores.content)?;
      for request in content.keys()? {
        if let Some(entry) = content.entry(&request)? {
          entries.push(EntryStatus {
            path: self
              .origin
              .stored_key(&entry.request.url)
              .unwrap_or_else(|| entry.request.url.clone()),
            status: entry.response.status,
            size: entry.response.body.len(),
            cached_at: entry.cached_at,
          });
        }
      }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let present: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    let missing = self
      .manifest
      .paths()
      .filter(|path| !present.contains(path))
      .map(String::from)
      .collect();

    let recorded = self.recorded_manifest()?;

    Ok(StatusReport {
      state,
      skip_waiting,
      clients_claimed,
      stores,
      entries,
      recorded_resources: recorded.as_ref().map(|m| m.len()),
      recorded_is_current: recorded.as_ref() == Some(&self.manifest),
      missing,
    })
  }
}
