//! Offline cache synchronizer.
//!
//! One `Synchronizer` represents one deployed version of the application.
//! It is driven by lifecycle events:
//! - install: fetch the application shell into the temp store
//! - activate: reconcile temp, content and the previous manifest into the content store
//! - fetch: serve manifest resources cache-first, the root document online-first
//! - message: skip waiting, or download every resource for offline use
//!
//! Every handler is an async fn; the event counts as handled once the
//! returned future has been awaited to completion.

mod activate;
mod event;
mod fetch;
mod install;
mod lifecycle;
mod message;
mod status;

pub use event::{spawn_event, Event, EventOutcome};
pub use fetch::FetchOutcome;
pub use lifecycle::WorkerState;
pub use status::StatusReport;

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::cache::{CacheStore, CacheStoreProvider, Request, Response};
use crate::config::StoreNames;
use crate::manifest::{CoreShellSet, ResourceManifest};
use crate::network::{CacheMode, Fetcher};
use crate::origin::Origin;

use lifecycle::Lifecycle;

/// Logical path under which the manifest snapshot is recorded.
const MANIFEST_RECORD_PATH: &str = "manifest";

/// Versioned offline cache synchronizer for one deployed manifest.
pub struct Synchronizer<P: CacheStoreProvider, F: Fetcher> {
  provider: P,
  network: F,
  origin: Origin,
  manifest: ResourceManifest,
  shell: CoreShellSet,
  stores: StoreNames,
  lifecycle: Mutex<Lifecycle>,
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Create a worker for `manifest`. Fails if the shell names unknown paths.
  pub fn new(
    provider: P,
    network: F,
    origin: Origin,
    manifest: ResourceManifest,
    shell: CoreShellSet,
  ) -> Result<Self> {
    shell.validate(&manifest)?;

    Ok(Self {
      provider,
      network,
      origin,
      manifest,
      shell,
      stores: StoreNames::default(),
      lifecycle: Mutex::new(Lifecycle::default()),
    })
  }

  /// Use custom store names.
  pub fn with_store_names(mut self, stores: StoreNames) -> Self {
    self.stores = stores;
    self
  }

  pub fn origin(&self) -> &Origin {
    &self.origin
  }

  pub fn manifest(&self) -> &ResourceManifest {
    &self.manifest
  }

  pub fn state(&self) -> Result<WorkerState> {
    Ok(self.lifecycle()?.state())
  }

  /// Installed and asked to activate without waiting.
  pub fn ready_to_activate(&self) -> Result<bool> {
    Ok(self.lifecycle()?.ready_to_activate())
  }

  /// Recover the lifecycle state persisted by earlier runs.
  ///
  /// A surviving temp store means an install is waiting to be activated,
  /// even when the same manifest was activated before. Otherwise a recorded
  /// manifest equal to ours means this version is active.
  pub fn restore(&self) -> Result<WorkerState> {
    let state = if self.provider.has(&self.stores.temp)? {
      WorkerState::Installed
    } else if self.recorded_manifest()?.as_ref() == Some(&self.manifest) {
      WorkerState::Active
    } else {
      WorkerState::Parsed
    };

    self.lifecycle()?.restore(state)?;
    debug!(%state, "Restored worker state");
    Ok(state)
  }

  fn lifecycle(&self) -> Result<MutexGuard<'_, Lifecycle>> {
    self
      .lifecycle
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn manifest_record_request(&self) -> Request {
    Request::get(self.origin.url_for(MANIFEST_RECORD_PATH))
  }

  /// Manifest snapshot written by the last successful activation, if any.
  /// Does not create the manifest-record store.
  fn recorded_manifest(&self) -> Result<Option<ResourceManifest>> {
    if !self.provider.has(&self.stores.manifest)? {
      return Ok(None);
    }
    let record = self.provider.open(&self.stores.manifest)?;
    read_manifest_record(&record, &self.manifest_record_request())
  }

  /// Fetch every request, failing as a whole if any fetch fails or
  /// returns a non-2xx status. Nothing is stored here.
  async fn fetch_all(&self, requests: &[Request], mode: CacheMode) -> Result<Vec<Response>> {
    let fetches = requests.iter().map(|request| async move {
      let response = self.network.fetch(request, mode).await?;
      if !response.is_ok() {
        return Err(eyre!(
          "Failed to fetch {}: status {}",
          request.url,
          response.status
        ));
      }
      Ok(response)
    });

    try_join_all(fetches).await
  }
}

fn read_manifest_record<S: CacheStore>(
  record: &S,
  request: &Request,
) -> Result<Option<ResourceManifest>> {
  let Some(response) = record.get(request)? else {
    return Ok(None);
  };
  let json = String::from_utf8(response.body)
    .map_err(|e| eyre!("Recorded manifest is not UTF-8: {}", e))?;
  ResourceManifest::from_json(&json).map(Some)
}
