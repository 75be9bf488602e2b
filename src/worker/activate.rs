//! Activate: reconcile the temp store, the content store and the previous
//! manifest into the content store for this version.

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, error, info};

use super::{read_manifest_record, Synchronizer};
use crate::cache::{CacheStore, CacheStoreProvider, Response};
use crate::network::Fetcher;

/// What a successful activation did to the content store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  /// No previous manifest was recorded
  pub first_install: bool,
  /// Entries kept because their fingerprint did not change
  pub retained: usize,
  /// Entries removed as changed or no longer deployed
  pub evicted: usize,
  /// Shell entries copied from the temp store
  pub shell: usize,
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Handle the activate event.
  ///
  /// On any failure the cache state cannot be trusted: all three stores
  /// are deleted so the next activation starts clean, and the error is
  /// returned after the wipe.
  pub async fn activate(&self) -> Result<ReconcileReport> {
    self.lifecycle()?.begin_activate()?;
    info!("Activating");

    match self.reconcile() {
      Ok(report) => {
        {
          let mut lifecycle = self.lifecycle()?;
          lifecycle.finish_activate(true);
          lifecycle.claim_clients();
        }
        info!(
          first_install = report.first_install,
          retained = report.retained,
          evicted = report.evicted,
          shell = report.shell,
          "Activated, controlling open clients"
        );
        Ok(report)
      }
      Err(e) => {
        error!("Failed to upgrade cache: {:?}", e);
        self.wipe();
        self.lifecycle()?.finish_activate(false);
        Err(e)
      }
    }
  }

  fn reconcile(&self) -> Result<ReconcileReport> {
    let mut content = self.provider.open(&self.stores.content)?;
    let temp = self.provider.open(&self.stores.temp)?;
    let record = self.provider.open(&self.stores.manifest)?;
    let record_request = self.manifest_record_request();

    let mut report = ReconcileReport::default();

    match read_manifest_record(&record, &record_request)? {
      None => {
        // Nothing to diff against: start from an empty content store.
        report.first_install = true;
        self.provider.delete(&self.stores.content)?;
        content = self.provider.open(&self.stores.content)?;
      }
      Some(previous) => {
        for request in content.keys()? {
          // Unchanged fingerprints are trusted without re-checking content.
          let keep = self
            .origin
            .stored_key(&request.url)
            .is_some_and(|path| self.manifest.retains(&previous, &path));

          if keep {
            report.retained += 1;
          } else {
            debug!(url = %request.url, "Evicting");
            content.delete(&request)?;
            report.evicted += 1;
          }
        }
      }
    }

    // Shell files always get the freshest copy.
    for request in temp.keys()? {
      let response = temp
        .get(&request)?
        .ok_or_else(|| eyre!("Temp entry {} disappeared during activation", request.url))?;
      content.put(&request, &response)?;
      report.shell += 1;
    }

    self.provider.delete(&self.stores.temp)?;

    let mut snapshot = Response::new(200, self.manifest.to_json()?);
    snapshot
      .headers
      .push(("content-type".to_string(), "application/json".to_string()));
    record.put(&record_request, &snapshot)?;

    Ok(report)
  }

  /// Delete every store this worker owns, continuing past individual failures.
  pub(super) fn wipe(&self) {
    for name in self.stores.all() {
      if let Err(e) = self.provider.delete(name) {
        error!("Failed to delete cache store {}: {}", name, e);
      }
    }
  }
}
