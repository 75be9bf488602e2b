//! Install: warm the temp store with the application shell.

use color_eyre::Result;
use tracing::{info, warn};

use super::Synchronizer;
use crate::cache::{CacheStore, CacheStoreProvider, Request};
use crate::network::{CacheMode, Fetcher};

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Handle the install event.
  ///
  /// Fetches every shell path bypassing HTTP caches and stores the responses
  /// in the temp store. The content store is not touched. Any failed fetch
  /// fails the install before anything is written.
  pub async fn install(&self) -> Result<()> {
    {
      let mut lifecycle = self.lifecycle()?;
      lifecycle.begin_install()?;
      // Upgrade latency beats waiting for every old page to close.
      lifecycle.request_skip_waiting();
    }

    info!(
      shell = self.shell.paths().len(),
      resources = self.manifest.len(),
      "Installing"
    );

    let result = self.populate_temp().await;
    self.lifecycle()?.finish_install(result.is_ok());

    match &result {
      Ok(count) => info!(count, "Installed shell into {}", self.stores.temp),
      Err(e) => warn!("Install failed: {}", e),
    }

    result.map(|_| ())
  }

  async fn populate_temp(&self) -> Result<usize> {
    let requests: Vec<Request> = self
      .shell
      .paths()
      .iter()
      .map(|path| Request::get(self.origin.url_for(path)))
      .collect();

    let responses = self.fetch_all(&requests, CacheMode::Reload).await?;

    let temp = self.provider.open(&self.stores.temp)?;
    for (request, response) in requests.iter().zip(&responses) {
      temp.put(request, response)?;
    }

    Ok(requests.len())
  }
}
