//! Fetch interception: cache-first with lazy fill, online-first for `/`.

use color_eyre::Result;
use tracing::{debug, info, warn};

use super::Synchronizer;
use crate::cache::{CacheResult, CacheStore, CacheStoreProvider, Request, Response};
use crate::network::{CacheMode, Fetcher};

/// Outcome of an intercepted fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
  /// Not ours; the host should perform the request unmodified
  Passthrough,
  /// Answered by the worker
  Respond(CacheResult<Response>),
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Handle a fetch from a page.
  ///
  /// Only GET requests for manifest resources are intercepted, and only
  /// while this worker controls pages. A network failure on a cache miss
  /// is returned as the error for this request.
  pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
    if !request.is_get() {
      return Ok(FetchOutcome::Passthrough);
    }

    let state = self.state()?;
    if !state.controls_clients() {
      debug!(%state, url = %request.url, "Not controlling clients, passing through");
      return Ok(FetchOutcome::Passthrough);
    }

    let Some(path) = self.origin.request_path(&request.url) else {
      return Ok(FetchOutcome::Passthrough);
    };
    if !self.manifest.contains(&path) {
      debug!(%path, "Not in manifest, passing through");
      return Ok(FetchOutcome::Passthrough);
    }

    let result = if path == "/" {
      self.online_first(request).await?
    } else {
      self.cache_first(request).await?
    };

    debug!(%path, source = %result.source, status = result.data.status, "Served");
    Ok(FetchOutcome::Respond(result))
  }

  async fn cache_first(&self, request: &Request) -> Result<CacheResult<Response>> {
    let content = self.provider.open(&self.stores.content)?;

    if let Some(cached) = content.get(request)? {
      return Ok(CacheResult::from_cache(cached));
    }

    let response = self.network.fetch(request, CacheMode::Default).await?;
    if response.is_ok() {
      if let Err(e) = content.put(request, &response) {
        warn!("Failed to cache {}: {}", request.url, e);
      }
    }

    Ok(CacheResult::from_network(response))
  }

  /// Prefer the network so the entry document is fresh whenever online.
  async fn online_first(&self, request: &Request) -> Result<CacheResult<Response>> {
    match self.network.fetch(request, CacheMode::Default).await {
      Ok(response) => {
        if response.is_ok() {
          if let Err(e) = self.store_content(request, &response) {
            warn!("Failed to cache {}: {}", request.url, e);
          }
        }
        Ok(CacheResult::from_network(response))
      }
      Err(network_error) => {
        let cached = self
          .provider
          .open(&self.stores.content)
          .and_then(|content| content.get(request));

        match cached {
          Ok(Some(response)) => {
            info!(url = %request.url, "Network unavailable, serving cached copy");
            Ok(CacheResult::offline(response))
          }
          Ok(None) => Err(network_error),
          Err(e) => {
            warn!("Failed to read cached {}: {}", request.url, e);
            Err(network_error)
          }
        }
      }
    }
  }

  fn store_content(&self, request: &Request, response: &Response) -> Result<()> {
    self
      .provider
      .open(&self.stores.content)?
      .put(request, response)
  }
}
