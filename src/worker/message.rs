//! Messages posted to the worker by host pages.

use color_eyre::Result;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{Synchronizer, WorkerState};
use crate::cache::{CacheStore, CacheStoreProvider, Request};
use crate::network::{CacheMode, Fetcher};

/// A message from a host page. No reply is ever sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
  /// Activate as soon as possible instead of waiting for old pages to close
  SkipWaiting,
  /// Fetch every manifest resource not yet in the content store
  DownloadOffline,
  /// Anything else; ignored
  Unknown(String),
}

impl Message {
  pub fn parse(data: &str) -> Self {
    match data {
      "skipWaiting" => Self::SkipWaiting,
      "downloadOffline" => Self::DownloadOffline,
      other => Self::Unknown(other.to_string()),
    }
  }
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Handle a message posted by a page.
  ///
  /// `skipWaiting` activates an installed worker right away.
  pub async fn handle_message(&self, data: &str) -> Result<()> {
    match Message::parse(data) {
      Message::SkipWaiting => {
        info!("Skip waiting requested");
        let waiting = {
          let mut lifecycle = self.lifecycle()?;
          lifecycle.request_skip_waiting();
          lifecycle.state() == WorkerState::Installed
        };
        if waiting {
          self.activate().await?;
        }
      }
      Message::DownloadOffline => {
        self.download_offline().await?;
      }
      Message::Unknown(other) => {
        debug!(message = %other, "Ignoring unknown message");
      }
    }
    Ok(())
  }

  /// Fetch and store every manifest resource missing from the content store.
  ///
  /// Returns how many resources were added. Running it again right away
  /// fetches nothing.
  pub async fn download_offline(&self) -> Result<usize> {
    let content = self.provider.open(&self.stores.content)?;

    let present: HashSet<String> = content
      .keys()?
      .iter()
      .filter_map(|request| self.origin.stored_key(&request.url))
      .collect();

    let requests: Vec<Request> = self
      .manifest
      .paths()
      .filter(|path| !present.contains(*path))
      .map(|path| Request::get(self.origin.url_for(path)))
      .collect();

    if requests.is_empty() {
      debug!("Offline cache already complete");
      return Ok(0);
    }

    info!(count = requests.len(), "Downloading resources for offline use");
    let responses = self.fetch_all(&requests, CacheMode::Default).await?;
    for (request, response) in requests.iter().zip(&responses) {
      content.put(request, response)?;
    }

    Ok(requests.len())
  }
}
