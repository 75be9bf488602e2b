use color_eyre::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{FetchOutcome, Synchronizer};
use crate::cache::{CacheStoreProvider, Request};
use crate::network::Fetcher;

/// Lifecycle events delivered to a worker
#[derive(Debug, Clone)]
pub enum Event {
  Install,
  Activate,
  /// A page fetch
  Fetch(Request),
  /// A message posted by a page
  Message(String),
}

/// Result of a handled event
#[derive(Debug)]
pub enum EventOutcome {
  Completed,
  Fetched(FetchOutcome),
}

impl<P: CacheStoreProvider, F: Fetcher> Synchronizer<P, F> {
  /// Route an event to its handler. The event is handled once the returned
  /// future completes.
  pub async fn dispatch(&self, event: Event) -> Result<EventOutcome> {
    match event {
      Event::Install => self.install().await.map(|_| EventOutcome::Completed),
      Event::Activate => self.activate().await.map(|_| EventOutcome::Completed),
      Event::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Fetched),
      Event::Message(data) => self
        .handle_message(&data)
        .await
        .map(|_| EventOutcome::Completed),
    }
  }
}

/// Dispatch an event on its own task so handlers can interleave.
pub fn spawn_event<P, F>(
  worker: &Arc<Synchronizer<P, F>>,
  event: Event,
) -> JoinHandle<Result<EventOutcome>>
where
  P: CacheStoreProvider + 'static,
  F: Fetcher + 'static,
{
  let worker = Arc::clone(worker);
  tokio::spawn(async move { worker.dispatch(event).await })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStorage, ResponseSource};
  use crate::testing::{manifest, origin, shell, url, FakeNetwork};
  use crate::worker::WorkerState;

  #[tokio::test]
  async fn test_dispatch_full_lifecycle() {
    let network = FakeNetwork::new();
    network.serve("a.js", "a");
    network.serve("b.js", "b");
    let sync = Synchronizer::new(
      MemoryStorage::new(),
      network,
      origin(),
      manifest(&[("a.js", "h1"), ("b.js", "h2")]),
      shell(&["a.js"]),
    )
    .unwrap();

    sync.dispatch(Event::Install).await.unwrap();
    sync.dispatch(Event::Activate).await.unwrap();
    assert_eq!(sync.state().unwrap(), WorkerState::Active);

    sync
      .dispatch(Event::Message("downloadOffline".to_string()))
      .await
      .unwrap();

    match sync
      .dispatch(Event::Fetch(Request::get(url("b.js"))))
      .await
      .unwrap()
    {
      EventOutcome::Fetched(FetchOutcome::Respond(result)) => {
        assert_eq!(result.source, ResponseSource::Cache);
      }
      other => panic!("unexpected outcome {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_concurrent_fetches_during_activation() {
    let network = FakeNetwork::new();
    for path in ["a.js", "b.js", "c.js"] {
      network.serve(path, path);
    }
    let sync = Arc::new(
      Synchronizer::new(
        MemoryStorage::new(),
        network,
        origin(),
        manifest(&[("a.js", "h1"), ("b.js", "h2"), ("c.js", "h3")]),
        shell(&["a.js"]),
      )
      .unwrap(),
    );
    sync.dispatch(Event::Install).await.unwrap();

    let activation = spawn_event(&sync, Event::Activate);
    let fetches: Vec<_> = ["a.js", "b.js", "c.js"]
      .iter()
      .map(|path| spawn_event(&sync, Event::Fetch(Request::get(url(path)))))
      .collect();

    activation.await.unwrap().unwrap();
    for fetch in fetches {
      // Either passed through (not yet activating) or answered.
      fetch.await.unwrap().unwrap();
    }
    assert_eq!(sync.state().unwrap(), WorkerState::Active);
  }
}
