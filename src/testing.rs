//! Fakes shared by unit tests.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::cache::{
  CacheStore, CacheStoreProvider, CachedEntry, MemoryStorage, Request, Response,
};
use crate::manifest::{CoreShellSet, ResourceManifest};
use crate::network::{CacheMode, Fetcher};
use crate::origin::Origin;

pub const ORIGIN: &str = "https://app.test";

pub fn origin() -> Origin {
  Origin::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> String {
  origin().url_for(path)
}

pub fn manifest(entries: &[(&str, &str)]) -> ResourceManifest {
  entries.iter().copied().collect()
}

pub fn shell(paths: &[&str]) -> CoreShellSet {
  paths.iter().copied().collect()
}

#[derive(Default)]
struct NetworkState {
  responses: HashMap<String, Response>,
  offline: bool,
  requests: Vec<(Request, CacheMode)>,
}

/// Scripted network: serves registered responses, 404 otherwise.
#[derive(Clone, Default)]
pub struct FakeNetwork {
  state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  /// Serve `body` with status 200 for a logical path on the test origin.
  pub fn serve(&self, path: &str, body: &str) {
    self.serve_status(path, 200, body);
  }

  pub fn serve_status(&self, path: &str, status: u16, body: &str) {
    self
      .state
      .lock()
      .unwrap()
      .responses
      .insert(url(path), Response::new(status, body));
  }

  pub fn set_offline(&self, offline: bool) {
    self.state.lock().unwrap().offline = offline;
  }

  /// Number of requests made for a logical path.
  pub fn hits(&self, path: &str) -> usize {
    let target = url(path);
    self
      .state
      .lock()
      .unwrap()
      .requests
      .iter()
      .filter(|(r, _)| r.url == target)
      .count()
  }

  pub fn requests(&self) -> Vec<(Request, CacheMode)> {
    self.state.lock().unwrap().requests.clone()
  }
}

impl Fetcher for FakeNetwork {
  fn fetch(
    &self,
    request: &Request,
    mode: CacheMode,
  ) -> impl Future<Output = Result<Response>> + Send {
    let mut state = self.state.lock().unwrap();
    state.requests.push((request.clone(), mode));

    let result = if state.offline {
      Err(eyre!("Failed to fetch {}: network unreachable", request.url))
    } else {
      Ok(
        state
          .responses
          .get(&request.url)
          .cloned()
          .unwrap_or_else(|| Response::new(404, "not found")),
      )
    };

    std::future::ready(result)
  }
}

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
  Put,
  Delete,
  Keys,
}

/// Memory storage that fails one kind of operation on one named store.
#[derive(Clone, Default)]
pub struct FailingStorage {
  inner: MemoryStorage,
  fail: Arc<Mutex<Option<(String, StoreOp)>>>,
}

impl FailingStorage {
  pub fn new(inner: MemoryStorage) -> Self {
    Self {
      inner,
      fail: Arc::default(),
    }
  }

  pub fn fail_on(&self, store: &str, op: StoreOp) {
    *self.fail.lock().unwrap() = Some((store.to_string(), op));
  }
}

impl CacheStoreProvider for FailingStorage {
  type Store = FailingStore;

  fn open(&self, name: &str) -> Result<FailingStore> {
    Ok(FailingStore {
      inner: self.inner.open(name)?,
      name: name.to_string(),
      fail: Arc::clone(&self.fail),
    })
  }

  fn delete(&self, name: &str) -> Result<bool> {
    self.inner.delete(name)
  }

  fn has(&self, name: &str) -> Result<bool> {
    self.inner.has(name)
  }
}

pub struct FailingStore {
  inner: <MemoryStorage as CacheStoreProvider>::Store,
  name: String,
  fail: Arc<Mutex<Option<(String, StoreOp)>>>,
}

impl FailingStore {
  fn check(&self, op: StoreOp) -> Result<()> {
    match &*self.fail.lock().unwrap() {
      Some((name, failing)) if *name == self.name && *failing == op => {
        Err(eyre!("Injected {:?} failure in {}", op, self.name))
      }
      _ => Ok(()),
    }
  }
}

impl CacheStore for FailingStore {
  fn get(&self, request: &Request) -> Result<Option<Response>> {
    self.inner.get(request)
  }

  fn entry(&self, request: &Request) -> Result<Option<CachedEntry>> {
    self.inner.entry(request)
  }

  fn put(&self, request: &Request, response: &Response) -> Result<()> {
    self.check(StoreOp::Put)?;
    self.inner.put(request, response)
  }

  fn delete(&self, request: &Request) -> Result<bool> {
    self.check(StoreOp::Delete)?;
    self.inner.delete(request)
  }

  fn keys(&self) -> Result<Vec<Request>> {
    self.check(StoreOp::Keys)?;
    self.inner.keys()
  }
}

/// Logical keys and bodies of a store, in key order.
pub fn snapshot<S: CacheStore>(store: &S) -> Vec<(String, String)> {
  let origin = origin();
  let mut entries: Vec<(String, String)> = store
    .keys()
    .unwrap()
    .into_iter()
    .map(|request| {
      let body = store.get(&request).unwrap().unwrap().body;
      (
        origin.stored_key(&request.url).unwrap(),
        String::from_utf8(body).unwrap(),
      )
    })
    .collect();
  entries.sort();
  entries
}
