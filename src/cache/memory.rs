//! In-memory cache store provider.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{CacheStore, CacheStoreProvider, CachedEntry, Request, Response};

type Stores = HashMap<String, Vec<CachedEntry>>;

/// Storage that keeps every named store in process memory.
/// Nothing survives the process.
#[derive(Clone, Default)]
pub struct MemoryStorage {
  stores: Arc<Mutex<Stores>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStoreProvider for MemoryStorage {
  type Store = MemoryCacheStore;

  fn open(&self, name: &str) -> Result<MemoryCacheStore> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.entry(name.to_string()).or_default();

    Ok(MemoryCacheStore {
      stores: Arc::clone(&self.stores),
      name: name.to_string(),
    })
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.remove(name).is_some())
  }

  fn has(&self, name: &str) -> Result<bool> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.contains_key(name))
  }
}

/// Handle to one named store inside a [`MemoryStorage`].
pub struct MemoryCacheStore {
  stores: Arc<Mutex<Stores>>,
  name: String,
}

impl CacheStore for MemoryCacheStore {
  fn get(&self, request: &Request) -> Result<Option<Response>> {
    Ok(self.entry(request)?.map(|entry| entry.response))
  }

  fn entry(&self, request: &Request) -> Result<Option<CachedEntry>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      stores
        .get(&self.name)
        .and_then(|entries| entries.iter().find(|e| &e.request == request))
        .cloned(),
    )
  }

  fn put(&self, request: &Request, response: &Response) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let entries = stores.entry(self.name.clone()).or_default();
    entries.retain(|e| &e.request != request);
    entries.push(CachedEntry {
      request: request.clone(),
      response: response.clone(),
      cached_at: Utc::now(),
    });

    Ok(())
  }

  fn delete(&self, request: &Request) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let Some(entries) = stores.get_mut(&self.name) else {
      return Ok(false);
    };
    let before = entries.len();
    entries.retain(|e| &e.request != request);
    Ok(entries.len() != before)
  }

  fn keys(&self) -> Result<Vec<Request>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      stores
        .get(&self.name)
        .map(|entries| entries.iter().map(|e| e.request.clone()).collect())
        .unwrap_or_default(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_put_replaces_and_moves_to_end() {
    let storage = MemoryStorage::new();
    let store = storage.open("content").unwrap();
    let a = Request::get("https://app.test/a.js");
    let b = Request::get("https://app.test/b.js");

    store.put(&a, &Response::new(200, "old")).unwrap();
    store.put(&b, &Response::new(200, "b")).unwrap();
    store.put(&a, &Response::new(200, "new")).unwrap();

    assert_eq!(store.keys().unwrap(), vec![b, a.clone()]);
    assert_eq!(store.get(&a).unwrap().unwrap().body, b"new".to_vec());
  }

  #[test]
  fn test_deleted_store_reads_empty() {
    let storage = MemoryStorage::new();
    let store = storage.open("temp").unwrap();
    let a = Request::get("https://app.test/a.js");
    store.put(&a, &Response::new(200, "a")).unwrap();

    assert!(storage.delete("temp").unwrap());
    assert!(!storage.has("temp").unwrap());
    assert_eq!(store.get(&a).unwrap(), None);
    assert!(store.keys().unwrap().is_empty());
    assert!(!store.delete(&a).unwrap());
  }
}
