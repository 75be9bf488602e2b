//! Core traits and types for the cache stores.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A request identity: method plus absolute URL.
///
/// Stores only ever hold GET requests, but the method is kept so that the
/// interceptor can recognise (and ignore) everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Request {
  pub method: String,
  pub url: String,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.into(),
    }
  }

  #[cfg(test)]
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      method: method.into().to_ascii_uppercase(),
      url: url.into(),
    }
  }

  pub fn is_get(&self) -> bool {
    self.method == "GET"
  }

  /// Stable, fixed-length identity used as the storage key.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response as held by a cache store or returned by the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// Whether the status is in the 2xx range.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A stored entry with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub request: Request,
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// A single named cache store.
///
/// Every operation is individually atomic; there are no multi-operation
/// transactions.
pub trait CacheStore: Send + Sync {
  /// Look up the response stored for `request`.
  fn get(&self, request: &Request) -> Result<Option<Response>>;

  /// Look up the full entry stored for `request`.
  fn entry(&self, request: &Request) -> Result<Option<CachedEntry>>;

  /// Store `response` for `request`, replacing any existing entry.
  fn put(&self, request: &Request, response: &Response) -> Result<()>;

  /// Remove the entry for `request`. Returns whether an entry existed.
  fn delete(&self, request: &Request) -> Result<bool>;

  /// All requests currently stored, in insertion order.
  fn keys(&self) -> Result<Vec<Request>>;
}

/// Opens and deletes cache stores by name.
pub trait CacheStoreProvider: Send + Sync {
  type Store: CacheStore;

  /// Open the named store, creating it if it does not exist.
  fn open(&self, name: &str) -> Result<Self::Store>;

  /// Delete the named store and everything in it. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Whether a store with this name exists.
  fn has(&self, name: &str) -> Result<bool>;
}

/// Result of an intercepted fetch, including where the response came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: ResponseSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: ResponseSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: ResponseSource::Cache,
    }
  }

  /// Cached data served because the network was unavailable.
  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: ResponseSource::Offline,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh response from the network
  Network,
  /// Served from the content store
  Cache,
  /// Network failed, served from the content store
  Offline,
}

impl std::fmt::Display for ResponseSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Network => "network",
      Self::Cache => "cache",
      Self::Offline => "offline",
    };
    f.write_str(label)
  }
}
