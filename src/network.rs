//! Network access for the synchronizer.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;

use crate::cache::{Request, Response};

/// How a fetch should treat intermediate HTTP caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
  /// Let HTTP caches answer as usual
  #[default]
  Default,
  /// Bypass HTTP caches and revalidate with the server
  Reload,
}

impl CacheMode {
  /// Request headers that express this mode.
  pub fn headers(self) -> &'static [(&'static str, &'static str)] {
    match self {
      CacheMode::Default => &[],
      CacheMode::Reload => &[("cache-control", "no-cache"), ("pragma", "no-cache")],
    }
  }
}

/// Performs live network requests.
///
/// An `Err` means the request never produced a response (DNS, connection,
/// TLS, ...). HTTP error statuses are returned as `Ok` responses.
pub trait Fetcher: Send + Sync {
  fn fetch(
    &self,
    request: &Request,
    mode: CacheMode,
  ) -> impl Future<Output = Result<Response>> + Send;
}

/// Fetcher backed by a reqwest HTTP client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("precache/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(
    &self,
    request: &Request,
    mode: CacheMode,
  ) -> impl Future<Output = Result<Response>> + Send {
    let client = self.client.clone();
    let request = request.clone();

    async move {
      let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|e| eyre!("Invalid method {}: {}", request.method, e))?;

      let mut builder = client.request(method, &request.url);
      for (name, value) in mode.headers() {
        builder = builder.header(*name, *value);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

      let status = response.status().as_u16();
      let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
          (
            name.to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
          )
        })
        .collect();

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

      Ok(Response {
        status,
        headers,
        body: body.to_vec(),
      })
    }
  }
}
