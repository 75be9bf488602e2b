//! The application origin and URL ↔ logical path resolution.
//!
//! Logical paths are origin-relative without the leading slash
//! (`main.js`, `assets/font.otf`), except the root document which is `/`.

use color_eyre::{eyre::eyre, Result};
use url::Url;

/// Query marker used by hosts to bust caches (`main.js?v=123`).
const VERSION_QUERY: &str = "?v=";

/// Scheme, host and port of the deployed application, e.g. `https://app.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
  /// Parse an origin from any URL on it. Path, query and fragment are dropped.
  pub fn parse(input: &str) -> Result<Self> {
    let url = Url::parse(input).map_err(|e| eyre!("Invalid origin '{}': {}", input, e))?;

    match url.scheme() {
      "http" | "https" => {}
      other => return Err(eyre!("Unsupported origin scheme '{}' in '{}'", other, input)),
    }

    let origin = url.origin();
    if !origin.is_tuple() {
      return Err(eyre!("Origin '{}' has no host", input));
    }

    Ok(Self(origin.ascii_serialization()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Absolute URL of a logical path.
  pub fn url_for(&self, path: &str) -> String {
    if path == "/" {
      format!("{}/", self.0)
    } else {
      format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
  }

  /// Absolute URL for user input that is either already absolute or a logical path.
  pub fn resolve(&self, input: &str) -> String {
    match Url::parse(input) {
      Ok(url) => url.to_string(),
      Err(_) => self.url_for(input),
    }
  }

  /// Everything after the origin, or `None` for URLs on another origin.
  fn strip<'a>(&self, url: &'a str) -> Option<&'a str> {
    let rest = url.strip_prefix(self.0.as_str())?;
    if rest.is_empty() || rest.starts_with('/') || rest.starts_with('#') || rest.starts_with('?') {
      Some(rest)
    } else {
      // e.g. `https://app.example.com.evil/`
      None
    }
  }

  /// Logical path of a URL stored as a cache key.
  pub fn stored_key(&self, url: &str) -> Option<String> {
    let rest = self.strip(url)?;
    let key = rest.strip_prefix('/').unwrap_or(rest);
    if key.is_empty() {
      Some("/".to_string())
    } else {
      Some(key.to_string())
    }
  }

  /// Logical path of an intercepted request URL.
  ///
  /// Drops a trailing `?v=` cache-busting suffix. The bare origin, the
  /// origin followed by a fragment, and an empty path all resolve to `/`.
  pub fn request_path(&self, url: &str) -> Option<String> {
    let rest = self.strip(url)?;
    if rest.is_empty() || rest.starts_with("/#") || rest.starts_with('#') {
      return Some("/".to_string());
    }

    let key = rest.strip_prefix('/').unwrap_or(rest);
    let key = match key.find(VERSION_QUERY) {
      Some(idx) => &key[..idx],
      None => key,
    };

    if key.is_empty() {
      Some("/".to_string())
    } else {
      Some(key.to_string())
    }
  }
}

impl std::fmt::Display for Origin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn origin() -> Origin {
    Origin::parse("https://app.test").unwrap()
  }

  #[test]
  fn test_parse_drops_path_and_trailing_slash() {
    let origin = Origin::parse("https://App.Test:8443/some/path?q=1#x").unwrap();
    assert_eq!(origin.as_str(), "https://app.test:8443");
  }

  #[test]
  fn test_parse_rejects_non_http() {
    assert!(Origin::parse("file:///tmp/index.html").is_err());
    assert!(Origin::parse("not a url").is_err());
  }

  #[test]
  fn test_url_for_root_and_paths() {
    let origin = origin();
    assert_eq!(origin.url_for("/"), "https://app.test/");
    assert_eq!(origin.url_for("main.js"), "https://app.test/main.js");
    assert_eq!(origin.url_for("/main.js"), "https://app.test/main.js");
  }

  #[test]
  fn test_resolve_keeps_absolute_urls() {
    let origin = origin();
    assert_eq!(origin.resolve("https://cdn.test/x.js"), "https://cdn.test/x.js");
    assert_eq!(origin.resolve("assets/a.png"), "https://app.test/assets/a.png");
  }

  #[test]
  fn test_stored_key() {
    let origin = origin();
    assert_eq!(origin.stored_key("https://app.test/"), Some("/".to_string()));
    assert_eq!(origin.stored_key("https://app.test"), Some("/".to_string()));
    assert_eq!(
      origin.stored_key("https://app.test/assets/a.png"),
      Some("assets/a.png".to_string())
    );
    assert_eq!(origin.stored_key("https://other.test/a.png"), None);
    assert_eq!(origin.stored_key("https://app.test.evil/a.png"), None);
  }

  #[test]
  fn test_request_path_root_forms() {
    let origin = origin();
    assert_eq!(origin.request_path("https://app.test"), Some("/".to_string()));
    assert_eq!(origin.request_path("https://app.test/"), Some("/".to_string()));
    assert_eq!(
      origin.request_path("https://app.test/#/settings"),
      Some("/".to_string())
    );
    assert_eq!(origin.request_path("https://app.test/?v=42"), Some("/".to_string()));
  }

  #[test]
  fn test_request_path_strips_version_query() {
    let origin = origin();
    assert_eq!(
      origin.request_path("https://app.test/main.js?v=12345"),
      Some("main.js".to_string())
    );
    assert_eq!(
      origin.request_path("https://app.test/main.js?x=1"),
      Some("main.js?x=1".to_string())
    );
  }

  #[test]
  fn test_request_path_foreign_origin() {
    assert_eq!(origin().request_path("https://cdn.test/main.js"), None);
  }
}
