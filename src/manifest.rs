//! Deployed resource manifest and application shell.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Mapping of logical resource path to content fingerprint for one deployed version.
///
/// Serialized as a flat JSON object: `{"main.js": "f89db282...", "/": "bb7f3909..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
  resources: BTreeMap<String, String>,
}

impl ResourceManifest {
  pub fn new(resources: BTreeMap<String, String>) -> Self {
    Self { resources }
  }

  /// Load the manifest JSON produced by the build.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read manifest {}: {}", path.display(), e))?;
    Self::from_json(&contents)
      .map_err(|e| eyre!("Failed to parse manifest {}: {}", path.display(), e))
  }

  pub fn from_json(json: &str) -> Result<Self> {
    serde_json::from_str(json).map_err(|e| eyre!("Invalid manifest JSON: {}", e))
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string(self).map_err(|e| eyre!("Failed to serialize manifest: {}", e))
  }

  /// Fingerprint for `path`. An empty fingerprint is still `Some("")`.
  pub fn fingerprint(&self, path: &str) -> Option<&str> {
    self.resources.get(path).map(String::as_str)
  }

  pub fn contains(&self, path: &str) -> bool {
    self.resources.contains_key(path)
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.resources.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.resources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  /// Whether a cached copy of `path` made under `previous` may be reused under `self`.
  ///
  /// True only when both versions list the path with the same fingerprint.
  pub fn retains(&self, previous: &ResourceManifest, path: &str) -> bool {
    match (self.fingerprint(path), previous.fingerprint(path)) {
      (Some(current), Some(old)) => current == old,
      _ => false,
    }
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceManifest {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self::new(
      iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }
}

/// Ordered list of paths that must be cached before the application can render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreShellSet {
  paths: Vec<String>,
}

impl CoreShellSet {
  pub fn new(paths: Vec<String>) -> Self {
    Self { paths }
  }

  pub fn paths(&self) -> &[String] {
    &self.paths
  }

  /// Fail when the shell names a path the manifest does not know.
  pub fn validate(&self, manifest: &ResourceManifest) -> Result<()> {
    let unknown: Vec<&str> = self
      .paths
      .iter()
      .map(String::as_str)
      .filter(|p| !manifest.contains(p))
      .collect();

    if unknown.is_empty() {
      Ok(())
    } else {
      Err(eyre!(
        "Shell paths missing from the manifest: {}",
        unknown.join(", ")
      ))
    }
  }
}

impl<S: Into<String>> FromIterator<S> for CoreShellSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self::new(iter.into_iter().map(Into::into).collect())
  }
}
