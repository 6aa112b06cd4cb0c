// Copyright 2025 The kaprese authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error enum for the kaprese library.
#[derive(Error, Debug)]
pub enum KapreseError {
  #[error("Configuration error")]
  Config(#[from] ConfigError),

  #[error("Entity store error")]
  Store(#[from] StoreError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON serialization/deserialization error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Errors related to configuration resolution (src/config.rs).
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to resolve configuration")]
  Extract(#[from] Box<figment::Error>),

  #[error("Failed to read config file: {path}")]
  ReadConfig {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to write config file: {path}")]
  WriteConfig {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to parse config file: {path}")]
  ParseConfig {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid configuration key: {key}")]
  InvalidKey { key: String },
}

/// Errors related to the on-disk entity store (src/store.rs), wrapped into
/// [`KapreseError`] at the binary boundary.
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Failed to create store directory: {path}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to write record: {path}")]
  WriteRecord {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to serialize record '{name}'")]
  SerializeRecord {
    name: String,
    #[source]
    source: serde_json::Error,
  },
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::error::Error;

  #[test]
  fn umbrella_wraps_and_keeps_the_source() {
    let wrapped = KapreseError::from(ConfigError::InvalidKey {
      key: "nope".to_string(),
    });
    assert!(matches!(wrapped, KapreseError::Config(_)));
    assert_eq!(
      wrapped.source().unwrap().to_string(),
      "Invalid configuration key: nope"
    );
  }
}
