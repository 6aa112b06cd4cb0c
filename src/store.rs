use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;

/// A record persisted by the [`Store`], one JSON file per name.
pub trait Entity: Serialize + DeserializeOwned {
  /// Directory name under the store root (e.g. `"benchmarks"`).
  const KIND: &'static str;

  /// Primary key; doubles as the file stem.
  fn name(&self) -> &str;
}

/// On-disk entity store rooted at the config directory.
///
/// Records live at `{root}/{kind}/{name}.json`. Files are read and written
/// without locking; concurrent external writers are out of scope.
#[derive(Debug, Clone)]
pub struct Store {
  root: PathBuf,
}

impl Store {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn kind_dir<T: Entity>(&self) -> PathBuf {
    self.root.join(T::KIND)
  }

  fn record_path<T: Entity>(&self, name: &str) -> PathBuf {
    self.kind_dir::<T>().join(format!("{name}.json"))
  }

  /// Persists `entity`, creating the kind directory if needed.
  ///
  /// Refuses to touch an existing record unless `overwrite` is set;
  /// returns whether the record was written.
  pub fn register<T: Entity>(&self, entity: &T, overwrite: bool) -> Result<bool, StoreError> {
    let dir = self.kind_dir::<T>();
    fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
      path: dir.clone(),
      source,
    })?;

    let path = self.record_path::<T>(entity.name());
    if path.exists() {
      tracing::warn!("{} '{}' already exists", T::KIND, entity.name());
      if !overwrite {
        return Ok(false);
      }
      tracing::warn!("Overwriting {} '{}'", T::KIND, entity.name());
    }

    let content =
      serde_json::to_string_pretty(entity).map_err(|source| StoreError::SerializeRecord {
        name: entity.name().to_string(),
        source,
      })?;
    fs::write(&path, content).map_err(|source| StoreError::WriteRecord { path, source })?;
    Ok(true)
  }

  /// Loads a record by name. Absent or undecodable records yield `None`,
  /// never an error; "missing" is a first-class outcome here.
  pub fn load<T: Entity>(&self, name: &str) -> Option<T> {
    let path = self.record_path::<T>(name);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(_) => {
        tracing::warn!("{} '{}' does not exist", T::KIND, name);
        return None;
      }
    };
    match serde_json::from_str(&content) {
      Ok(entity) => Some(entity),
      Err(e) => {
        tracing::warn!("Skipping undecodable {} record '{}': {}", T::KIND, name, e);
        None
      }
    }
  }

  /// Removes a record file; returns whether it existed.
  pub fn unregister<T: Entity>(&self, name: &str) -> bool {
    let path = self.record_path::<T>(name);
    if !path.exists() {
      tracing::warn!("{} '{}' does not exist", T::KIND, name);
      return false;
    }
    if let Err(e) = fs::remove_file(&path) {
      tracing::warn!("Failed to remove {} '{}': {}", T::KIND, name, e);
      return false;
    }
    true
  }

  /// Loads every record of a kind, in name order, skipping files that fail
  /// to decode.
  pub fn all<T: Entity>(&self) -> Vec<T> {
    let dir = self.kind_dir::<T>();
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
      .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
      .collect();
    names.sort();

    names.iter().filter_map(|name| self.load(name)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use tempfile::tempdir;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Widget {
    name: String,
    size: u32,
  }

  impl Entity for Widget {
    const KIND: &'static str = "widgets";

    fn name(&self) -> &str {
      &self.name
    }
  }

  fn widget(name: &str, size: u32) -> Widget {
    Widget {
      name: name.to_string(),
      size,
    }
  }

  #[test]
  fn register_then_load_round_trips() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path());

    let original = widget("a", 3);
    assert!(store.register(&original, false).unwrap());
    assert_eq!(store.load::<Widget>("a"), Some(original));
  }

  #[test]
  fn register_without_overwrite_is_a_noop() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path());

    store.register(&widget("a", 1), false).unwrap();
    assert!(!store.register(&widget("a", 2), false).unwrap());
    assert_eq!(store.load::<Widget>("a"), Some(widget("a", 1)));

    assert!(store.register(&widget("a", 2), true).unwrap());
    assert_eq!(store.load::<Widget>("a"), Some(widget("a", 2)));
  }

  #[test]
  fn load_missing_returns_none() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path());
    assert_eq!(store.load::<Widget>("nope"), None);
  }

  #[test]
  fn all_skips_undecodable_records() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path());

    store.register(&widget("a", 1), false).unwrap();
    store.register(&widget("b", 2), false).unwrap();
    fs::write(temp.path().join("widgets/broken.json"), "not json").unwrap();

    let all = store.all::<Widget>();
    assert_eq!(all, vec![widget("a", 1), widget("b", 2)]);
  }

  #[test]
  fn unregister_removes_the_record() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path());

    store.register(&widget("a", 1), false).unwrap();
    assert!(store.unregister::<Widget>("a"));
    assert!(!store.unregister::<Widget>("a"));
    assert_eq!(store.load::<Widget>("a"), None);
  }
}
