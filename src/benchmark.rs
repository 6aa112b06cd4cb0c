use crate::runtime::ContainerRuntime;
use crate::store::Entity;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// Fixed probe used to derive a benchmark's OS identifier.
const OS_PROBE_COMMAND: &str = "cat /etc/os-release";

/// A lazily probed benchmark attribute.
///
/// Probing is an explicit, side-effecting step (`Benchmark::probe_*`); the
/// accessors are pure. `Failed` means a probe ran and produced nothing
/// usable, which downstream consumers treat as "unknown" without retrying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Probe {
  #[default]
  Unknown,
  Known(String),
  Failed,
}

impl Probe {
  pub fn value(&self) -> Option<&str> {
    match self {
      Probe::Known(value) => Some(value),
      _ => None,
    }
  }

  pub fn is_unknown(&self) -> bool {
    matches!(self, Probe::Unknown)
  }

  fn is_not_known(&self) -> bool {
    self.value().is_none()
  }

  fn from_output(output: Option<String>) -> Self {
    match output {
      Some(out) => {
        let out = out.trim();
        if out.is_empty() {
          Probe::Failed
        } else {
          Probe::Known(out.to_string())
        }
      }
      None => Probe::Failed,
    }
  }
}

// Persisted as a plain string cache slot; `Unknown`/`Failed` are never
// written (the fields are skipped), so decoding only ever sees `Known`.
impl Serialize for Probe {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self.value() {
      Some(value) => serializer.serialize_str(value),
      None => serializer.serialize_none(),
    }
  }
}

impl<'de> Deserialize<'de> for Probe {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    String::deserialize(deserializer).map(Probe::Known)
  }
}

/// One buggy-program container image plus the probes that describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
  pub name: String,
  pub image: String,

  /// Shell command whose stdout is the benchmark's language; `None` means
  /// the language can never be derived.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub language_command: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workdir_command: Option<String>,

  // Cache slots, persisted only once known
  #[serde(rename = "_language", default, skip_serializing_if = "Probe::is_not_known")]
  language: Probe,
  #[serde(rename = "_workdir", default, skip_serializing_if = "Probe::is_not_known")]
  workdir: Probe,
  #[serde(rename = "_os", default, skip_serializing_if = "Probe::is_not_known")]
  os: Probe,
}

impl Benchmark {
  pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      image: image.into(),
      language_command: None,
      workdir_command: None,
      language: Probe::Unknown,
      workdir: Probe::Unknown,
      os: Probe::Unknown,
    }
  }

  pub fn language_command(mut self, command: impl Into<String>) -> Self {
    self.language_command = Some(command.into());
    self
  }

  pub fn workdir_command(mut self, command: impl Into<String>) -> Self {
    self.workdir_command = Some(command.into());
    self
  }

  pub fn language(&self) -> Option<&str> {
    self.language.value()
  }

  pub fn workdir(&self) -> Option<&str> {
    self.workdir.value()
  }

  pub fn os(&self) -> Option<&str> {
    self.os.value()
  }

  /// Whether the image is present locally. Queried fresh on every call:
  /// external tooling can pull or delete images between accesses.
  pub async fn availability(&self, runtime: &dyn ContainerRuntime) -> bool {
    runtime.image_exists(&self.image).await
  }

  /// Available and language known.
  pub async fn ready(&self, runtime: &dyn ContainerRuntime) -> bool {
    self.availability(runtime).await && self.language.value().is_some()
  }

  /// Derives and caches the language by running `language_command` inside
  /// the image. A no-op unless the attribute is still unprobed, the image
  /// is available and a probe command is configured.
  pub async fn probe_language(&mut self, runtime: &dyn ContainerRuntime) {
    if !self.language.is_unknown() {
      return;
    }
    let Some(command) = self.language_command.clone() else {
      return;
    };
    if !self.availability(runtime).await {
      return;
    }
    self.language = Probe::from_output(runtime.run_probe(&self.image, &command).await);
  }

  pub async fn probe_workdir(&mut self, runtime: &dyn ContainerRuntime) {
    if !self.workdir.is_unknown() {
      return;
    }
    let Some(command) = self.workdir_command.clone() else {
      return;
    };
    if !self.availability(runtime).await {
      return;
    }
    self.workdir = Probe::from_output(runtime.run_probe(&self.image, &command).await);
  }

  /// Derives the OS identifier (`id:version`) from the image's os-release
  /// file; unlike the other probes this one needs no per-benchmark command.
  pub async fn probe_os(&mut self, runtime: &dyn ContainerRuntime) {
    if !self.os.is_unknown() {
      return;
    }
    if !self.availability(runtime).await {
      return;
    }
    self.os = match runtime.run_probe(&self.image, OS_PROBE_COMMAND).await {
      Some(output) => match parse_os_release(&output) {
        Some(os) => Probe::Known(os),
        None => Probe::Failed,
      },
      None => Probe::Failed,
    };
  }

  /// Pulls the image if absent (or forced) and primes all probe caches so
  /// later accessor calls are free.
  pub async fn prepare(&mut self, runtime: &dyn ContainerRuntime, force: bool) -> bool {
    if force || !self.availability(runtime).await {
      tracing::info!("Pulling benchmark \"{}\"", self.name);
      if !runtime.pull_image(&self.image).await {
        tracing::warn!("Failed to pull benchmark image \"{}\"", self.image);
      }
    }
    self.probe_language(runtime).await;
    self.probe_workdir(runtime).await;
    self.probe_os(runtime).await;
    self.ready(runtime).await
  }

  /// Clears all probe caches, optionally deleting the image. Idempotent.
  pub async fn cleanup(&mut self, runtime: &dyn ContainerRuntime, delete_image: bool) {
    tracing::info!("Cleaning up benchmark \"{}\"", self.name);
    self.language = Probe::Unknown;
    self.workdir = Probe::Unknown;
    self.os = Probe::Unknown;
    if delete_image {
      runtime.delete_image(&self.image).await;
    }
  }
}

impl Entity for Benchmark {
  const KIND: &'static str = "benchmarks";

  fn name(&self) -> &str {
    &self.name
  }
}

/// Parses os-release `ID`/`VERSION_ID` lines into `"id:version"`.
fn parse_os_release(content: &str) -> Option<String> {
  let mut id = None;
  let mut version = None;
  for line in content.lines() {
    if let Some((key, value)) = line.split_once('=') {
      let value = value.trim().trim_matches('"');
      match key.trim() {
        "ID" => id = Some(value),
        "VERSION_ID" => version = Some(value),
        _ => {}
      }
    }
  }
  Some(format!("{}:{}", id?, version?))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mock::MockRuntime;

  fn flex() -> Benchmark {
    Benchmark::new("flex-1", "repo:flex-1")
      .language_command("echo c")
      .workdir_command("pwd")
  }

  #[test]
  fn parse_os_release_variants() {
    assert_eq!(
      parse_os_release("NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"20.04\"\n"),
      Some("ubuntu:20.04".to_string())
    );
    assert_eq!(
      parse_os_release("ID=debian\nVERSION_ID=\"12\""),
      Some("debian:12".to_string())
    );
    // rolling-release files without VERSION_ID stay unknown
    assert_eq!(parse_os_release("ID=arch"), None);
    assert_eq!(parse_os_release(""), None);
  }

  #[tokio::test]
  async fn attributes_stay_unknown_while_unavailable() {
    let mock = MockRuntime::new();
    let mut benchmark = flex();

    benchmark.probe_language(&mock).await;
    assert_eq!(benchmark.language(), None);
    assert_eq!(mock.probe_count("echo c"), 0);
    assert!(!benchmark.ready(&mock).await);
  }

  #[tokio::test]
  async fn successful_probe_is_cached() {
    let mock = MockRuntime::new()
      .with_image("repo:flex-1")
      .with_probe("echo c", "c\n");
    let mut benchmark = flex();

    benchmark.probe_language(&mock).await;
    benchmark.probe_language(&mock).await;

    assert_eq!(benchmark.language(), Some("c"));
    assert_eq!(mock.probe_count("echo c"), 1);
    assert!(benchmark.ready(&mock).await);
  }

  #[tokio::test]
  async fn failed_probe_is_not_retried() {
    // Image present but the probe produces nothing
    let mock = MockRuntime::new().with_image("repo:flex-1");
    let mut benchmark = flex();

    benchmark.probe_language(&mock).await;
    benchmark.probe_language(&mock).await;

    assert_eq!(benchmark.language(), None);
    assert_eq!(mock.probe_count("echo c"), 1);
  }

  #[tokio::test]
  async fn os_probe_parses_release_file() {
    let mock = MockRuntime::new()
      .with_image("repo:flex-1")
      .with_probe(OS_PROBE_COMMAND, "ID=ubuntu\nVERSION_ID=\"20.04\"\n");
    let mut benchmark = flex();

    benchmark.probe_os(&mock).await;
    assert_eq!(benchmark.os(), Some("ubuntu:20.04"));
  }

  #[tokio::test]
  async fn prepare_pulls_and_primes_all_caches() {
    let mock = MockRuntime::new()
      .with_pullable("repo:flex-1")
      .with_probe("echo c", "c")
      .with_probe("pwd", "/workdir\n")
      .with_probe(OS_PROBE_COMMAND, "ID=ubuntu\nVERSION_ID=\"20.04\"");
    let mut benchmark = flex();

    assert!(benchmark.prepare(&mock, false).await);
    assert_eq!(benchmark.language(), Some("c"));
    assert_eq!(benchmark.workdir(), Some("/workdir"));
    assert_eq!(benchmark.os(), Some("ubuntu:20.04"));
  }

  #[tokio::test]
  async fn cleanup_resets_caches_and_can_delete_the_image() {
    let mock = MockRuntime::new()
      .with_pullable("repo:flex-1")
      .with_probe("echo c", "c")
      .with_probe("pwd", "/workdir")
      .with_probe(OS_PROBE_COMMAND, "ID=ubuntu\nVERSION_ID=\"20.04\"");
    let mut benchmark = flex();
    benchmark.prepare(&mock, false).await;

    benchmark.cleanup(&mock, true).await;

    assert_eq!(benchmark.language(), None);
    assert_eq!(benchmark.workdir(), None);
    assert_eq!(benchmark.os(), None);
    assert!(!benchmark.availability(&mock).await);

    // Second cleanup is a no-op
    benchmark.cleanup(&mock, true).await;
    assert_eq!(benchmark.language(), None);
  }

  #[test]
  fn persisted_format_matches_the_record_layout() {
    let mut benchmark = flex();
    benchmark.language = Probe::Known("c".to_string());
    benchmark.workdir = Probe::Failed;

    let json: serde_json::Value = serde_json::to_value(&benchmark).unwrap();
    assert_eq!(json["name"], "flex-1");
    assert_eq!(json["image"], "repo:flex-1");
    assert_eq!(json["language_command"], "echo c");
    assert_eq!(json["_language"], "c");
    // Failed and Unknown slots are omitted
    assert!(json.get("_workdir").is_none());
    assert!(json.get("_os").is_none());

    let decoded: Benchmark = serde_json::from_value(json).unwrap();
    assert_eq!(decoded.language(), Some("c"));
    assert_eq!(decoded.workdir(), None);
  }

  #[test]
  fn minimal_record_decodes() {
    let decoded: Benchmark =
      serde_json::from_str(r#"{"name": "flex-1", "image": "repo:flex-1"}"#).unwrap();
    assert_eq!(decoded.name, "flex-1");
    assert_eq!(decoded.language(), None);
    assert!(decoded.language_command.is_none());
  }
}
