use crate::benchmark::Benchmark;
use crate::runtime::BuildSource;
use crate::store::Entity;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

fn generate_name() -> String {
  let id = Uuid::new_v4().simple().to_string();
  format!("kaprese-{}", &id[..7])
}

fn default_success_codes() -> Vec<i64> {
  vec![0]
}

// Older records store a single `exec_command` string
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum OneOrMany {
    One(String),
    Many(Vec<String>),
  }
  Ok(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::One(command) => vec![command],
    OneOrMany::Many(commands) => commands,
  })
}

/// One analysis/repair tool: its supported targets, how its image is built
/// on top of a benchmark, and the commands it runs in there.
///
/// Engines are registered once and loaded by name for each run; they are
/// never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EngineRecord")]
pub struct Engine {
  pub name: String,
  pub supported_languages: Vec<String>,
  pub supported_os: Vec<String>,
  /// Base image tag; the per-benchmark runner tag is
  /// `{image}:{benchmark.name}`.
  pub image: String,
  /// Remote build context (git or HTTP(S) URL).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  /// Inline Dockerfile, used when no `location` is given.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dockerfile: Option<String>,
  /// Build-arg templates, interpolated per benchmark before the build.
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub build_args: BTreeMap<String, String>,
  /// Shell command templates, joined into one compound invocation.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub exec_commands: Vec<String>,
  /// Container exit codes this engine counts as success. Tool-specific:
  /// cafe reports a found repair with exit 106.
  pub success_exit_codes: Vec<i64>,
}

/// Wire form of an engine record; [`From`] re-derives the defaults a
/// stored record may omit.
#[derive(Deserialize)]
struct EngineRecord {
  #[serde(default = "generate_name")]
  name: String,
  #[serde(default)]
  supported_languages: Vec<String>,
  #[serde(default)]
  supported_os: Vec<String>,
  #[serde(default)]
  image: String,
  #[serde(default)]
  location: Option<String>,
  #[serde(default)]
  dockerfile: Option<String>,
  #[serde(default)]
  build_args: BTreeMap<String, String>,
  #[serde(default, alias = "exec_command", deserialize_with = "one_or_many")]
  exec_commands: Vec<String>,
  #[serde(default = "default_success_codes")]
  success_exit_codes: Vec<i64>,
}

impl From<EngineRecord> for Engine {
  fn from(record: EngineRecord) -> Self {
    // A record without an image gets the derived tag, same as construction
    let image = if record.image.is_empty() {
      format!("kaprese-engine-{}", record.name)
    } else {
      record.image
    };
    Self {
      name: record.name,
      supported_languages: record.supported_languages,
      supported_os: record.supported_os,
      image,
      location: record.location,
      dockerfile: record.dockerfile,
      build_args: record.build_args,
      exec_commands: record.exec_commands,
      success_exit_codes: record.success_exit_codes,
    }
  }
}

impl Default for Engine {
  fn default() -> Self {
    Self::new(generate_name())
  }
}

impl Engine {
  pub fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    let image = format!("kaprese-engine-{name}");
    Self {
      name,
      supported_languages: Vec::new(),
      supported_os: Vec::new(),
      image,
      location: None,
      dockerfile: None,
      build_args: BTreeMap::new(),
      exec_commands: Vec::new(),
      success_exit_codes: default_success_codes(),
    }
  }

  /// Can this engine handle the benchmark? Gates on language only; an OS
  /// mismatch is advisory (see [`Engine::os_supported`]).
  pub fn support(&self, benchmark: &Benchmark) -> bool {
    benchmark
      .language()
      .is_some_and(|language| self.supported_languages.iter().any(|l| l == language))
  }

  /// `None` when either side is unknown/undeclared; otherwise whether the
  /// benchmark's OS is among the declared ones.
  pub fn os_supported(&self, benchmark: &Benchmark) -> Option<bool> {
    if self.supported_os.is_empty() {
      return None;
    }
    let os = benchmark.os()?;
    Some(self.supported_os.iter().any(|o| o == os))
  }

  /// The build fallback when no prebuilt runner tag is pullable; `None`
  /// means this engine cannot be built at all.
  pub fn build_source(&self) -> Option<BuildSource<'_>> {
    if let Some(location) = self.location.as_deref() {
      return Some(BuildSource::Context(location));
    }
    self.dockerfile.as_deref().map(BuildSource::Dockerfile)
  }

  /// Applies this engine's success-code convention to a container exit
  /// status; an unknown status is never a success.
  pub fn run_succeeded(&self, exit_code: Option<i64>) -> bool {
    exit_code.is_some_and(|code| self.success_exit_codes.contains(&code))
  }
}

impl Entity for Engine {
  const KIND: &'static str = "engines";

  fn name(&self) -> &str {
    &self.name
  }
}
