//! Mock container runtime for tests.
//!
//! Captures every call and plays back scripted responses so entity probing
//! and runner orchestration can be exercised without a container daemon.

use crate::runtime::BuildSource;
use crate::runtime::ContainerRuntime;
use crate::runtime::RunRequest;
use crate::runtime::RunningContainer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// One captured runtime call, for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
  ImageExists(String),
  Pull(String),
  Delete(String),
  Build { tag: String, nocache: bool },
  Probe { image: String, command: String },
  Run {
    image: String,
    command: Option<String>,
    workdir: Option<String>,
    mounts: Vec<(PathBuf, String)>,
  },
}

/// Scripted outcome of the next streamed run.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
  pub lines: Vec<String>,
  pub exit_code: Option<i64>,
}

impl ScriptedRun {
  pub fn new(lines: &[&str], exit_code: Option<i64>) -> Self {
    Self {
      lines: lines.iter().map(|l| l.to_string()).collect(),
      exit_code,
    }
  }
}

#[derive(Default)]
struct MockState {
  /// Images "present locally".
  images: HashSet<String>,
  /// Images a pull would succeed for.
  pullable: HashSet<String>,
  build_succeeds: bool,
  /// Probe stdout keyed by command.
  probe_outputs: HashMap<String, String>,
  runs: Vec<ScriptedRun>,
  calls: Vec<RuntimeCall>,
}

/// Configurable [`ContainerRuntime`] stand-in.
#[derive(Clone)]
pub struct MockRuntime {
  state: Arc<Mutex<MockState>>,
}

impl Default for MockRuntime {
  fn default() -> Self {
    Self::new()
  }
}

impl MockRuntime {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(MockState {
        build_succeeds: true,
        ..Default::default()
      })),
    }
  }

  /// Marks an image as locally present.
  pub fn with_image(self, image: impl Into<String>) -> Self {
    self.state.lock().images.insert(image.into());
    self
  }

  /// Makes a pull of `image` succeed (and materialize it locally).
  pub fn with_pullable(self, image: impl Into<String>) -> Self {
    self.state.lock().pullable.insert(image.into());
    self
  }

  /// Sets the stdout a probe `command` produces.
  pub fn with_probe(self, command: impl Into<String>, stdout: impl Into<String>) -> Self {
    self.state.lock().probe_outputs.insert(command.into(), stdout.into());
    self
  }

  /// Queues a scripted streamed run; runs beyond the script fail to start.
  pub fn with_run(self, run: ScriptedRun) -> Self {
    self.state.lock().runs.push(run);
    self
  }

  /// Makes every build fail.
  pub fn failing_builds(self) -> Self {
    self.state.lock().build_succeeds = false;
    self
  }

  pub fn calls(&self) -> Vec<RuntimeCall> {
    self.state.lock().calls.clone()
  }

  /// Number of probe invocations of `command`.
  pub fn probe_count(&self, command: &str) -> usize {
    self
      .calls()
      .iter()
      .filter(|call| matches!(call, RuntimeCall::Probe { command: c, .. } if c == command))
      .count()
  }

  pub fn build_count(&self) -> usize {
    self
      .calls()
      .iter()
      .filter(|call| matches!(call, RuntimeCall::Build { .. }))
      .count()
  }

  pub fn has_image(&self, image: &str) -> bool {
    self.state.lock().images.contains(image)
  }

  fn record(&self, call: RuntimeCall) {
    self.state.lock().calls.push(call);
  }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
  async fn image_exists(&self, image: &str) -> bool {
    self.record(RuntimeCall::ImageExists(image.to_string()));
    self.state.lock().images.contains(image)
  }

  async fn pull_image(&self, image: &str) -> bool {
    self.record(RuntimeCall::Pull(image.to_string()));
    let mut state = self.state.lock();
    if state.pullable.contains(image) {
      state.images.insert(image.to_string());
      true
    } else {
      false
    }
  }

  async fn delete_image(&self, image: &str) {
    self.record(RuntimeCall::Delete(image.to_string()));
    self.state.lock().images.remove(image);
  }

  async fn build_image(
    &self,
    tag: &str,
    _source: BuildSource<'_>,
    _build_args: &BTreeMap<String, String>,
    nocache: bool,
  ) -> bool {
    self.record(RuntimeCall::Build {
      tag: tag.to_string(),
      nocache,
    });
    let mut state = self.state.lock();
    if state.build_succeeds {
      state.images.insert(tag.to_string());
      true
    } else {
      false
    }
  }

  async fn run_probe(&self, image: &str, command: &str) -> Option<String> {
    self.record(RuntimeCall::Probe {
      image: image.to_string(),
      command: command.to_string(),
    });
    let state = self.state.lock();
    if !state.images.contains(image) {
      return None;
    }
    state.probe_outputs.get(command).cloned()
  }

  async fn run_streamed(&self, request: RunRequest) -> Option<RunningContainer> {
    self.record(RuntimeCall::Run {
      image: request.image.clone(),
      command: request.command.clone(),
      workdir: request.workdir.clone(),
      mounts: request
        .mounts
        .iter()
        .map(|m| (m.source.clone(), m.target.clone()))
        .collect(),
    });

    let script = {
      let mut state = self.state.lock();
      if !state.images.contains(&request.image) || state.runs.is_empty() {
        None
      } else {
        Some(state.runs.remove(0))
      }
    }?;

    let (line_tx, line_rx) = mpsc::channel(script.lines.len().max(1));
    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::spawn(async move {
      for line in script.lines {
        if line_tx.send(line).await.is_err() {
          break;
        }
      }
      drop(line_tx);
      let _ = exit_tx.send(script.exit_code);
    });

    Some(RunningContainer {
      logs: line_rx,
      exit: exit_rx,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn pull_materializes_pullable_images() {
    let mock = MockRuntime::new().with_pullable("repo:tag");
    assert!(!mock.image_exists("repo:tag").await);
    assert!(mock.pull_image("repo:tag").await);
    assert!(mock.image_exists("repo:tag").await);
    assert!(!mock.pull_image("other").await);
  }

  #[tokio::test]
  async fn probe_answers_only_for_present_images() {
    let mock = MockRuntime::new()
      .with_image("img")
      .with_probe("echo c", "c\n");
    assert_eq!(mock.run_probe("img", "echo c").await.as_deref(), Some("c\n"));
    assert_eq!(mock.run_probe("missing", "echo c").await, None);
    assert_eq!(mock.probe_count("echo c"), 2);
  }

  #[tokio::test]
  async fn scripted_run_streams_lines_then_exit() {
    let mock = MockRuntime::new()
      .with_image("img")
      .with_run(ScriptedRun::new(&["one", "two"], Some(0)));

    let mut running = mock
      .run_streamed(RunRequest::new("img"))
      .await
      .expect("scripted run starts");

    let mut lines = Vec::new();
    while let Some(line) = running.logs.recv().await {
      lines.push(line);
    }
    assert_eq!(lines, vec!["one", "two"]);
    assert_eq!(running.exit.await.unwrap(), Some(0));
  }

  #[tokio::test]
  async fn unscripted_run_fails_to_start() {
    let mock = MockRuntime::new().with_image("img");
    assert!(mock.run_streamed(RunRequest::new("img")).await.is_none());
  }
}
