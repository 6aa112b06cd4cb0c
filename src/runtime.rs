use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// How a runner image is produced when no prebuilt tag can be pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSource<'a> {
  /// Remote build context (git or HTTP(S) URL understood by the daemon).
  Context(&'a str),
  /// Inline Dockerfile content.
  Dockerfile(&'a str),
}

/// A host directory bound into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
  pub source: PathBuf,
  pub target: String,
}

/// One container execution with streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
  pub image: String,
  /// Shell command, run as `/bin/bash -c "<command>"`; `None` runs the
  /// image's default entrypoint.
  pub command: Option<String>,
  /// `None` keeps the image's default working directory.
  pub workdir: Option<String>,
  pub mounts: Vec<BindMount>,
}

impl RunRequest {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      command: None,
      workdir: None,
      mounts: Vec::new(),
    }
  }
}

/// Handle to a started container: a line-by-line log stream, then the exit
/// status once the container stops.
///
/// `exit` resolves to `None` when the status could not be determined;
/// callers treat that the same as a non-zero exit.
pub struct RunningContainer {
  pub logs: mpsc::Receiver<String>,
  pub exit: oneshot::Receiver<Option<i64>>,
}

/// The external container runtime capability.
///
/// Every method converts runtime faults into `bool`/`Option`/`None` at the
/// call site and logs the cause; nothing from the daemon escapes as an
/// error. Missing images, failed pulls and failed builds are ordinary
/// outcomes the orchestration layer branches on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
  /// Is the image present locally right now?
  async fn image_exists(&self, image: &str) -> bool;

  /// Pull an image (tag defaults to `latest`); false on any failure.
  async fn pull_image(&self, image: &str) -> bool;

  /// Delete a local image; a missing image is a no-op.
  async fn delete_image(&self, image: &str);

  /// Build `tag` from the given source; false on any failure.
  async fn build_image(
    &self,
    tag: &str,
    source: BuildSource<'_>,
    build_args: &BTreeMap<String, String>,
    nocache: bool,
  ) -> bool;

  /// Run `command` in a throwaway container and return its trimmed stdout,
  /// or `None` when the image is absent or the command fails.
  async fn run_probe(&self, image: &str, command: &str) -> Option<String>;

  /// Start a container and stream its log lines; `None` when the container
  /// could not be started.
  async fn run_streamed(&self, request: RunRequest) -> Option<RunningContainer>;
}
