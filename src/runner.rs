use crate::benchmark::Benchmark;
use crate::config::Config;
use crate::engine::Engine;
use crate::runtime::BindMount;
use crate::runtime::ContainerRuntime;
use crate::runtime::RunRequest;
use crate::template::Substitutions;
use crate::template::render;
use chrono::DateTime;
use chrono::Utc;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Per-run log file written into the output directory.
const LOG_FILE_NAME: &str = "kaprese.log";

/// Progress of one engine-on-benchmark run.
///
/// `Pending → Checking → {NotSupported | Preparing → {FailedPreparing |
/// Running → {Ok | FailedRunning}}}`; the terminal state ends up in the
/// [`RunReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  Pending,
  Checking,
  NotSupported,
  Preparing,
  FailedPreparing,
  Running,
  FailedRunning,
  Ok,
}

impl RunStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      RunStatus::NotSupported
        | RunStatus::FailedPreparing
        | RunStatus::FailedRunning
        | RunStatus::Ok
    )
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let word = match self {
      RunStatus::Pending => "pending",
      RunStatus::Checking => "checking",
      RunStatus::NotSupported => "not supported",
      RunStatus::Preparing => "preparing",
      RunStatus::FailedPreparing => "failed to prepare",
      RunStatus::Running => "running",
      RunStatus::FailedRunning => "failed to run",
      RunStatus::Ok => "ok",
    };
    f.write_str(word)
  }
}

/// Outcome of one `(engine, benchmark)` pair, consumed by the presentation
/// layer.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub engine: String,
  pub benchmark: String,
  pub status: RunStatus,
  pub elapsed: Option<chrono::Duration>,
  pub output_dir: PathBuf,
}

/// Orchestrates one engine over one benchmark: readiness, pull-or-build of
/// the runner image, mounted execution with streamed logs, and exit-code
/// interpretation. Not persisted; one value per invocation.
pub struct Runner<'a> {
  benchmark: &'a mut Benchmark,
  engine: &'a Engine,
  status: RunStatus,
  output_dir: PathBuf,
  mount_subpath: String,
  started_at: Option<DateTime<Utc>>,
  finished_at: Option<DateTime<Utc>>,
}

impl<'a> Runner<'a> {
  pub fn new(benchmark: &'a mut Benchmark, engine: &'a Engine, config: &Config) -> Self {
    let output_dir = config.output_path.join(&engine.name).join(&benchmark.name);
    // Bind-mount sources must be absolute
    let output_dir = std::path::absolute(&output_dir).unwrap_or(output_dir);
    Self {
      benchmark,
      engine,
      status: RunStatus::Pending,
      output_dir,
      mount_subpath: config.mount_subpath.clone(),
      started_at: None,
      finished_at: None,
    }
  }

  /// The addressable identity of "this engine prepared for this benchmark".
  pub fn image_tag(&self) -> String {
    format!("{}:{}", self.engine.image, self.benchmark.name)
  }

  /// In-container directory the output mount is bound to, rooted at the
  /// benchmark's workdir (or `/` while that is unknown).
  pub fn mount_dir(&self) -> String {
    let base = self.benchmark.workdir().unwrap_or("/");
    format!("{}/{}", base.trim_end_matches('/'), self.mount_subpath)
  }

  pub fn status(&self) -> RunStatus {
    self.status
  }

  pub fn elapsed(&self) -> Option<chrono::Duration> {
    Some(self.finished_at? - self.started_at?)
  }

  /// Substitution map for build-arg and exec-command templates, rebuilt per
  /// call so values probed during preparation are visible to later renders.
  fn substitutions(&self) -> Substitutions {
    let (uid, gid) = current_uid_gid();
    let mut subs = Substitutions::new();
    subs.insert("benchmark.name", self.benchmark.name.clone());
    subs.insert("benchmark.image", self.benchmark.image.clone());
    if let Some(language) = self.benchmark.language() {
      subs.insert("benchmark.language", language.to_string());
    }
    if let Some(workdir) = self.benchmark.workdir() {
      subs.insert("benchmark.workdir", workdir.to_string());
    }
    if let Some(os) = self.benchmark.os() {
      subs.insert("benchmark.os", os.to_string());
    }
    subs.insert("engine.name", self.engine.name.clone());
    subs.insert("engine.image", self.engine.image.clone());
    subs.insert("runner.mount_dir", self.mount_dir());
    subs.insert("runner.output_dir", self.output_dir.display().to_string());
    subs.insert("runner.uid", uid.to_string());
    subs.insert("runner.gid", gid.to_string());
    subs
  }

  async fn ensure_benchmark_ready(&mut self, runtime: &dyn ContainerRuntime) -> bool {
    if !self.benchmark.ready(runtime).await {
      tracing::info!("Trying to prepare benchmark \"{}\"", self.benchmark.name);
      self.benchmark.prepare(runtime, false).await;
    }
    if !self.benchmark.ready(runtime).await {
      tracing::error!("Failed to prepare benchmark \"{}\"", self.benchmark.name);
      return false;
    }
    true
  }

  /// Makes the runner image tag available: reuse, else pull, else build
  /// from the engine's source. Failures come back as `false`, never as an
  /// error.
  pub async fn prepare(&mut self, runtime: &dyn ContainerRuntime, force: bool) -> bool {
    let tag = self.image_tag();
    if !force && runtime.image_exists(&tag).await {
      return true;
    }

    tracing::info!("Trying to pull or build runner image \"{}\"", tag);
    if runtime.pull_image(&tag).await {
      tracing::info!("Pulled runner image \"{}\"", tag);
      return true;
    }
    tracing::info!("No prebuilt runner image \"{}\"", tag);

    let Some(source) = self.engine.build_source() else {
      tracing::error!(
        "Failed to pull runner image \"{}\": engine \"{}\" has no build source",
        tag,
        self.engine.name
      );
      return false;
    };

    let subs = self.substitutions();
    let build_args = self
      .engine
      .build_args
      .iter()
      .map(|(key, value)| (key.clone(), render(value, &subs)))
      .collect();

    if runtime.build_image(&tag, source, &build_args, force).await {
      tracing::info!("Built runner image \"{}\"", tag);
      true
    } else {
      tracing::warn!(
        "Failed to build runner image \"{}\": maybe wrong location? (current={:?})",
        tag,
        self.engine.location
      );
      false
    }
  }

  /// Executes the engine's compound command in the prepared runner image,
  /// streaming log lines and mapping the exit status through the engine's
  /// success codes.
  pub async fn run(&mut self, runtime: &dyn ContainerRuntime, delete_runner: bool) -> bool {
    let ok = self.run_inner(runtime).await;
    if delete_runner {
      let tag = self.image_tag();
      tracing::info!("Deleting runner image \"{}\"", tag);
      runtime.delete_image(&tag).await;
    }
    ok
  }

  async fn run_inner(&mut self, runtime: &dyn ContainerRuntime) -> bool {
    if !self.ensure_benchmark_ready(runtime).await {
      return false;
    }

    // Interpolate per invocation: the workdir may only have become known
    // during preparation
    let subs = self.substitutions();
    let command = if self.engine.exec_commands.is_empty() {
      None
    } else {
      let rendered: Vec<String> = self
        .engine
        .exec_commands
        .iter()
        .map(|template| render(template, &subs))
        .collect();
      Some(rendered.join("; "))
    };

    if self.output_dir.exists() {
      tracing::warn!(
        "Output directory \"{}\" already exists; previous results may be overwritten",
        self.output_dir.display()
      );
    } else if let Err(e) = fs::create_dir_all(&self.output_dir) {
      tracing::error!(
        "Failed to create output directory \"{}\": {}",
        self.output_dir.display(),
        e
      );
      return false;
    }

    let request = RunRequest {
      image: self.image_tag(),
      command,
      workdir: self.benchmark.workdir().map(str::to_string),
      mounts: vec![BindMount {
        source: self.output_dir.clone(),
        target: self.mount_dir(),
      }],
    };

    let Some(mut running) = runtime.run_streamed(request).await else {
      tracing::error!(
        "Failed to run engine \"{}\" on benchmark \"{}\"",
        self.engine.name,
        self.benchmark.name
      );
      return false;
    };

    let mut log_file = match tokio::fs::File::create(self.output_dir.join(LOG_FILE_NAME)).await {
      Ok(file) => Some(file),
      Err(e) => {
        tracing::warn!("Failed to create {}: {}", LOG_FILE_NAME, e);
        None
      }
    };

    while let Some(line) = running.logs.recv().await {
      tracing::debug!(
        engine = %self.engine.name,
        benchmark = %self.benchmark.name,
        "{}",
        line
      );
      if let Some(file) = log_file.as_mut() {
        if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
          tracing::warn!("Failed to write {}: {}", LOG_FILE_NAME, e);
          log_file = None;
        }
      }
    }
    if let Some(file) = log_file.as_mut() {
      let _ = file.flush().await;
    }

    let exit_code = running.exit.await.ok().flatten();
    let ok = self.engine.run_succeeded(exit_code);
    if ok {
      tracing::info!(
        "Engine \"{}\" finished benchmark \"{}\" (exit={:?})",
        self.engine.name,
        self.benchmark.name,
        exit_code
      );
    } else {
      tracing::warn!(
        "Engine \"{}\" failed on benchmark \"{}\" (exit={:?})",
        self.engine.name,
        self.benchmark.name,
        exit_code
      );
    }
    ok
  }

  /// Drives the whole state machine for this pair and reports the terminal
  /// outcome. Infallible by design: every failure is a status, not an
  /// error.
  pub async fn execute(mut self, runtime: &dyn ContainerRuntime, delete_runner: bool) -> RunReport {
    self.started_at = Some(Utc::now());

    self.status = RunStatus::Checking;
    let supported = self.ensure_benchmark_ready(runtime).await && {
      if let Some(false) = self.engine.os_supported(self.benchmark) {
        // Advisory only, engines declare supported_os without gating on it
        tracing::warn!(
          "Benchmark \"{}\" OS {:?} is not declared by engine \"{}\"",
          self.benchmark.name,
          self.benchmark.os(),
          self.engine.name
        );
      }
      self.engine.support(self.benchmark)
    };

    if !supported {
      self.status = RunStatus::NotSupported;
    } else {
      self.status = RunStatus::Preparing;
      if !self.prepare(runtime, false).await {
        self.status = RunStatus::FailedPreparing;
      } else {
        self.status = RunStatus::Running;
        self.status = if self.run(runtime, delete_runner).await {
          RunStatus::Ok
        } else {
          RunStatus::FailedRunning
        };
      }
    }

    self.finished_at = Some(Utc::now());
    RunReport {
      engine: self.engine.name.clone(),
      benchmark: self.benchmark.name.clone(),
      status: self.status,
      elapsed: self.elapsed(),
      output_dir: self.output_dir.clone(),
    }
  }
}

/// Runs the full engine × benchmark cross-product sequentially, outer loop
/// over engines, and reports outcomes in that order.
pub async fn run_all(
  runtime: &dyn ContainerRuntime,
  config: &Config,
  engines: &[Engine],
  benchmarks: &mut [Benchmark],
  delete_runner: bool,
) -> Vec<RunReport> {
  let mut reports = Vec::with_capacity(engines.len() * benchmarks.len());
  for engine in engines {
    for benchmark in benchmarks.iter_mut() {
      tracing::info!(
        "Running benchmark \"{}\" with engine \"{}\"",
        benchmark.name,
        engine.name
      );
      let runner = Runner::new(benchmark, engine, config);
      let report = runner.execute(runtime, delete_runner).await;
      tracing::info!(
        "Engine \"{}\" on benchmark \"{}\": {}",
        report.engine,
        report.benchmark,
        report.status
      );
      reports.push(report);
    }
  }
  reports
}

fn current_uid_gid() -> (u32, u32) {
  // SAFETY: geteuid/getegid cannot fail
  unsafe { (libc::geteuid(), libc::getegid()) }
}
