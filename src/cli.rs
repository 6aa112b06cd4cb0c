use clap::Args;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kaprese", version, about = "Program repair benchmark harness")]
pub struct Cli {
  /// Path to the kaprese configuration directory.
  #[arg(long, global = true, env = "KAPRESE_CONFIG_PATH")]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Show or change configuration values.
  #[command(subcommand)]
  Config(ConfigCommand),

  /// Manage registered benchmarks.
  #[command(subcommand)]
  Benchmark(BenchmarkCommand),

  /// Manage registered engines.
  #[command(subcommand)]
  Engine(EngineCommand),

  /// Run engines over benchmarks.
  Run(RunArgs),

  /// Score finished runs from their output directories.
  Eval(EvalArgs),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
  /// Print all configuration values.
  Show,

  /// Persist a configuration value to the config file.
  Set {
    /// One of: docker_host, output_path, mount_subpath.
    key: String,
    value: String,
  },
}

#[derive(Debug, Subcommand)]
pub enum BenchmarkCommand {
  /// List registered benchmarks.
  List {
    /// Include benchmarks whose image is not available locally.
    #[arg(short, long)]
    all: bool,
  },

  /// Register a preset family of benchmarks.
  Preset {
    /// Preset name: c or ocaml.
    name: String,

    /// Replace already-registered benchmarks of the same name.
    #[arg(long)]
    overwrite: bool,
  },

  /// Remove a registered benchmark.
  Unregister {
    name: String,

    /// Also delete the benchmark image.
    #[arg(long)]
    cleanup: bool,
  },
}

#[derive(Debug, Subcommand)]
pub enum EngineCommand {
  /// List registered engines.
  List {
    /// Print names only.
    #[arg(short, long)]
    quiet: bool,
  },

  /// Print one engine record as JSON.
  Inspect { name: String },

  /// Register preset engines.
  Preset {
    /// Preset names: saver, cafe.
    #[arg(required = true)]
    names: Vec<String>,

    /// Replace already-registered engines of the same name.
    #[arg(long)]
    overwrite: bool,
  },
}

#[derive(Debug, Args)]
pub struct RunArgs {
  /// Engine to run (see "kaprese engine list"); repeatable.
  #[arg(short, long = "engine", value_name = "ENGINE", required = true)]
  pub engines: Vec<String>,

  /// Benchmark to run (see "kaprese benchmark list"); repeatable.
  #[arg(short, long = "benchmark", value_name = "BENCHMARK", required = true)]
  pub benchmarks: Vec<String>,

  /// Delete each runner image after its run.
  #[arg(long)]
  pub delete_runner: bool,

  /// Override the output root directory.
  #[arg(long)]
  pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EvalArgs {
  /// Engine to score; repeatable. Only engines with a known success
  /// artifact (currently cafe) can be scored.
  #[arg(short, long = "engine", value_name = "ENGINE", required = true)]
  pub engines: Vec<String>,

  /// Override the output root directory.
  #[arg(long)]
  pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn verify_cli() {
    Cli::command().debug_assert();
  }

  #[test]
  fn run_collects_repeated_flags() {
    let cli = Cli::parse_from([
      "kaprese",
      "run",
      "-e",
      "saver",
      "-e",
      "cafe",
      "-b",
      "flex-1",
      "--delete-runner",
    ]);
    let Commands::Run(args) = cli.command else {
      panic!("expected run");
    };
    assert_eq!(args.engines, ["saver", "cafe"]);
    assert_eq!(args.benchmarks, ["flex-1"]);
    assert!(args.delete_runner);
    assert!(args.output.is_none());
  }

  #[test]
  fn config_is_a_global_flag() {
    let cli = Cli::parse_from(["kaprese", "engine", "list", "--config", "/tmp/kaprese"]);
    assert_eq!(cli.config.as_deref(), Some("/tmp/kaprese".as_ref()));
  }
}
