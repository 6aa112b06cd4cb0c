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
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use kaprese::benchmark::Benchmark;
use kaprese::cli::BenchmarkCommand;
use kaprese::cli::Cli;
use kaprese::cli::Commands;
use kaprese::cli::ConfigCommand;
use kaprese::cli::EngineCommand;
use kaprese::cli::RunArgs;
use kaprese::cli::EvalArgs;
use kaprese::config::Config;
use kaprese::docker::DockerRuntime;
use kaprese::engine::Engine;
use kaprese::error::KapreseError;
use kaprese::eval;
use kaprese::logging::setup_tracing;
use kaprese::presets;
use kaprese::runner::RunStatus;
use kaprese::runner::run_all;
use kaprese::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
  let _guard = setup_tracing()?;

  let cli = Cli::parse();
  let main_span = tracing::info_span!("kaprese");
  let _enter = main_span.enter();

  let config = Config::load(cli.config).map_err(KapreseError::Config)?;
  let store = Store::new(&config.config_path);

  match cli.command {
    Commands::Config(command) => config_command(&config, command)?,
    Commands::Benchmark(command) => benchmark_command(&config, &store, command).await?,
    Commands::Engine(command) => engine_command(&store, command)?,
    Commands::Run(args) => run_command(config, &store, args).await?,
    Commands::Eval(args) => eval_command(&config, args)?,
  }

  Ok(())
}

fn config_command(config: &Config, command: ConfigCommand) -> Result<()> {
  match command {
    ConfigCommand::Show => {
      for (key, value, description) in config.entries() {
        println!("{key:<13} {value:<40} {description}");
      }
    }
    ConfigCommand::Set { key, value } => {
      config.set(&key, &value).map_err(KapreseError::Config)?;
      println!("{key} = {value}");
    }
  }
  Ok(())
}

async fn benchmark_command(
  config: &Config,
  store: &Store,
  command: BenchmarkCommand,
) -> Result<()> {
  match command {
    BenchmarkCommand::List { all } => {
      let runtime = connect_quietly(config);
      println!(
        "{:<16} {:<10} {:<48} {}",
        "name", "language", "image", "available"
      );
      for benchmark in store.all::<Benchmark>() {
        let available = match &runtime {
          Some(runtime) => Some(benchmark.availability(runtime).await),
          None => None,
        };
        if !all && available != Some(true) {
          continue;
        }
        let available = match available {
          Some(true) => "yes",
          Some(false) => "no",
          None => "unknown",
        };
        println!(
          "{:<16} {:<10} {:<48} {}",
          benchmark.name,
          benchmark.language().unwrap_or("-"),
          benchmark.image,
          available
        );
      }
    }
    BenchmarkCommand::Preset { name, overwrite } => {
      let benchmarks = presets::benchmark_preset(&name)
        .with_context(|| format!("Unknown benchmark preset \"{name}\""))?;
      let mut registered = 0usize;
      for benchmark in &benchmarks {
        if store.register(benchmark, overwrite).map_err(KapreseError::Store)? {
          registered += 1;
        }
      }
      println!(
        "Registered {registered} of {} \"{name}\" benchmarks",
        benchmarks.len()
      );
    }
    BenchmarkCommand::Unregister { name, cleanup } => {
      if cleanup {
        if let Some(mut benchmark) = store.load::<Benchmark>(&name) {
          if let Some(runtime) = connect_quietly(config) {
            benchmark.cleanup(&runtime, true).await;
          }
        }
      }
      if store.unregister::<Benchmark>(&name) {
        println!("Unregistered benchmark \"{name}\"");
      } else {
        println!("Benchmark \"{name}\" does not exist");
      }
    }
  }
  Ok(())
}

fn engine_command(store: &Store, command: EngineCommand) -> Result<()> {
  match command {
    EngineCommand::List { quiet } => {
      let engines = store.all::<Engine>();
      if quiet {
        for engine in engines {
          println!("{}", engine.name);
        }
      } else {
        println!(
          "{:<10} {:<12} {:<16} {}",
          "name", "languages", "os", "image"
        );
        for engine in engines {
          println!(
            "{:<10} {:<12} {:<16} {}",
            engine.name,
            engine.supported_languages.join(","),
            engine.supported_os.join(","),
            engine.image
          );
        }
      }
    }
    EngineCommand::Inspect { name } => {
      let engine = store
        .load::<Engine>(&name)
        .with_context(|| format!("Engine \"{name}\" not found"))?;
      println!(
        "{}",
        serde_json::to_string_pretty(&engine).map_err(KapreseError::Json)?
      );
    }
    EngineCommand::Preset { names, overwrite } => {
      for name in names {
        let engine = presets::engine_preset(&name)
          .with_context(|| format!("Unknown engine preset \"{name}\""))?;
        if store.register(&engine, overwrite).map_err(KapreseError::Store)? {
          println!("Registered engine \"{name}\"");
        } else {
          println!("Engine \"{name}\" already registered (use --overwrite)");
        }
      }
    }
  }
  Ok(())
}

async fn run_command(mut config: Config, store: &Store, args: RunArgs) -> Result<()> {
  if let Some(output) = args.output {
    config.output_path = output;
  }

  let engines: Vec<Engine> = args
    .engines
    .iter()
    .filter_map(|name| {
      let engine = store.load::<Engine>(name);
      if engine.is_none() {
        println!("Engine \"{name}\" not found (ignored)");
      }
      engine
    })
    .collect();
  let mut benchmarks: Vec<Benchmark> = args
    .benchmarks
    .iter()
    .filter_map(|name| {
      let benchmark = store.load::<Benchmark>(name);
      if benchmark.is_none() {
        println!("Benchmark \"{name}\" not found (ignored)");
      }
      benchmark
    })
    .collect();

  if engines.is_empty() || benchmarks.is_empty() {
    println!("Nothing to run");
    return Ok(());
  }

  let runtime = DockerRuntime::connect(config.docker_host.as_deref())
    .context("Failed to connect to the docker daemon")?;

  let reports = run_all(
    &runtime,
    &config,
    &engines,
    &mut benchmarks,
    args.delete_runner,
  )
  .await;

  let mut succeeded = 0usize;
  for report in &reports {
    let elapsed = report
      .elapsed
      .map(|d| format!(" ({:.1}s)", d.num_milliseconds() as f64 / 1000.0))
      .unwrap_or_default();
    println!(
      "{} on {}: {}{}",
      report.engine, report.benchmark, report.status, elapsed
    );
    if report.status == RunStatus::Ok {
      succeeded += 1;
    }
  }
  println!("{succeeded}/{} runs succeeded", reports.len());

  Ok(())
}

fn eval_command(config: &Config, args: EvalArgs) -> Result<()> {
  let output_root = args.output.unwrap_or_else(|| config.output_path.clone());

  for name in &args.engines {
    let artifact = eval::success_artifact(name)
      .with_context(|| format!("No evaluator for engine \"{name}\""))?;
    let evaluation = eval::evaluate(&output_root, name, artifact);
    println!(
      "{}: {} total, {} correct, {:.2}% accuracy",
      evaluation.engine,
      evaluation.total,
      evaluation.correct,
      evaluation.accuracy() * 100.0
    );
  }

  Ok(())
}

fn connect_quietly(config: &Config) -> Option<DockerRuntime> {
  match DockerRuntime::connect(config.docker_host.as_deref()) {
    Ok(runtime) => Some(runtime),
    Err(e) => {
      tracing::warn!("Failed to connect to the docker daemon: {}", e);
      None
    }
  }
}
