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
use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

use std::fs;

use serde_json::Value;

fn kaprese(config_dir: &Path) -> Command {
  let mut cmd = Command::new(cargo::cargo_bin!("kaprese"));
  cmd
    .arg("--config")
    .arg(config_dir)
    .env("CLICOLOR", "0")
    .env_remove("KAPRESE_DOCKER_HOST")
    .env_remove("KAPRESE_OUTPUT_PATH")
    .env_remove("KAPRESE_MOUNT_SUBPATH");
  cmd
}

#[test]
fn test_engine_preset_and_list() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["engine", "preset", "saver", "cafe"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Registered engine \"saver\""))
    .stdout(predicate::str::contains("Registered engine \"cafe\""));

  kaprese(temp.path())
    .args(["engine", "list", "--quiet"])
    .assert()
    .success()
    .stdout(predicate::str::contains("saver"))
    .stdout(predicate::str::contains("cafe"));

  // Without --overwrite a second registration is refused
  kaprese(temp.path())
    .args(["engine", "preset", "saver"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already registered"));
}

#[test]
fn test_engine_inspect_round_trips_the_record() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["engine", "preset", "cafe"])
    .assert()
    .success();

  let output = kaprese(temp.path())
    .args(["engine", "inspect", "cafe"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let record: Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(record["name"], "cafe");
  assert_eq!(record["image"], "ghcr.io/kupl/kaprese-engines/cafe");
  assert_eq!(record["supported_languages"][0], "ocaml");
  assert_eq!(record["success_exit_codes"][1], 106);
}

#[test]
fn test_engine_inspect_unknown_fails() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["engine", "inspect", "sorald"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_benchmark_preset_writes_records() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["benchmark", "preset", "c"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Registered 3 of 3"));

  let record_path = temp.path().join("benchmarks").join("flex-1.json");
  let record: Value = serde_json::from_str(&fs::read_to_string(record_path).unwrap()).unwrap();
  assert_eq!(record["name"], "flex-1");
  assert_eq!(record["image"], "ghcr.io/kupl/starlab-benchmarks/c:flex-1");
  assert_eq!(record["language_command"], "echo c");

  // Existing records survive a second preset run
  kaprese(temp.path())
    .args(["benchmark", "preset", "c"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Registered 0 of 3"));

  kaprese(temp.path())
    .args(["benchmark", "preset", "pascal"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown benchmark preset"));
}

#[test]
fn test_benchmark_unregister() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["benchmark", "preset", "c"])
    .assert()
    .success();

  kaprese(temp.path())
    .args(["benchmark", "unregister", "flex-1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Unregistered benchmark \"flex-1\""));
  assert!(!temp.path().join("benchmarks").join("flex-1.json").exists());

  kaprese(temp.path())
    .args(["benchmark", "unregister", "flex-1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("does not exist"));
}

#[test]
fn test_config_set_and_show() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["config", "set", "output_path", "/tmp/kaprese-results"])
    .assert()
    .success();

  let config_file = temp.path().join("config.json");
  let saved: Value = serde_json::from_str(&fs::read_to_string(config_file).unwrap()).unwrap();
  assert_eq!(saved["output_path"], "/tmp/kaprese-results");

  kaprese(temp.path())
    .args(["config", "show"])
    .assert()
    .success()
    .stdout(predicate::str::contains("/tmp/kaprese-results"))
    .stdout(predicate::str::contains("mount_subpath"));

  kaprese(temp.path())
    .args(["config", "set", "no_such_key", "value"])
    .assert()
    .failure();
}

#[test]
fn test_run_ignores_unknown_names() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["run", "-e", "no-engine", "-b", "no-benchmark"])
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "Engine \"no-engine\" not found (ignored)",
    ))
    .stdout(predicate::str::contains(
      "Benchmark \"no-benchmark\" not found (ignored)",
    ))
    .stdout(predicate::str::contains("Nothing to run"));
}

#[test]
fn test_eval_scores_output_directories() {
  let temp = tempdir().unwrap();
  let output = temp.path().join("results");
  fs::create_dir_all(output.join("cafe/formula-1")).unwrap();
  fs::write(output.join("cafe/formula-1/fixed.ml"), "let f = 1\n").unwrap();
  fs::create_dir_all(output.join("cafe/formula-2")).unwrap();

  kaprese(temp.path())
    .args(["eval", "-e", "cafe", "--output"])
    .arg(&output)
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "cafe: 2 total, 1 correct, 50.00% accuracy",
    ));
}

#[test]
fn test_eval_rejects_unscorable_engines() {
  let temp = tempdir().unwrap();

  kaprese(temp.path())
    .args(["eval", "-e", "saver"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No evaluator for engine \"saver\""));
}

#[test]
fn test_run_requires_selection_flags() {
  let temp = tempdir().unwrap();

  kaprese(temp.path()).arg("run").assert().failure();
}
