use std::fs;
use std::path::Path;

/// Engines whose run outputs can be scored, keyed to the artifact a
/// successful run leaves in the benchmark's output directory.
const SUCCESS_ARTIFACTS: &[(&str, &str)] = &[("cafe", "fixed.ml")];

/// The file a successful run of `engine` writes, or `None` when the engine
/// has no known scoring convention.
pub fn success_artifact(engine: &str) -> Option<&'static str> {
  SUCCESS_ARTIFACTS
    .iter()
    .find(|(name, _)| *name == engine)
    .map(|(_, artifact)| *artifact)
}

/// Accuracy of one engine over the runs found under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
  pub engine: String,
  pub total: usize,
  pub correct: usize,
}

impl Evaluation {
  /// Fraction of scored runs that produced the success artifact; zero when
  /// nothing was scored.
  pub fn accuracy(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.correct as f64 / self.total as f64
    }
  }
}

/// Scores `engine` by walking `{output_root}/{engine}`: every benchmark
/// directory counts toward the total, and those containing `artifact`
/// anywhere below them count as correct.
///
/// A missing or unreadable output directory yields an empty evaluation,
/// not an error; running nothing is a valid (if unhelpful) result.
pub fn evaluate(output_root: &Path, engine: &str, artifact: &str) -> Evaluation {
  let mut evaluation = Evaluation {
    engine: engine.to_string(),
    total: 0,
    correct: 0,
  };

  let engine_dir = output_root.join(engine);
  let entries = match fs::read_dir(&engine_dir) {
    Ok(entries) => entries,
    Err(_) => {
      tracing::warn!(
        "No output directory for engine \"{}\" at \"{}\"",
        engine,
        engine_dir.display()
      );
      return evaluation;
    }
  };

  for entry in entries.filter_map(|entry| entry.ok()) {
    let benchmark_dir = entry.path();
    if !benchmark_dir.is_dir() {
      continue;
    }
    evaluation.total += 1;
    if contains_file(&benchmark_dir, artifact) {
      evaluation.correct += 1;
    }
  }

  evaluation
}

fn contains_file(dir: &Path, name: &str) -> bool {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(_) => return false,
  };
  for entry in entries.filter_map(|entry| entry.ok()) {
    let path = entry.path();
    if path.is_dir() {
      if contains_file(&path, name) {
        return true;
      }
    } else if entry.file_name() == name {
      return true;
    }
  }
  false
}
