use crate::benchmark::Benchmark;
use crate::engine::Engine;
use std::collections::BTreeMap;

pub const BENCHMARK_PRESETS: &[&str] = &["c", "ocaml"];
pub const ENGINE_PRESETS: &[&str] = &["saver", "cafe"];

const SAVER_DOCKERFILE: &str = r#"ARG BENCHMARK_IMAGE
FROM ${BENCHMARK_IMAGE}
RUN export DEBIAN_FRONTEND=noninteractive \
    && apt-get update \
    && apt-get install -y \
        build-essential \
        git \
        wget \
        python \
        python3 \
        tzdata \
        libtinfo5 \
        libz3-dev \
    && apt-get autoremove -y && apt-get clean -y && rm -rf /var/lib/apt/lists/*
WORKDIR /opt
RUN wget https://koreaoffice-my.sharepoint.com/:u:/g/personal/seongjoon_korea_ac_kr/ETNyGJaRxbFEgA_IHJLyRQ0BQ9egwDuxCnpjdt4AmNHlVw\?e\=KGhbVN\&download\=1 -O saver.tar.gz \
    && tar -xf saver.tar.gz \
    && rm saver.tar.gz
ENV PATH=/opt/saver-1.0/infer/bin:$PATH
"#;

/// Benchmarks from the starlab-benchmarks registry for one preset language,
/// or `None` for an unknown preset name.
pub fn benchmark_preset(name: &str) -> Option<Vec<Benchmark>> {
  match name {
    "c" => Some(c_benchmarks()),
    "ocaml" => Some(ocaml_benchmarks()),
    _ => None,
  }
}

pub fn engine_preset(name: &str) -> Option<Engine> {
  match name {
    "saver" => Some(saver()),
    "cafe" => Some(cafe()),
    _ => None,
  }
}

fn starlab_benchmark(language: &str, name: String) -> Benchmark {
  let image = format!("ghcr.io/kupl/starlab-benchmarks/{language}:{name}");
  Benchmark::new(name, image)
    .language_command(format!("echo {language}"))
    .workdir_command("pwd")
}

fn c_benchmarks() -> Vec<Benchmark> {
  ["flex-1", "flint-1", "spearmint-1"]
    .into_iter()
    .map(|name| starlab_benchmark("c", name.to_string()))
    .collect()
}

fn ocaml_benchmarks() -> Vec<Benchmark> {
  let formulas = (1..=100).map(|i| starlab_benchmark("ocaml", format!("formula-{i}")));
  let diffs = (1..=100).map(|i| starlab_benchmark("ocaml", format!("diff-{i}")));
  let lambdas = (1..=100).map(|i| starlab_benchmark("ocaml", format!("lambda-{i}")));
  formulas.chain(diffs).chain(lambdas).collect()
}

fn saver() -> Engine {
  let mut engine = Engine::new("saver");
  engine.supported_languages = vec!["c".to_string()];
  engine.supported_os = vec!["ubuntu:20.04".to_string()];
  engine.image = "ghcr.io/kupl/kaprese-engines/saver".to_string();
  engine.dockerfile = Some(SAVER_DOCKERFILE.to_string());
  engine.build_args = BTreeMap::from([(
    "BENCHMARK_IMAGE".to_string(),
    "{benchmark.image}".to_string(),
  )]);
  engine
}

fn cafe() -> Engine {
  let mut engine = Engine::new("cafe");
  engine.supported_languages = vec!["ocaml".to_string()];
  engine.supported_os = vec!["debian:12".to_string()];
  engine.image = "ghcr.io/kupl/kaprese-engines/cafe".to_string();
  engine.location = Some(
    "https://github.com/kupl/kaprese-engines.git#cafe:context/cafe/starlab-benchmarks".to_string(),
  );
  engine.build_args = BTreeMap::from([(
    "BENCHMARK_IMAGE".to_string(),
    "{benchmark.image}".to_string(),
  )]);
  engine.exec_commands = vec![
    "export ENTRY=$(cat metadata.json | jq -r .function)".to_string(),
    "export PROBLEM_NAME=$(echo {benchmark.name} | cut -d'-' -f1)".to_string(),
    "cafe -fix -solutions $PROBLEM_NAME -submission src.ml -testcases testcases -entry $ENTRY $([ -e test.ml ] && echo \\\"-grading test.ml\\\")".to_string(),
    "export RETURN_CODE=$?".to_string(),
    "cp -f cafe.log fixed.ml {runner.mount_dir}/".to_string(),
    "chown -R {runner.uid}:{runner.gid} {runner.mount_dir}".to_string(),
    "exit $RETURN_CODE".to_string(),
  ];
  // cafe reports partial repairs with exit 106
  engine.success_exit_codes = vec![0, 106];
  engine
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runtime::BuildSource;

  #[test]
  fn unknown_presets_are_none() {
    assert!(benchmark_preset("rust").is_none());
    assert!(engine_preset("sorald").is_none());
  }

  #[test]
  fn c_preset_names_and_images_line_up() {
    let benchmarks = benchmark_preset("c").unwrap();
    let names: Vec<&str> = benchmarks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["flex-1", "flint-1", "spearmint-1"]);
    assert_eq!(
      benchmarks[0].image,
      "ghcr.io/kupl/starlab-benchmarks/c:flex-1"
    );
    assert_eq!(benchmarks[0].language_command.as_deref(), Some("echo c"));
    assert_eq!(benchmarks[0].workdir_command.as_deref(), Some("pwd"));
  }

  #[test]
  fn ocaml_preset_covers_all_three_families() {
    let benchmarks = benchmark_preset("ocaml").unwrap();
    assert_eq!(benchmarks.len(), 300);
    assert_eq!(benchmarks[0].name, "formula-1");
    assert_eq!(benchmarks[99].name, "formula-100");
    assert_eq!(benchmarks[100].name, "diff-1");
    assert_eq!(benchmarks[200].name, "lambda-1");
    assert_eq!(
      benchmarks[200].image,
      "ghcr.io/kupl/starlab-benchmarks/ocaml:lambda-1"
    );
  }

  #[test]
  fn saver_builds_from_an_inline_dockerfile() {
    let saver = engine_preset("saver").unwrap();
    assert_eq!(saver.supported_languages, ["c"]);
    assert!(matches!(
      saver.build_source(),
      Some(BuildSource::Dockerfile(text)) if text.starts_with("ARG BENCHMARK_IMAGE")
    ));
    assert_eq!(saver.success_exit_codes, [0]);
    assert!(saver.exec_commands.is_empty());
  }

  #[test]
  fn cafe_builds_from_a_remote_context() {
    let cafe = engine_preset("cafe").unwrap();
    assert_eq!(cafe.supported_languages, ["ocaml"]);
    assert!(matches!(
      cafe.build_source(),
      Some(BuildSource::Context(url)) if url.starts_with("https://github.com/kupl/")
    ));
    assert_eq!(cafe.build_args["BENCHMARK_IMAGE"], "{benchmark.image}");
    assert_eq!(cafe.success_exit_codes, [0, 106]);
    assert!(
      cafe
        .exec_commands
        .iter()
        .any(|c| c.contains("{runner.mount_dir}"))
    );
  }
}
