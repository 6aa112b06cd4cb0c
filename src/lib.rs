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

//! # kaprese
//!
//! `kaprese` is a harness for running program-repair engines over benchmark
//! programs packaged as container images. Benchmarks and engines are
//! registered as JSON records; a run pairs each selected engine with each
//! selected benchmark, acquires a per-pair runner image by pull or build,
//! executes the engine's command inside it with an output directory
//! bind-mounted in, and reports the outcome.
//!
//! ## Core Modules
//!
//! * [`benchmark`]: The benchmark catalog entry and its lazily probed
//!   attributes (language, workdir, OS).
//! * [`engine`]: The engine catalog entry: supported languages, image
//!   acquisition sources and templated exec commands.
//! * [`runner`]: Pairs one engine with one benchmark and drives the run
//!   state machine.
//! * [`eval`]: Scores finished runs by scanning their output directories.
//! * [`store`]: JSON-file persistence for registered entities.
//! * [`runtime`]: The [`runtime::ContainerRuntime`] trait the entities and
//!   runner are written against.
//! * [`docker`]: The bollard-backed runtime implementation.
//! * [`mock`]: A scriptable in-memory runtime for tests.
//! * [`template`]: `{placeholder}` interpolation for commands and build args.
//! * [`presets`]: Bundled starlab benchmark families and the saver/cafe
//!   engines.
//! * [`cli`]: Defines the `clap`-based command-line interface.
//! * [`config`]: The figment-backed configuration layer.
//! * [`error`]: Defines the custom error types for the library.
//! * [`logging`]: Provides the `setup_tracing` utility.

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod eval;
pub mod logging;
pub mod mock;
pub mod presets;
pub mod runner;
pub mod runtime;
pub mod store;
pub mod template;
