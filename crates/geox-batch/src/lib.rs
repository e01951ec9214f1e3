// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Batches of simulated experiments run in parallel.
//!
//! Every run owns a generator seeded from the batch seed and its run index,
//! so results do not depend on thread scheduling.

pub mod config;
pub mod runner;
pub mod sink;
pub mod summary;

pub use config::{BatchConfig, MAX_EXPERIMENTS, MIN_EXPERIMENTS, default_markets};
pub use runner::{BatchReport, BatchRunner, RunOutcome, RunResult, run_seed};
pub use sink::{JsonLinesSink, MemorySink, RunMetadata, RunSink, SinkRecord};
pub use summary::{BatchSummary, EffectDistribution, SignificanceBuckets};
