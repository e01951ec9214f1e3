// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Write-only persistence of simulated runs.

use geox_core::GeoxError;
use geox_sim::{DailyObservation, EffectShape, ExperimentDataset};
use serde::Serialize;
use std::io::Write;

/// Summary row stored once per run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub template_name: String,
    pub test_market: String,
    pub control_market: String,
    /// 0-based index of the first post-period day.
    pub intervention_day: usize,
    pub pre_period_days: usize,
    pub post_period_days: usize,
    pub mde_requested: f64,
    pub mde_applied: f64,
    pub effect_shape: EffectShape,
}

impl RunMetadata {
    pub fn from_dataset(
        run_id: impl Into<String>,
        template_name: impl Into<String>,
        dataset: &ExperimentDataset,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            template_name: template_name.into(),
            test_market: dataset.test_market.clone(),
            control_market: dataset.control_market.clone(),
            intervention_day: dataset.effect.intervention_day,
            pre_period_days: dataset.pre_period_days,
            post_period_days: dataset.post_period_days,
            mde_requested: dataset.effect.requested_mde_fraction,
            mde_applied: dataset.effect.applied_mde_fraction,
            effect_shape: dataset.effect.shape,
        }
    }
}

/// Receives every generated run. Nothing is ever read back.
pub trait RunSink {
    fn record(
        &mut self,
        metadata: &RunMetadata,
        dataset: &ExperimentDataset,
    ) -> Result<(), GeoxError>;
}

/// One line of a [`JsonLinesSink`] stream.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkRecord<'a> {
    Run(&'a RunMetadata),
    Daily {
        run_id: &'a str,
        #[serde(flatten)]
        row: &'a DailyObservation,
    },
}

/// Newline-delimited JSON: a `run` object followed by its `daily` rows.
///
/// Missing observations serialize as `null`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    runs_written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            runs_written: 0,
        }
    }

    pub fn runs_written(&self) -> usize {
        self.runs_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, record: &SinkRecord<'_>) -> Result<(), GeoxError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|err| GeoxError::persistence(format!("failed to encode record: {err}")))?;
        self.writer
            .write_all(b"\n")
            .map_err(|err| GeoxError::persistence(format!("failed to write record: {err}")))
    }
}

impl<W: Write> RunSink for JsonLinesSink<W> {
    fn record(
        &mut self,
        metadata: &RunMetadata,
        dataset: &ExperimentDataset,
    ) -> Result<(), GeoxError> {
        let rows = dataset.rows()?;
        self.write_line(&SinkRecord::Run(metadata))?;
        for row in &rows {
            self.write_line(&SinkRecord::Daily {
                run_id: &metadata.run_id,
                row,
            })?;
        }
        self.writer
            .flush()
            .map_err(|err| GeoxError::persistence(format!("failed to flush: {err}")))?;
        self.runs_written += 1;
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub runs: Vec<RunMetadata>,
    /// `(run_id, row)` pairs in write order.
    pub daily: Vec<(String, DailyObservation)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_for<'a>(&'a self, run_id: &'a str) -> impl Iterator<Item = &'a DailyObservation> {
        self.daily
            .iter()
            .filter(move |(id, _)| id == run_id)
            .map(|(_, row)| row)
    }
}

impl RunSink for MemorySink {
    fn record(
        &mut self,
        metadata: &RunMetadata,
        dataset: &ExperimentDataset,
    ) -> Result<(), GeoxError> {
        let rows = dataset.rows()?;
        self.runs.push(metadata.clone());
        self.daily.extend(
            rows.into_iter()
                .map(|row| (metadata.run_id.clone(), row)),
        );
        Ok(())
    }
}
