// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::BatchConfig;
use crate::sink::{RunMetadata, RunSink};
use crate::summary::BatchSummary;
use geox_core::GeoxError;
use geox_core::stats::pearson;
use geox_infer::{
    CounterfactualInput, CounterfactualModel, DecisionEngine, DecisionResult, PeriodRanges,
    Recommendation,
};
use geox_sim::{ConfounderKind, EffectShape, ExperimentDataset, ExperimentRequest, SeriesGenerator};
use rayon::prelude::*;
use serde::Serialize;

const SEED_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;
const CONFOUNDER_PROBABILITY: f64 = 0.5;

/// Seed of run `run_index` in a batch seeded with `base_seed`.
pub fn run_seed(base_seed: u64, run_index: usize) -> u64 {
    base_seed.wrapping_add((run_index as u64).wrapping_mul(SEED_STRIDE))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        mde_applied: f64,
        decision: DecisionResult,
    },
    Failed {
        message: String,
    },
}

impl RunOutcome {
    pub fn decision(&self) -> Option<&DecisionResult> {
        match self {
            Self::Completed { decision, .. } => Some(decision),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    pub run_index: usize,
    /// `EXP_<pair>_<effect>pct`.
    pub run_id: String,
    pub seed: u64,
    pub test_market: String,
    pub control_market: String,
    pub planned_effect_pct: f64,
    pub confounders: Vec<ConfounderKind>,
    /// Pre-period Pearson correlation of test and control; `NaN` on failure.
    pub pre_correlation: f64,
    pub outcome: RunOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub config: BatchConfig,
    /// In run order regardless of execution order.
    pub results: Vec<RunResult>,
    pub summary: BatchSummary,
}

#[derive(Clone, Copy, Debug)]
struct RunPlan {
    run_index: usize,
    experiment: usize,
    effect_pct: f64,
}

/// Runs every (market pair, effect size) combination of a [`BatchConfig`].
#[derive(Clone, Debug)]
pub struct BatchRunner {
    config: BatchConfig,
    engine: DecisionEngine,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Result<Self, GeoxError> {
        config.validate()?;
        Ok(Self {
            config,
            engine: DecisionEngine::default(),
        })
    }

    pub fn with_engine(config: BatchConfig, engine: DecisionEngine) -> Result<Self, GeoxError> {
        config.validate()?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Executes all runs in parallel, then hands each generated dataset to
    /// `sink` in run order. Per-run failures are reported in the results;
    /// only sink failures abort the batch.
    pub fn run(
        &self,
        model: &dyn CounterfactualModel,
        mut sink: Option<&mut dyn RunSink>,
    ) -> Result<BatchReport, GeoxError> {
        let effects = self.config.effective_effect_sizes();
        let plans = (0..self.config.num_experiments)
            .flat_map(|experiment| effects.iter().map(move |&effect_pct| (experiment, effect_pct)))
            .enumerate()
            .map(|(run_index, (experiment, effect_pct))| RunPlan {
                run_index,
                experiment,
                effect_pct,
            })
            .collect::<Vec<_>>();

        let executed = plans
            .par_iter()
            .map(|plan| self.execute(plan, model))
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(executed.len());
        for (result, dataset) in executed {
            if let (Some(sink), Some(dataset)) = (sink.as_deref_mut(), dataset.as_ref()) {
                let metadata =
                    RunMetadata::from_dataset(&result.run_id, &self.config.template_name, dataset);
                sink.record(&metadata, dataset)?;
            }
            results.push(result);
        }

        let summary = BatchSummary::from_results(&results)?;
        tracing::debug!(
            runs = summary.total,
            failed = summary.failed,
            winners = summary.winners,
            "batch finished"
        );
        Ok(BatchReport {
            config: self.config.clone(),
            results,
            summary,
        })
    }

    fn execute(
        &self,
        plan: &RunPlan,
        model: &dyn CounterfactualModel,
    ) -> (RunResult, Option<ExperimentDataset>) {
        let (test_market, control_market) = self.config.market_pair(plan.experiment);
        let seed = run_seed(self.config.base_seed, plan.run_index);
        let mut result = RunResult {
            run_index: plan.run_index,
            run_id: format!("EXP_{}_{}pct", plan.experiment + 1, plan.effect_pct),
            seed,
            test_market: test_market.to_string(),
            control_market: control_market.to_string(),
            planned_effect_pct: plan.effect_pct,
            confounders: vec![],
            pre_correlation: f64::NAN,
            outcome: RunOutcome::Failed {
                message: String::new(),
            },
        };

        let mut generator = SeriesGenerator::new(seed);
        let simulated = self
            .simulate(&mut generator, plan, test_market, control_market)
            .and_then(|dataset| {
                let pre = dataset.pre_range();
                let correlation =
                    pearson(&dataset.test.values()[pre.clone()], &dataset.control.values()[pre])?;
                let input = CounterfactualInput::new(
                    dataset.test.clone(),
                    vec![dataset.control.clone()],
                    PeriodRanges::split(dataset.pre_period_days, dataset.len())?,
                )?;
                Ok((dataset, correlation, input))
            });

        let (dataset, correlation, input) = match simulated {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(run_id = result.run_id.as_str(), error = %err, "run failed before analysis");
                result.outcome = RunOutcome::Failed {
                    message: err.to_string(),
                };
                return (result, None);
            }
        };

        result.confounders = dataset.confounders.iter().map(|event| event.kind()).collect();
        result.pre_correlation = correlation;
        let decision = self.engine.analyze_with_model(model, &input);
        result.outcome = if decision.recommendation == Recommendation::Error {
            RunOutcome::Failed {
                message: decision.explanation,
            }
        } else {
            RunOutcome::Completed {
                mde_applied: dataset.effect.applied_mde_fraction,
                decision,
            }
        };
        tracing::debug!(run_id = result.run_id.as_str(), seed, "run finished");
        (result, Some(dataset))
    }

    fn simulate(
        &self,
        generator: &mut SeriesGenerator,
        plan: &RunPlan,
        test_market: &str,
        control_market: &str,
    ) -> Result<ExperimentDataset, GeoxError> {
        let confounders = if self.config.include_confounders {
            generator.sample_confounders(CONFOUNDER_PROBABILITY)?
        } else {
            vec![]
        };
        let request = ExperimentRequest {
            pre_period_days: self.config.pre_period_days,
            post_period_days: self.config.post_period_days,
            mde_fraction: plan.effect_pct / 100.0,
            shape: EffectShape::Step,
            confounders,
            ..ExperimentRequest::new(test_market, control_market)
        };
        generator.generate_experiment_data(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchRunner, RunOutcome, run_seed};
    use crate::config::BatchConfig;
    use crate::sink::MemorySink;
    use geox_core::GeoxError;
    use geox_infer::{CounterfactualInput, CounterfactualModel, RegressionPredictor};

    #[test]
    fn seeds_are_distinct_and_start_at_base() {
        assert_eq!(run_seed(42, 0), 42);
        let seeds = (0..20).map(|idx| run_seed(42, idx)).collect::<Vec<_>>();
        for (idx, seed) in seeds.iter().enumerate() {
            assert!(!seeds[..idx].contains(seed));
        }
    }

    #[test]
    fn runs_are_ordered_and_named() {
        let runner = BatchRunner::new(BatchConfig::default()).expect("valid config");
        let report = runner.run(&RegressionPredictor, None).expect("batch runs");
        let ids = report
            .results
            .iter()
            .map(|result| result.run_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec!["EXP_1_5pct", "EXP_1_10pct", "EXP_2_5pct", "EXP_2_10pct", "EXP_3_5pct", "EXP_3_10pct"]
        );
        assert_eq!(report.results[2].test_market, "Market_C");
        assert_eq!(report.results[2].control_market, "Market_D");
        assert!(
            report
                .results
                .iter()
                .enumerate()
                .all(|(idx, result)| result.run_index == idx)
        );
        assert_eq!(report.summary.total, 6);
        assert_eq!(report.summary.failed, 0);
    }

    #[test]
    fn batches_are_reproducible() {
        let config = BatchConfig {
            include_confounders: true,
            ..BatchConfig::default()
        };
        let first = BatchRunner::new(config.clone())
            .expect("valid config")
            .run(&RegressionPredictor, None)
            .expect("batch runs");
        let second = BatchRunner::new(config)
            .expect("valid config")
            .run(&RegressionPredictor, None)
            .expect("batch runs");
        for (a, b) in first.results.iter().zip(&second.results) {
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.confounders, b.confounders);
            let (Some(da), Some(db)) = (a.outcome.decision(), b.outcome.decision()) else {
                panic!("regression runs should complete");
            };
            assert_eq!(da.estimate.cumulative.to_bits(), db.estimate.cumulative.to_bits());
        }
    }

    struct Failing;

    impl CounterfactualModel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn fit_predict(&self, _input: &CounterfactualInput) -> Result<Vec<f64>, GeoxError> {
            Err(GeoxError::collaborator("no convergence"))
        }
    }

    #[test]
    fn model_failures_become_failed_rows_but_still_persist() {
        let runner = BatchRunner::new(BatchConfig::default()).expect("valid config");
        let mut sink = MemorySink::new();
        let report = runner
            .run(&Failing, Some(&mut sink))
            .expect("batch itself succeeds");
        assert_eq!(report.summary.failed, 6);
        assert_eq!(report.summary.significance.errors, 6);
        assert!(report.summary.effect_distribution.is_none());
        for result in &report.results {
            let RunOutcome::Failed { message } = &result.outcome else {
                panic!("every run should fail");
            };
            assert!(message.contains("no convergence"));
        }
        assert_eq!(sink.runs.len(), 6);
        assert_eq!(sink.daily.len(), 6 * 132);
    }
}
