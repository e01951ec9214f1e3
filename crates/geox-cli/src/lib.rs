// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Commands behind the `geox` binary. Each returns a serializable report.

use geox_batch::{BatchConfig, BatchReport, BatchRunner, RunSink};
use geox_core::stats::finite_mean;
use geox_core::{ExperimentTemplate, GeoxError, MarketCatalog, RunDiagnostics, TimeSeries};
use geox_infer::{
    CounterfactualInput, CounterfactualModel, DecisionEngine, DecisionResult, FlatMeanPredictor,
    PeriodRanges, RegressionPredictor, ValidityChecker, ValidityReport,
};
use geox_match::{
    CandidatePool, ControlMatch, PreFitQuality, SyntheticControlFit, build_synthetic_control,
    evaluate_pre_period_fit, find_best_controls,
};
use geox_power::{
    AchievedPower, PowerCalculator, PowerStatus, RequiredDuration, SampleCharacteristics,
    estimate_sample_characteristics, get_power_status,
};
use geox_sim::{
    ConfounderEvent, ConfounderKind, DEFAULT_MDE_FRACTION, EffectShape, ExperimentRequest,
    GenerationOverrides, GenerationParameters, SeriesGenerator,
};
use serde::Serialize;
use std::str::FromStr;

pub const DEFAULT_SEED: u64 = 42;
/// Controls blended into the synthetic control by `design`.
pub const SYNTHETIC_CONTROL_SIZE: usize = 3;
const POWER_CURVE_STEP_DAYS: usize = 7;

/// Explicit MDE, else the template's default, else the library default.
pub fn resolve_mde(explicit: Option<f64>, template: Option<&ExperimentTemplate>) -> f64 {
    explicit
        .or_else(|| template.map(ExperimentTemplate::default_mde_fraction))
        .unwrap_or(DEFAULT_MDE_FRACTION)
}

/// Counterfactual model selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelChoice {
    #[default]
    Regression,
    FlatMean,
}

impl ModelChoice {
    pub fn as_str(self) -> &'static str {
        self.model().name()
    }

    pub fn model(self) -> &'static dyn CounterfactualModel {
        match self {
            Self::Regression => &RegressionPredictor,
            Self::FlatMean => &FlatMeanPredictor,
        }
    }
}

impl FromStr for ModelChoice {
    type Err = GeoxError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "regression" => Ok(Self::Regression),
            "flat_mean" => Ok(Self::FlatMean),
            _ => Err(GeoxError::invalid_input(format!(
                "unknown model '{raw}'; expected regression or flat_mean"
            ))),
        }
    }
}

/// Stable machine-readable code for the error envelope.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(err) = err.downcast_ref::<GeoxError>() {
        return match err {
            GeoxError::InvalidInput(_) => "invalid_input",
            GeoxError::NumericalIssue(_) => "numerical_issue",
            GeoxError::Collaborator(_) => "collaborator_failure",
            GeoxError::ResourceLimit(_) => "resource_limit",
            GeoxError::Persistence(_) => "persistence_error",
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        "io_error"
    } else if err.downcast_ref::<serde_json::Error>().is_some() {
        "json_error"
    } else {
        "error"
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulateOptions {
    pub test_market: String,
    pub control_market: String,
    pub pre_period_days: usize,
    pub post_period_days: usize,
    pub mde_fraction: f64,
    pub shape: EffectShape,
    pub confounders: Vec<ConfounderKind>,
    pub seed: u64,
    pub model: ModelChoice,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectSummary {
    pub shape: EffectShape,
    pub intervention_day: usize,
    pub requested_mde_fraction: f64,
    pub applied_mde_fraction: f64,
    pub magnitude: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeriodMeans {
    pub test_pre: f64,
    pub test_post: f64,
    pub control_pre: f64,
    pub control_post: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub test_market: String,
    pub control_market: String,
    pub model: String,
    pub parameters: GenerationParameters,
    pub effect: EffectSummary,
    pub confounders: Vec<ConfounderEvent>,
    pub means: PeriodMeans,
    pub missing_test_days: usize,
    pub validity: ValidityReport,
    pub decision: DecisionResult,
    pub diagnostics: RunDiagnostics,
}

/// Simulates one experiment and analyzes it end to end.
pub fn simulate(options: &SimulateOptions) -> Result<SimulationReport, GeoxError> {
    let request = ExperimentRequest {
        pre_period_days: options.pre_period_days,
        post_period_days: options.post_period_days,
        mde_fraction: options.mde_fraction,
        shape: options.shape,
        confounders: options.confounders.clone(),
        ..ExperimentRequest::new(options.test_market.as_str(), options.control_market.as_str())
    };
    let dataset = SeriesGenerator::new(options.seed).generate_experiment_data(&request)?;
    let pre = dataset.pre_range();
    let post = dataset.post_range();

    let validity = ValidityChecker::default().check(
        dataset.test.values(),
        dataset.control.values(),
        dataset.pre_period_days,
        None,
    )?;
    let model = options.model.model();
    let input = CounterfactualInput::new(
        dataset.test.clone(),
        vec![dataset.control.clone()],
        PeriodRanges::split(dataset.pre_period_days, dataset.len())?,
    )?;
    let decision = DecisionEngine::default().analyze_with_model(model, &input);

    Ok(SimulationReport {
        seed: options.seed,
        test_market: dataset.test_market.clone(),
        control_market: dataset.control_market.clone(),
        model: model.name().to_string(),
        parameters: dataset.parameters.clone(),
        effect: EffectSummary {
            shape: dataset.effect.shape,
            intervention_day: dataset.effect.intervention_day,
            requested_mde_fraction: dataset.effect.requested_mde_fraction,
            applied_mde_fraction: dataset.effect.applied_mde_fraction,
            magnitude: dataset.effect.magnitude,
        },
        confounders: dataset.confounders.clone(),
        means: PeriodMeans {
            test_pre: finite_mean(&dataset.test.values()[pre.clone()]),
            test_post: finite_mean(&dataset.test.values()[post.clone()]),
            control_pre: finite_mean(&dataset.control.values()[pre]),
            control_post: finite_mean(&dataset.control.values()[post]),
        },
        missing_test_days: dataset.test.n_missing(),
        validity,
        decision,
        diagnostics: dataset.diagnostics,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesignOptions {
    pub seed: u64,
    pub test_market: String,
    pub pre_period_days: usize,
    pub mde_fraction: f64,
    pub alpha: f64,
    pub power: f64,
    pub top_k: usize,
    pub ridge_alpha: f64,
    /// Duration to evaluate; the required duration when `None`.
    pub duration_days: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PowerPoint {
    pub duration_days: usize,
    pub achieved_power: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DesignReport {
    pub seed: u64,
    pub test_market: String,
    pub pre_period_days: usize,
    pub matches: Vec<ControlMatch>,
    pub synthetic_control: SyntheticControlFit,
    pub pre_fit: PreFitQuality,
    pub sample: SampleCharacteristics,
    pub required: RequiredDuration,
    pub achieved: AchievedPower,
    pub status: PowerStatus,
    pub power_curve: Vec<PowerPoint>,
}

/// Pre-period market matching plus power analysis for a test market in the
/// US DMA catalog.
pub fn design(options: &DesignOptions) -> Result<DesignReport, GeoxError> {
    let catalog = MarketCatalog::us_top_dmas();
    if !catalog.contains(&options.test_market) {
        return Err(GeoxError::invalid_input(format!(
            "test market '{}' is not in the market catalog",
            options.test_market
        )));
    }

    let (test, pool) = pre_period_pool(&catalog, options)?;
    let matches = find_best_controls(&test, &pool, options.top_k)?;
    let selected = matches
        .iter()
        .take(SYNTHETIC_CONTROL_SIZE)
        .map(|entry| entry.name.as_str())
        .collect::<Vec<_>>();
    let synthetic = build_synthetic_control(&test, &pool, Some(&selected), options.ridge_alpha)?;
    let pre_fit = evaluate_pre_period_fit(test.values(), synthetic.series.values())?;

    let sample = estimate_sample_characteristics(test.values())?;
    let calculator = PowerCalculator::default();
    let required = calculator.calculate_required_duration(
        sample.baseline_mean,
        sample.baseline_std,
        options.mde_fraction,
        options.alpha,
        options.power,
    )?;
    let duration_days = options.duration_days.unwrap_or(required.required_days);
    let achieved = calculator.calculate_achieved_power(
        sample.baseline_mean,
        sample.baseline_std,
        options.mde_fraction,
        duration_days,
        options.alpha,
    )?;
    let status = get_power_status(achieved.achieved_power);

    let config = calculator.config();
    let power_curve = (config.min_days..=config.max_days)
        .step_by(POWER_CURVE_STEP_DAYS)
        .map(|days| {
            calculator
                .calculate_achieved_power(
                    sample.baseline_mean,
                    sample.baseline_std,
                    options.mde_fraction,
                    days,
                    options.alpha,
                )
                .map(|point| PowerPoint {
                    duration_days: days,
                    achieved_power: point.achieved_power,
                })
        })
        .collect::<Result<Vec<_>, GeoxError>>()?;

    Ok(DesignReport {
        seed: options.seed,
        test_market: options.test_market.clone(),
        pre_period_days: options.pre_period_days,
        matches,
        synthetic_control: synthetic.fit,
        pre_fit,
        sample,
        required,
        achieved,
        status,
        power_curve,
    })
}

/// Test market plus one independently drawn market per other catalog entry,
/// all from a single seeded stream.
fn pre_period_pool(
    catalog: &MarketCatalog,
    options: &DesignOptions,
) -> Result<(TimeSeries, CandidatePool), GeoxError> {
    let mut generator = SeriesGenerator::new(options.seed);
    let no_overrides = GenerationOverrides::default();
    let (baseline, _) = generator.generate_baseline(options.pre_period_days, &no_overrides)?;
    let (test, _) = generator.generate_control_market(&baseline, None)?;

    let mut pool = CandidatePool::new();
    for name in catalog.others(&options.test_market) {
        let (baseline, _) = generator.generate_baseline(options.pre_period_days, &no_overrides)?;
        let (series, _) = generator.generate_control_market(&baseline, None)?;
        pool.insert(name, series)?;
    }
    Ok((test, pool))
}

/// Runs a batch, streaming generated runs into `sink` when given.
pub fn batch(
    config: BatchConfig,
    model: ModelChoice,
    sink: Option<&mut dyn RunSink>,
) -> Result<BatchReport, GeoxError> {
    BatchRunner::new(config)?.run(model.model(), sink)
}

#[cfg(test)]
mod tests {
    use super::{
        DesignOptions, ModelChoice, SimulateOptions, batch, design, error_code, resolve_mde,
        simulate,
    };
    use geox_core::GeoxError;
    use geox_batch::{BatchConfig, MemorySink};
    use geox_core::ExperimentTemplate;
    use geox_infer::Recommendation;
    use geox_sim::{ConfounderKind, EffectShape};

    fn simulate_options() -> SimulateOptions {
        SimulateOptions {
            test_market: "Austin, TX".into(),
            control_market: "Denver, CO".into(),
            pre_period_days: 90,
            post_period_days: 42,
            mde_fraction: 0.15,
            shape: EffectShape::Step,
            confounders: vec![],
            seed: 42,
            model: ModelChoice::Regression,
        }
    }

    fn design_options() -> DesignOptions {
        DesignOptions {
            seed: 42,
            test_market: "Austin, TX".into(),
            pre_period_days: 90,
            mde_fraction: 0.05,
            alpha: 0.05,
            power: 0.80,
            top_k: 5,
            ridge_alpha: 1.0,
            duration_days: None,
        }
    }

    #[test]
    fn mde_resolution_prefers_explicit_then_template() {
        let template = ExperimentTemplate::custom("Organic Sessions", 12.0).expect("valid");
        assert_eq!(resolve_mde(Some(0.2), Some(&template)), 0.2);
        assert!((resolve_mde(None, Some(&template)) - 0.12).abs() < 1e-12);
        assert_eq!(resolve_mde(None, None), 0.08);
    }

    #[test]
    fn model_names_parse() {
        assert_eq!("regression".parse::<ModelChoice>(), Ok(ModelChoice::Regression));
        assert_eq!("flat_mean".parse::<ModelChoice>(), Ok(ModelChoice::FlatMean));
        assert_eq!(ModelChoice::FlatMean.as_str(), "flat_mean");
        let err = "arima".parse::<ModelChoice>().expect_err("unknown model");
        assert!(err.to_string().contains("unknown model 'arima'"));
    }

    #[test]
    fn error_codes_follow_the_error_kind() {
        let err = anyhow::Error::new(GeoxError::resource_limit("too many"));
        assert_eq!(error_code(&err), "resource_limit");
        let wrapped = anyhow::Error::new(GeoxError::invalid_input("bad")).context("while loading");
        assert_eq!(error_code(&wrapped), "invalid_input");
        assert_eq!(error_code(&anyhow::anyhow!("plain")), "error");
    }

    #[test]
    fn simulate_reports_a_shipping_decision_for_large_effects() {
        let report = simulate(&simulate_options()).expect("simulation runs");
        assert_eq!(report.model, "regression");
        assert_eq!(report.effect.intervention_day, 90);
        assert_eq!(report.decision.recommendation, Recommendation::Ship);
        assert!(report.means.test_post.is_finite() && report.means.control_post.is_finite());
        assert_eq!(report.missing_test_days, 0);
        assert_eq!(report.diagnostics.seed, Some(42));
        assert_eq!(report.decision.estimate.pointwise.len(), 42);
    }

    #[test]
    fn simulate_reports_confounders_and_is_deterministic() {
        let options = SimulateOptions {
            confounders: vec![ConfounderKind::SeasonalitySpike],
            model: ModelChoice::FlatMean,
            ..simulate_options()
        };
        let first = simulate(&options).expect("simulation runs");
        let second = simulate(&options).expect("simulation runs");
        assert_eq!(first.confounders.len(), 1);
        assert_eq!(first.model, "flat_mean");
        assert_eq!(first, second);
    }

    #[test]
    fn design_ranks_catalog_and_sizes_the_test() {
        let report = design(&design_options()).expect("design runs");
        assert_eq!(report.matches.len(), 5);
        assert!(report.matches.iter().all(|m| m.name != "Austin, TX"));
        assert_eq!(report.synthetic_control.weights.len(), 3);
        assert!((report.synthetic_control.weight_sum() - 1.0).abs() < 1e-9);
        assert!((7..=90).contains(&report.required.required_days));
        assert_eq!(report.achieved.duration_days, report.required.required_days);
        assert_eq!(report.power_curve.first().map(|p| p.duration_days), Some(7));
        assert_eq!(report.power_curve.last().map(|p| p.duration_days), Some(84));
    }

    #[test]
    fn design_rejects_unknown_market() {
        let options = DesignOptions {
            test_market: "Atlantis".into(),
            ..design_options()
        };
        let err = design(&options).expect_err("unknown market must fail");
        assert!(err.to_string().contains("not in the market catalog"));
    }

    #[test]
    fn batch_streams_into_sink() {
        let mut sink = MemorySink::new();
        let report = batch(
            BatchConfig {
                num_experiments: 2,
                effect_sizes_pct: vec![5.0],
                ..BatchConfig::default()
            },
            ModelChoice::FlatMean,
            Some(&mut sink),
        )
        .expect("batch runs");
        assert_eq!(report.summary.total, 2);
        assert_eq!(sink.runs.len(), 2);
    }
}
