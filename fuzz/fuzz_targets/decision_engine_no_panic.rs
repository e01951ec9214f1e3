// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use geox_core::TimeSeries;
use geox_infer::{
    CounterfactualInput, CounterfactualModel, DecisionEngine, FlatMeanPredictor, PeriodRanges,
    Recommendation, RegressionPredictor,
};
use libfuzzer_sys::fuzz_target;

const MAX_LEN: usize = 256;

/// Raw bit patterns keep NaN, infinities, and subnormals in play.
fn decode_f64_chunks(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .take(MAX_LEN)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let Some((&split_seed, rest)) = data.split_first() else {
        return;
    };
    let values = decode_f64_chunks(rest);
    let half = values.len() / 2;
    let (actual, predicted) = values.split_at(half);
    let predicted = &predicted[..half];

    let engine = DecisionEngine::default();
    let result = engine.analyze(actual, predicted);
    assert_eq!(result.estimate.pointwise.len(), actual.len());
    assert_ne!(result.recommendation, Recommendation::Error);

    let (Ok(outcome), Ok(covariate)) = (
        TimeSeries::new(actual.to_vec()),
        TimeSeries::new(predicted.to_vec()),
    ) else {
        return;
    };
    if outcome.len() < 2 {
        return;
    }
    let pre_days = 1 + usize::from(split_seed) % (outcome.len() - 1);
    let Ok(periods) = PeriodRanges::split(pre_days, outcome.len()) else {
        return;
    };
    let Ok(input) = CounterfactualInput::new(outcome, vec![covariate], periods) else {
        return;
    };
    let models: [&dyn CounterfactualModel; 2] = [&FlatMeanPredictor, &RegressionPredictor];
    for model in models {
        let _ = engine.analyze_with_model(model, &input);
    }
});
