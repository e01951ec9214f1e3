// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_batch::{BatchConfig, BatchRunner, JsonLinesSink, RunOutcome};
use geox_infer::{FlatMeanPredictor, RegressionPredictor};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use serde_json::Value;

const MIN_PROPTEST_CASES: u32 = 32;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

#[test]
fn json_lines_stream_matches_report() {
    let config = BatchConfig {
        num_experiments: 2,
        post_period_days: 28,
        effect_sizes_pct: vec![10.0],
        ..BatchConfig::default()
    };
    let runner = BatchRunner::new(config).expect("valid config");
    let mut sink = JsonLinesSink::new(Vec::new());
    let report = runner
        .run(&RegressionPredictor, Some(&mut sink))
        .expect("batch runs");
    assert_eq!(sink.runs_written(), 2);

    let raw = String::from_utf8(sink.into_inner()).expect("utf8 output");
    let lines = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("line parses"))
        .collect::<Vec<_>>();
    assert_eq!(lines.len(), 2 * (1 + 90 + 28));
    assert_eq!(lines[0]["kind"], "run");
    assert_eq!(lines[0]["run_id"], "EXP_1_10pct");
    assert_eq!(lines[0]["template_name"], "Default");
    assert_eq!(lines[119]["kind"], "run");
    assert_eq!(lines[119]["run_id"], "EXP_2_10pct");
    assert_eq!(lines[119]["test_market"], "Market_C");

    let encoded = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(encoded["summary"]["total"], 2);
    assert_eq!(encoded["results"][0]["outcome"]["status"], "completed");
}

#[test]
fn strong_effects_mostly_win() {
    let config = BatchConfig {
        num_experiments: 4,
        effect_sizes_pct: vec![15.0],
        ..BatchConfig::default()
    };
    let report = BatchRunner::new(config)
        .expect("valid config")
        .run(&RegressionPredictor, None)
        .expect("batch runs");
    assert_eq!(report.summary.winners, 4);
    for result in &report.results {
        let RunOutcome::Completed { mde_applied, .. } = result.outcome else {
            panic!("regression runs should complete");
        };
        assert!((0.12..=0.18).contains(&mde_applied));
        assert!(result.pre_correlation > 0.5);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 256,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/batch_runs.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn summary_counts_partition_the_batch(
        base_seed in any::<u64>(),
        include_confounders in any::<bool>(),
        post_period_days in 14usize..=30,
    ) {
        let config = BatchConfig {
            num_experiments: 2,
            post_period_days,
            include_confounders,
            base_seed,
            ..BatchConfig::default()
        };
        let report = BatchRunner::new(config)
            .expect("valid config")
            .run(&FlatMeanPredictor, None)
            .expect("batch runs");
        let summary = &report.summary;
        prop_assert_eq!(summary.total, 4);
        prop_assert_eq!(summary.completed + summary.failed, summary.total);
        let buckets = &summary.significance;
        prop_assert_eq!(
            buckets.significant + buckets.marginal + buckets.not_significant + buckets.errors,
            summary.total
        );
        prop_assert!(summary.winners <= summary.completed);
        for result in &report.results {
            prop_assert_ne!(&result.test_market, &result.control_market);
            prop_assert!(result.confounders.len() <= 1);
            if !include_confounders {
                prop_assert!(result.confounders.is_empty());
            }
        }
    }
}
