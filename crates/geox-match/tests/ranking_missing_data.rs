// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::{MISSING, TimeSeries};
use geox_match::{CandidatePool, find_best_controls};

fn series(values: &[f64]) -> TimeSeries {
    TimeSeries::new(values.to_vec()).expect("non-empty series")
}

#[test]
fn fully_missing_candidate_ranks_after_complete_one() {
    let test = series(&[10.0, 12.0, 11.0, 13.0]);
    let mut pool = CandidatePool::new();
    pool.insert("all-missing", series(&[MISSING; 4]))
        .expect("insert");
    pool.insert("close", series(&[11.0, 13.0, 12.0, 14.0]))
        .expect("insert");

    let ranked = find_best_controls(&test, &pool, 2).expect("ranking succeeds");
    assert_eq!(ranked[0].name, "close");
    assert!((ranked[0].distance - 2.0).abs() < 1e-12);
    assert_eq!(ranked[1].name, "all-missing");
    assert_eq!(ranked[1].rank, 2);
    assert!(ranked[1].distance.is_nan());
}

#[test]
fn gappy_candidate_does_not_outrank_a_distant_complete_one() {
    let test = series(&[10.0, 12.0, 11.0, 13.0, 12.0, 14.0]);
    let mut pool = CandidatePool::new();
    pool.insert("gappy", series(&[10.0, MISSING, 11.0, MISSING, 12.0, 14.0]))
        .expect("insert");
    pool.insert("offset", series(&[15.0, 17.0, 16.0, 18.0, 17.0, 19.0]))
        .expect("insert");

    let ranked = find_best_controls(&test, &pool, 1).expect("ranking succeeds");
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].name, "offset");
    assert!(ranked[0].distance.is_finite());
}
