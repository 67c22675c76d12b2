//! Event extraction and trial recoding over a realistic session layout.

mod common;

use gonogo_erp::events::{assign_codes, recode, Condition};
use gonogo_erp::{PipelineError, Recording};
use ndarray::Array2;

/// Recording with only a stimulus track carrying the given pulses.
fn recording_with_events(events: &[(usize, i32)]) -> Recording {
    let n_t = events.iter().map(|&(s, _)| s).max().unwrap_or(0) + 100;
    let mut data = Array2::<f32>::zeros((2, n_t));
    for &(sample, code) in events {
        data[[1, sample]] = code as f32;
    }
    Recording::new(data, common::SFREQ, vec!["E1".into(), "STI 014".into()]).unwrap()
}

#[test]
fn session_recodes_into_expected_trial_counts() {
    let rec = recording_with_events(&common::session_events(10, 8, 2));
    let events = rec.find_events("STI 014").unwrap();
    assert_eq!(events.len(), 10 + 10 + 12); // stimuli + responses

    let recoded = recode(&events).unwrap();
    assert_eq!(recoded.count(Condition::GoCorrect), 10);
    assert_eq!(recoded.count(Condition::NogoCorrect), 8);
    assert_eq!(recoded.count(Condition::NogoIncorrect), 2);
    assert_eq!(recoded.defined_conditions().len(), 3);
}

#[test]
fn session_without_commission_errors_narrows_the_vocabulary() {
    let rec = recording_with_events(&common::session_events(10, 8, 0));
    let recoded = recode(&rec.find_events("STI 014").unwrap()).unwrap();
    assert_eq!(recoded.count(Condition::NogoIncorrect), 0);
    assert_eq!(
        recoded.defined_conditions(),
        vec![Condition::GoCorrect, Condition::NogoCorrect]
    );
}

#[test]
fn role_assignment_follows_frequency_rank() {
    let rec = recording_with_events(&common::session_events(10, 8, 2));
    let a = assign_codes(&rec.find_events("STI 014").unwrap()).unwrap();
    assert_eq!(a.response, common::RESPONSE); // 12 occurrences
    assert_eq!(a.go, common::GO); // 10, tie with nogo broken by code
    assert_eq!(a.nogo, common::NOGO);
    assert_eq!(a.pause, None);
}

#[test]
fn corrupt_stimulus_track_fails_classification() {
    // Five distinct codes on the stimulus channel.
    let events: Vec<(usize, i32)> =
        [(100, 1), (200, 1), (300, 2), (400, 3), (500, 4), (600, 5)].to_vec();
    let rec = recording_with_events(&events);
    match recode(&rec.find_events("STI 014").unwrap()) {
        Err(PipelineError::EventClassification { distinct }) => assert_eq!(distinct, 5),
        other => panic!("expected EventClassification, got {other:?}"),
    }
}
