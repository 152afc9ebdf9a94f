//! End-to-end phase scenarios against a scripted source and a temp dataset.

mod common;

use common::*;
use labormap_core::data::{Dataset, DatasetStore, LatestValues, Metric, MetricRecord};
use labormap_core::{Orchestrator, Phase, PhaseOutcome, PipelineConfig, PipelineError, Region};
use std::fs;
use std::path::Path;

const NULL_WAGE: [&str; 2] = ["VT", "WY"];

fn full_record(i: usize, with_wage: bool) -> MetricRecord {
    MetricRecord {
        unemployment_rate: Some(3.0 + i as f64 / 10.0),
        swdev_wage: with_wage.then(|| 100_000.0 + i as f64 * 1000.0),
        ..MetricRecord::default()
    }
}

/// 47 regions fully populated, VT and WY with a null wage.
fn prior_dataset() -> Dataset {
    let mut ds = Dataset::new();
    for (i, r) in Region::all().iter().enumerate() {
        let with_wage = !NULL_WAGE.contains(&r.postal());
        ds.insert(r.postal(), full_record(i, with_wage));
    }
    ds
}

fn seeded_store(dir: &Path, mirror: bool) -> DatasetStore {
    let mirror_dir = dir.join("web");
    if mirror {
        fs::create_dir_all(&mirror_dir).unwrap();
    }
    let store = DatasetStore::new(dir.join("data/labor_stats.json"), Some(mirror_dir));
    store.persist(&prior_dataset()).unwrap();
    store
}

fn wage_values_for_all() -> LatestValues {
    Region::all()
        .iter()
        .enumerate()
        .map(|(i, r)| (wage_id(r.postal(), "04"), 100_000.0 + i as f64 * 1000.0))
        .collect()
}

#[test]
fn primary_fetch_fills_the_two_null_regions() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let config = PipelineConfig::default();
    let source = ScriptedSource::new(wage_values_for_all());

    let summary = Orchestrator::new(&source, &store, &config)
        .run(&[Phase::Wage])
        .unwrap();

    let ds = store.load().unwrap();
    let coverage = ds.coverage(Metric::SoftwareDeveloperWage);
    assert_eq!(coverage.populated, 49);
    assert!(coverage.is_complete());

    let prior = prior_dataset();
    for r in Region::all() {
        assert_eq!(
            ds.get(r.postal()).unwrap().unemployment_rate,
            prior.get(r.postal()).unwrap().unemployment_rate,
            "unemployment changed for {r}"
        );
    }

    // Everything resolved by the primary tier; no fallback requests.
    assert_eq!(source.call_count(), 1);
    match summary.outcome(Phase::Wage).unwrap() {
        PhaseOutcome::Updated {
            resolved,
            via_fallback,
            unresolved,
            ..
        } => {
            assert_eq!(*resolved, 49);
            assert_eq!(*via_fallback, 0);
            assert!(unresolved.is_empty());
        }
        other => panic!("expected Updated, got {other:?}"),
    }
}

#[test]
fn quota_on_primary_leaves_dataset_byte_identical_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let before = fs::read(store.path()).unwrap();
    let config = PipelineConfig::default();
    let source = ScriptedSource::new(wage_values_for_all()).failing_on(1, quota(), true);

    let summary = Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap();

    assert_eq!(fs::read(store.path()).unwrap(), before);
    assert_eq!(summary.phases.len(), 2);
    assert!(matches!(
        summary.outcome(Phase::Wage),
        Some(PhaseOutcome::PreservedOnQuota { .. })
    ));
    assert!(matches!(
        summary.outcome(Phase::Unemployment),
        Some(PhaseOutcome::PreservedOnQuota { .. })
    ));
    assert!(summary.hit_quota());
}

#[test]
fn quota_in_wage_phase_does_not_block_unemployment_phase() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let config = PipelineConfig::default();

    let mut values = LatestValues::new();
    values.insert(unemployment_id("CA"), 5.4);
    let source = ScriptedSource::new(values).failing_on(1, quota(), false);

    Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap();

    let ds = store.load().unwrap();
    let prior = prior_dataset();
    let ca = ds.get("CA").unwrap();
    assert_eq!(ca.unemployment_rate, Some(5.4));
    assert_eq!(ca.swdev_wage, prior.get("CA").unwrap().swdev_wage);
    for r in Region::all() {
        assert_eq!(
            ds.get(r.postal()).unwrap().swdev_wage,
            prior.get(r.postal()).unwrap().swdev_wage
        );
    }
}

#[test]
fn quota_refreshes_mirror_with_existing_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), true);
    let mirror = store.mirror_path().unwrap();
    fs::write(&mirror, "stale").unwrap();

    let config = PipelineConfig::default();
    let source = ScriptedSource::new(LatestValues::new()).failing_on(1, quota(), true);
    let outcome = Orchestrator::new(&source, &store, &config)
        .run_phase(Phase::Wage)
        .unwrap();

    match outcome {
        PhaseOutcome::PreservedOnQuota { mirrored_to, .. } => {
            assert_eq!(mirrored_to.as_deref(), Some(mirror.as_path()))
        }
        other => panic!("expected PreservedOnQuota, got {other:?}"),
    }
    assert_eq!(fs::read(&mirror).unwrap(), fs::read(store.path()).unwrap());
}

#[test]
fn api_failure_in_first_phase_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let before = fs::read(store.path()).unwrap();
    let config = PipelineConfig::default();
    let source = ScriptedSource::new(wage_values_for_all()).failing_on(1, api_failure(), false);

    let err = Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap_err();

    match err {
        PipelineError::Fetch { phase, source } => {
            assert_eq!(phase, Phase::Wage);
            assert!(!source.is_quota());
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
    assert_eq!(fs::read(store.path()).unwrap(), before);
    // The unemployment phase never ran.
    assert_eq!(source.call_count(), 1);
}

#[test]
fn api_failure_in_second_phase_keeps_first_phase_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let config = PipelineConfig::default();
    let mut values = wage_values_for_all();
    values.insert(wage_id("VT", "04"), 88_000.0);
    let source = ScriptedSource::new(values).failing_on(2, api_failure(), false);

    let err = Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Fetch {
            phase: Phase::Unemployment,
            ..
        }
    ));

    let ds = store.load().unwrap();
    assert_eq!(ds.get("VT").unwrap().swdev_wage, Some(88_000.0));
}

#[test]
fn hourly_fallback_is_annualized() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("stats.json"), None);
    let config = PipelineConfig::default();

    let mut values = wage_values_for_all();
    values.remove(&wage_id("TX", "04"));
    values.insert(wage_id("TX", "03"), 72.0);
    let source = ScriptedSource::new(values);

    let outcome = Orchestrator::new(&source, &store, &config)
        .run_phase(Phase::Wage)
        .unwrap();

    assert_eq!(store.load().unwrap().get("TX").unwrap().swdev_wage, Some(149_760.0));
    assert!(matches!(outcome, PhaseOutcome::Updated { via_fallback: 1, .. }));
    // The fallback tier only asked for the one missing region.
    let calls = source.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], vec![wage_id("TX", "03")]);
}

#[test]
fn unresolved_region_stays_explicit_null() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("stats.json"), None);
    let config = PipelineConfig::default();

    let mut values = wage_values_for_all();
    values.remove(&wage_id("NV", "04"));
    let source = ScriptedSource::new(values);

    let outcome = Orchestrator::new(&source, &store, &config)
        .run_phase(Phase::Wage)
        .unwrap();
    match outcome {
        PhaseOutcome::Updated { unresolved, .. } => assert_eq!(unresolved, vec![region("NV")]),
        other => panic!("expected Updated, got {other:?}"),
    }

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    let nv = raw.get("NV").expect("NV present");
    assert!(nv.get("swdev_wage").expect("field present").is_null());
    assert!(nv.get("unemployment_rate").expect("field present").is_null());
}

#[test]
fn quota_during_fallback_keeps_primary_results() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("stats.json"), None);
    let config = PipelineConfig::default();

    let mut values = wage_values_for_all();
    values.remove(&wage_id("TX", "04"));
    let source = ScriptedSource::new(values).failing_on(2, quota(), true);

    let outcome = Orchestrator::new(&source, &store, &config)
        .run_phase(Phase::Wage)
        .unwrap();

    assert!(outcome.hit_quota());
    assert!(matches!(outcome, PhaseOutcome::Updated { resolved: 48, .. }));
    let ds = store.load().unwrap();
    assert_eq!(ds.coverage(Metric::SoftwareDeveloperWage).populated, 48);
    assert_eq!(ds.get("TX").unwrap().swdev_wage, None);
}

#[test]
fn corrupt_dataset_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    fs::write(&path, "{\"CA\": ").unwrap();
    let store = DatasetStore::new(&path, None);
    let config = PipelineConfig::default();
    let source = ScriptedSource::new(wage_values_for_all());

    let err = Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Dataset(_)));
    assert_eq!(source.call_count(), 0);
}

#[test]
fn repeating_a_phase_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let config = PipelineConfig::default();
    let source = ScriptedSource::new(wage_values_for_all());
    let orch = Orchestrator::new(&source, &store, &config);

    orch.run_phase(Phase::Wage).unwrap();
    let once = fs::read(store.path()).unwrap();
    orch.run_phase(Phase::Wage).unwrap();
    assert_eq!(fs::read(store.path()).unwrap(), once);
}

#[test]
fn small_batches_cover_all_regions() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("stats.json"), None);
    let config = PipelineConfig::default();
    let mut source = ScriptedSource::new(wage_values_for_all());
    source.batch_limit = 25;

    Orchestrator::new(&source, &store, &config)
        .run_phase(Phase::Wage)
        .unwrap();

    let sizes: Vec<usize> = source.calls.borrow().iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![25, 24]);
    assert_eq!(
        store
            .load()
            .unwrap()
            .coverage(Metric::SoftwareDeveloperWage)
            .populated,
        49
    );
}

#[test]
fn invalid_config_is_rejected_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), false);
    let before = fs::read(store.path()).unwrap();
    let mut config = PipelineConfig::default();
    config.api.max_retries = 40;
    let source = ScriptedSource::new(wage_values_for_all());

    let err = Orchestrator::new(&source, &store, &config)
        .run(&Phase::ALL)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(source.call_count(), 0);
    assert_eq!(fs::read(store.path()).unwrap(), before);
}
