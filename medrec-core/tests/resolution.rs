//! Identity-resolution behavior against fake sources.

mod common;

use std::sync::Arc;

use common::{registry_from_lines, row, FakePools, FakeSource};
use medrec_core::{resolve_identity, MedrecError, RecordService};

const HOSP_A: &str = r#"{"source_name":"hospA","schema_mapping":{"table":"patients","columns":{"patient_id":"pid","patient_name":"pname"}}}"#;
const HOSP_B_INCOMPLETE: &str = r#"{"source_name":"hospB","schema_mapping":{"table":"patients","columns":{"patient_id":"pid"}}}"#;
const HOSP_C: &str = r#"{"source_name":"hospC","schema_mapping":{"table":"roster","columns":{"patient_id":"person_id","patient_name":"full_name"}}}"#;

#[tokio::test]
async fn no_inputs_is_a_validation_error() {
    let registry = registry_from_lines(&[HOSP_A]);
    let pools = FakePools::default();

    let err = resolve_identity(&registry, &pools, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MedrecError::NoIdentity));
}

#[tokio::test]
async fn zero_matches_is_none_not_an_error() {
    let registry = registry_from_lines(&[HOSP_A]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").with_table("patients", vec![]));

    let result = resolve_identity(&registry, &pools, Some("does-not-exist"), None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn incomplete_mapping_source_is_never_probed() {
    let registry = registry_from_lines(&[HOSP_A, HOSP_B_INCOMPLETE]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").with_table(
        "patients",
        vec![row(&[("pid", "123"), ("pname", "Ada Lovelace")])],
    ));
    let hosp_b = pools.add(
        FakeSource::new("hospB").with_table("patients", vec![row(&[("pid", "123")])]),
    );

    let mapping = resolve_identity(&registry, &pools, Some("123"), None)
        .await
        .unwrap()
        .expect("hospA should match");

    assert_eq!(mapping.len(), 1);
    assert!(mapping.contains_key("hospA"));
    assert!(hosp_b.captured_queries().is_empty());
}

#[tokio::test]
async fn mapping_records_the_sources_own_identifier() {
    let registry = registry_from_lines(&[HOSP_A]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").with_table(
        "patients",
        vec![row(&[("pid", "A-99"), ("pname", "Ada Lovelace")])],
    ));

    // Caller supplies only the name; the mapped value must be the source's
    // identifier column, not the input.
    let mapping = resolve_identity(&registry, &pools, None, Some("Ada Lovelace"))
        .await
        .unwrap()
        .expect("name should match");

    assert_eq!(mapping.get("hospA").map(String::as_str), Some("A-99"));
}

#[tokio::test]
async fn predicate_shape_follows_supplied_inputs() {
    let registry = registry_from_lines(&[HOSP_A]);
    let mut pools = FakePools::default();
    let hosp_a = pools.add(FakeSource::new("hospA").with_table(
        "patients",
        vec![row(&[("pid", "123"), ("pname", "Ada Lovelace")])],
    ));

    resolve_identity(&registry, &pools, Some("123"), None)
        .await
        .unwrap();
    resolve_identity(&registry, &pools, Some("123"), Some("Ada Lovelace"))
        .await
        .unwrap();

    let queries = hosp_a.captured_queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("WHERE `pid` = ? LIMIT 1"));
    assert!(!queries[0].contains(" OR "));
    assert!(queries[1].contains("WHERE `pid` = ? OR `pname` = ? LIMIT 1"));
}

#[tokio::test]
async fn source_without_pool_is_skipped() {
    let registry = registry_from_lines(&[HOSP_A, HOSP_C]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").with_table(
        "patients",
        vec![row(&[("pid", "123"), ("pname", "Ada Lovelace")])],
    ));
    // hospC has a usable mapping but no pool was ever created for it.

    let mapping = resolve_identity(&registry, &pools, Some("123"), None)
        .await
        .unwrap()
        .expect("hospA should match");

    assert_eq!(mapping.len(), 1);
    assert!(!mapping.contains_key("hospC"));
}

#[tokio::test]
async fn one_failing_source_does_not_block_the_others() {
    let registry = registry_from_lines(&[HOSP_A, HOSP_C]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").failing());
    pools.add(FakeSource::new("hospC").with_table(
        "roster",
        vec![row(&[("person_id", "C-7"), ("full_name", "Ada Lovelace")])],
    ));

    let mapping = resolve_identity(&registry, &pools, None, Some("Ada Lovelace"))
        .await
        .unwrap()
        .expect("hospC should still match");

    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping.get("hospC").map(String::as_str), Some("C-7"));
}

#[tokio::test]
async fn service_surfaces_none_when_nothing_matches() {
    let registry = registry_from_lines(&[HOSP_A]);
    let mut pools = FakePools::default();
    pools.add(FakeSource::new("hospA").with_table("patients", vec![]));

    let service = RecordService::new(registry, Arc::new(pools));
    let report = service
        .fetch_patient_records(Some("nobody"), None)
        .await
        .unwrap();
    assert!(report.is_none());
}
