use camino::Utf8PathBuf;
use synthflow_types::project::{ProjectRecord, ProjectState};
use synthflow_types::report::RunReport;
use synthflow_types::snapshot::RunSnapshot;
use synthflow_types::version::{BumpLevel, VersionTag};

#[test]
fn project_state_serializes_snake_case() {
    let skipped = serde_json::to_value(ProjectState::Skipped).expect("serialize");
    let launch = serde_json::to_value(ProjectState::ErrorLaunch).expect("serialize");
    let build = serde_json::to_value(ProjectState::ErrorBuild).expect("serialize");

    assert_eq!(skipped, serde_json::json!("skipped"));
    assert_eq!(launch, serde_json::json!("error_launch"));
    assert_eq!(build, serde_json::json!("error_build"));
}

#[test]
fn snapshot_roundtrips_with_fingerprints_and_version_state() {
    let mut snapshot = RunSnapshot::new(
        42,
        "feature/adc",
        "master",
        BumpLevel::Minor,
        VersionTag::official(1, 3, 0).with_origin(42),
        "2024-05-01T12:00:00Z".to_string(),
    );
    let mut record = ProjectRecord::new("process_fpga", Utf8PathBuf::from("process_fpga"));
    record.state = ProjectState::Success;
    record.fingerprint_before = Some("ab12cd3".to_string());
    record.fingerprint_after = Some("ef45ab6".to_string());
    snapshot.projects.push(record);
    snapshot.report_md = "# report".to_string();

    let json = serde_json::to_string_pretty(&snapshot).expect("serialize snapshot");
    let restored: RunSnapshot = serde_json::from_str(&json).expect("parse snapshot");

    assert_eq!(restored.schema, "synthflow.run.v1");
    assert_eq!(restored.request_id, 42);
    assert_eq!(restored.bump_level, BumpLevel::Minor);
    assert_eq!(restored.tag, snapshot.tag);
    assert_eq!(restored.projects.len(), 1);
    assert_eq!(
        restored.projects[0].fingerprint_before.as_deref(),
        Some("ab12cd3")
    );
    assert_eq!(
        restored.projects[0].fingerprint_after.as_deref(),
        Some("ef45ab6")
    );
    assert_eq!(restored.report_md, "# report");
}

#[test]
fn snapshot_tolerates_future_optional_fields() {
    // Older writers may omit report_md; unknown fields are ignored.
    let json = r#"{
        "schema": "synthflow.run.v1",
        "request_id": 7,
        "source_branch": "fix/clk",
        "target_branch": "master",
        "bump_level": "patch",
        "tag": { "major": 0, "minor": 2, "patch": 1, "trial": 0, "origin": 7 },
        "projects": [],
        "created_at": "2024-05-01T12:00:00Z",
        "some_future_field": true
    }"#;
    let snapshot: RunSnapshot = serde_json::from_str(json).expect("parse");
    assert_eq!(snapshot.report_md, "");
    assert_eq!(snapshot.tag.origin, Some(7));
}

#[test]
fn report_omits_empty_collections() {
    let report = RunReport::new(9, "src", "master", "now".to_string());
    let value = serde_json::to_value(&report).expect("serialize");
    assert!(value.get("metrics").is_none());
    assert!(value.get("notes").is_none());
    assert!(value.get("tag").is_none());
}

#[test]
fn version_tag_json_shape() {
    let tag = VersionTag::official(1, 2, 3);
    let value = serde_json::to_value(&tag).expect("serialize");
    assert!(value.get("origin").is_none());

    let trial = tag.with_origin(5);
    let value = serde_json::to_value(&trial).expect("serialize");
    assert_eq!(value["origin"], serde_json::json!(5));
}
