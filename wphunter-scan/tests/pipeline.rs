//! The scan pipeline end to end with the real wpprobe runner.

use std::path::Path;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wphunter_core::{Emitter, RuntimeConfig};
use wphunter_detect::DetectorRegistry;
use wphunter_scan::{ScanError, ScanOrchestrator, ToolError, WpprobeRunner};

fn event_types(emitter: Emitter<Vec<u8>>) -> Vec<String> {
    String::from_utf8(emitter.into_inner())
        .unwrap()
        .lines()
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["type"].as_str().unwrap().to_string()
        })
        .collect()
}

fn base_config(dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        targets: vec!["https://blog.example.test".into()],
        output_dir: dir.join("results"),
        detectors: vec![],
        ..RuntimeConfig::default()
    }
}

#[tokio::test]
async fn test_dry_run_needs_no_binary() {
    let dir = tempfile::tempdir().unwrap();
    let empty_path = tempfile::tempdir().unwrap();
    let cfg = RuntimeConfig {
        dry_run: true,
        detectors: vec!["version".into()],
        ..base_config(dir.path())
    };

    let runner = WpprobeRunner::new().with_search_path(empty_path.path());
    let registry = DetectorRegistry::with_builtins();
    let emitter = Emitter::new(Vec::new());

    let outcome = ScanOrchestrator::new(&runner, &registry, &emitter)
        .run(&cfg, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 2);
    for artifact in &outcome.artifacts {
        assert!(artifact.starts_with(dir.path().join("results")));
        assert!(artifact.is_file());
    }
    assert!(outcome.detections.is_empty());
    assert_eq!(
        event_types(emitter),
        vec![
            "scan-start",
            "artifact-written",
            "artifact-written",
            "detectors-skipped",
            "scan-finished"
        ]
    );
}

#[tokio::test]
async fn test_live_run_without_binary_fails() {
    let dir = tempfile::tempdir().unwrap();
    let empty_path = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path());

    let runner = WpprobeRunner::new().with_search_path(empty_path.path());
    let registry = DetectorRegistry::with_builtins();
    let emitter = Emitter::new(Vec::new());

    let err = ScanOrchestrator::new(&runner, &registry, &emitter)
        .run(&cfg, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Tool(ToolError::NotFound(_))));
    assert!(!err.is_config_error());
    // The output directory is prepared before the binary is checked.
    assert!(dir.path().join("results").is_dir());
}

#[cfg(unix)]
#[tokio::test]
async fn test_live_run_with_stub_binary() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let script = bin.path().join("wpprobe");
    // Copies the targets file into the requested output path.
    std::fs::write(&script, "#!/bin/sh\necho \"probing $3\" >&2\ncp \"$3\" \"$7\"\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let cfg = RuntimeConfig {
        formats: vec!["json".into()],
        summary_file: Some(dir.path().join("summary.json")),
        ..base_config(dir.path())
    };

    let runner = WpprobeRunner::new().with_search_path(bin.path());
    let registry = DetectorRegistry::with_builtins();
    let emitter = Emitter::new(Vec::new());

    let outcome = ScanOrchestrator::new(&runner, &registry, &emitter)
        .run(&cfg, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&outcome.artifacts[0]).unwrap(),
        "https://blog.example.test\n"
    );

    let summary: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["dryRun"], false);
    assert_eq!(summary["targets"][0], "https://blog.example.test");
    assert_eq!(
        event_types(emitter),
        vec!["scan-start", "artifact-written", "scan-finished"]
    );
}
