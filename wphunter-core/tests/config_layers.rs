//! Layer precedence for configuration loading: defaults < file < env < explicit.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use wphunter_core::{ConfigError, EnvSource, Loader, Overrides, RuntimeConfig};

fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("wphunter.config.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

const FILE_LAYER: &str = r#"
targets:
  - https://file-one.test
  - https://file-two.test
mode: stealthy
threads: 4
outputDir: file-results
formats: [json]
detectors: []
dryRun: true
summaryFile: file-summary.json
"#;

#[test]
fn test_file_layer_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FILE_LAYER);

    let cfg = Loader::new(path)
        .with_env(EnvSource::fixed(Vec::<(String, String)>::new()))
        .load(&Overrides::default())
        .unwrap();

    assert_eq!(
        cfg,
        RuntimeConfig {
            targets: strings(&["https://file-one.test", "https://file-two.test"]),
            mode: "stealthy".into(),
            threads: 4,
            output_dir: PathBuf::from("file-results"),
            formats: strings(&["json"]),
            detectors: vec![],
            dry_run: true,
            summary_file: Some(PathBuf::from("file-summary.json")),
        }
    );
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_env_overrides_file_only_where_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FILE_LAYER);
    let env = EnvSource::fixed([
        ("WPHUNTER_THREADS", "12"),
        ("WORKER_MODE", "bruteforce"),
        ("WORKER_DRY_RUN", "false"),
    ]);

    let cfg = Loader::new(path).with_env(env).load(&Overrides::default()).unwrap();

    assert_eq!(cfg.threads, 12);
    assert_eq!(cfg.mode, "bruteforce");
    assert!(!cfg.dry_run);
    // Untouched by env, so the file value survives.
    assert_eq!(cfg.output_dir, PathBuf::from("file-results"));
    assert_eq!(cfg.formats, strings(&["json"]));
}

#[test]
fn test_explicit_overrides_win_over_env_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FILE_LAYER);
    let env = EnvSource::fixed([
        ("WPHUNTER_THREADS", "12"),
        ("WPHUNTER_FORMATS", "csv"),
        ("WPHUNTER_TARGETS", "https://env.test"),
    ]);
    let explicit = Overrides {
        threads: Some(1),
        dry_run: Some(false),
        detectors: Some(strings(&["version"])),
        ..Overrides::default()
    };

    let cfg = Loader::new(path).with_env(env).load(&explicit).unwrap();

    assert_eq!(cfg.threads, 1);
    assert!(!cfg.dry_run);
    assert_eq!(cfg.detectors, strings(&["version"]));
    assert_eq!(cfg.formats, strings(&["csv"]));
    assert_eq!(cfg.targets, strings(&["https://env.test"]));
    assert_eq!(cfg.mode, "stealthy");
}

#[test]
fn test_explicit_zero_threads_is_kept_and_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FILE_LAYER);
    let explicit = Overrides {
        threads: Some(0),
        ..Overrides::default()
    };

    let cfg = Loader::new(path)
        .with_env(EnvSource::fixed([("WPHUNTER_THREADS", "8")]))
        .load(&explicit)
        .unwrap();

    assert_eq!(cfg.threads, 0);
    assert_eq!(
        cfg.validate().unwrap_err().to_string(),
        "threads must be between 1 and 64 (got 0)"
    );
}

#[test]
fn test_file_targets_file_replaces_file_inline_targets() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("targets.txt");
    std::fs::write(&list, "# from file\nhttps://listed.test\n").unwrap();
    let yaml = format!(
        "targets: https://inline.test\ntargetsFile: {}\n",
        list.display()
    );
    let path = write_config(dir.path(), &yaml);

    let cfg = Loader::new(path)
        .with_env(EnvSource::fixed(Vec::<(String, String)>::new()))
        .load(&Overrides::default())
        .unwrap();

    assert_eq!(cfg.targets, strings(&["https://listed.test"]));
}

#[test]
fn test_traversing_targets_file_in_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "targetsFile: ../../outside.txt\n");

    let err = Loader::new(path)
        .with_env(EnvSource::fixed(Vec::<(String, String)>::new()))
        .load(&Overrides::default())
        .unwrap_err();

    assert!(matches!(err, ConfigError::Targets(_)));
}
