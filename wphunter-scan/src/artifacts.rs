//! Files written by a scan: the temporary targets list, dry-run
//! placeholders, detections, and the run summary.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tempfile::TempPath;
use wphunter_detect::DetectorResult;

use crate::error::ScanError;

/// Timestamp embedded in artifact file names.
pub fn artifact_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `generatedAt` value used in JSON artifacts.
pub fn generated_at(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `<dir>/scan_<ts>.<format>`
pub fn scan_artifact_path(dir: &Path, timestamp: &str, format: &str) -> PathBuf {
    dir.join(format!("scan_{timestamp}.{format}"))
}

/// `<dir>/detections_<ts>.json`
pub fn detections_path(dir: &Path, timestamp: &str) -> PathBuf {
    dir.join(format!("detections_{timestamp}.json"))
}

/// Write targets one per line into a fresh temporary file.
///
/// The file is deleted when the returned [`TempPath`] is dropped.
pub fn write_targets_file(targets: &[String]) -> Result<TempPath, ScanError> {
    let mut file = tempfile::Builder::new()
        .prefix("wphunter-targets-")
        .suffix(".txt")
        .tempfile()
        .map_err(ScanError::TempFile)?;
    for target in targets {
        writeln!(file, "{target}").map_err(ScanError::TempFile)?;
    }
    file.flush().map_err(ScanError::TempFile)?;
    Ok(file.into_temp_path())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Placeholder<'a> {
    generated_at: String,
    targets: &'a [String],
    note: &'static str,
}

/// Synthesize the artifact `wpprobe` would have written, for dry runs.
pub async fn write_placeholder(
    path: &Path,
    format: &str,
    targets: &[String],
    now: DateTime<Utc>,
) -> Result<(), ScanError> {
    let content = match format {
        "json" => {
            let placeholder = Placeholder {
                generated_at: generated_at(now),
                targets,
                note: "dry-run placeholder artifact",
            };
            pretty_json(&placeholder, "placeholder artifact")?
        }
        "csv" => {
            let mut csv = String::from("target,status\n");
            for target in targets {
                csv.push_str(target);
                csv.push_str(",placeholder\n");
            }
            csv.into_bytes()
        }
        other => return Err(ScanError::UnsupportedFormat(other.to_string())),
    };
    write_file(path, &content).await
}

/// Write detector results as an indented JSON array. An empty set is `[]`.
pub async fn write_detections(path: &Path, results: &[DetectorResult]) -> Result<(), ScanError> {
    let content = pretty_json(&results, "detections")?;
    write_file(path, &content).await
}

/// Everything a finished run reports in its summary file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary<'a> {
    pub generated_at: String,
    pub targets: &'a [String],
    pub mode: &'a str,
    pub artifacts: &'a [PathBuf],
    pub dry_run: bool,
    pub detectors: &'a [String],
    pub detections: &'a [DetectorResult],
}

pub async fn write_summary(path: &Path, summary: &ScanSummary<'_>) -> Result<(), ScanError> {
    let content = pretty_json(summary, "summary")?;
    write_file(path, &content).await
}

fn pretty_json<T: Serialize + ?Sized>(value: &T, what: &'static str) -> Result<Vec<u8>, ScanError> {
    let mut content = serde_json::to_vec_pretty(value)
        .map_err(|source| ScanError::Serialize { what, source })?;
    content.push(b'\n');
    Ok(content)
}

/// Write `content`, creating parent directories first.
async fn write_file(path: &Path, content: &[u8]) -> Result<(), ScanError> {
    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use wphunter_detect::Severity;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn targets() -> Vec<String> {
        vec!["https://one.test".into(), "https://two.test".into()]
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(artifact_timestamp(fixed_now()), "20240309_070501");
        assert_eq!(generated_at(fixed_now()), "2024-03-09T07:05:01Z");
        assert_eq!(
            scan_artifact_path(Path::new("out"), "20240309_070501", "csv"),
            PathBuf::from("out/scan_20240309_070501.csv")
        );
    }

    #[test]
    fn test_targets_file_is_removed_on_drop() {
        let temp = write_targets_file(&targets()).unwrap();
        let path = temp.to_path_buf();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://one.test\nhttps://two.test\n"
        );
        drop(temp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_json_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        write_placeholder(&path, "json", &targets(), fixed_now())
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "generatedAt": "2024-03-09T07:05:01Z",
                "targets": ["https://one.test", "https://two.test"],
                "note": "dry-run placeholder artifact",
            })
        );
    }

    #[tokio::test]
    async fn test_csv_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/scan.csv");
        write_placeholder(&path, "csv", &targets(), fixed_now())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "target,status\nhttps://one.test,placeholder\nhttps://two.test,placeholder\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_placeholder_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.xml");
        let err = write_placeholder(&path, "xml", &targets(), fixed_now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported format xml");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_detections_are_bracket_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/er/detections.json");
        write_detections(&path, &[]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"[]\n");
    }

    #[tokio::test]
    async fn test_detections_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.json");
        let mut metadata = BTreeMap::new();
        metadata.insert("version".to_string(), serde_json::Value::from("6.1"));
        let results = vec![DetectorResult {
            target: "https://one.test".into(),
            detector: "version".into(),
            severity: Severity::Info,
            summary: "WordPress version 6.1 detected".into(),
            metadata,
            confidence: 0.85,
        }];
        write_detections(&path, &results).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {"));
        let back: Vec<DetectorResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, results);
    }
}
