//! Aggregate statistics over a previously written scan artifact.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use wphunter_core::{Emitter, Event};

use crate::artifacts::generated_at;
use crate::error::ReportError;

const KEYWORD: &str = "vulnerability";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub input: PathBuf,
    pub size_bytes: u64,
    pub generated_at: String,
    /// Case-insensitive occurrences of "vulnerability".
    pub mentions: usize,
}

impl ReportStats {
    /// Emit the stats as a `report` event.
    pub fn emit<W: std::io::Write + Send>(&self, emitter: &Emitter<W>) -> Result<(), ReportError> {
        let fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let mut event = Event::new("report").with_message("Report generated");
        event.fields = fields;
        emitter.emit(event)?;
        Ok(())
    }
}

/// Read `input` and compute its stats.
pub async fn build_report(input: &Path) -> Result<ReportStats, ReportError> {
    let data = tokio::fs::read(input)
        .await
        .map_err(|source| ReportError::Read {
            path: input.to_path_buf(),
            source,
        })?;

    Ok(ReportStats {
        input: input.to_path_buf(),
        size_bytes: data.len() as u64,
        generated_at: generated_at(Utc::now()),
        mentions: count_mentions(&data),
    })
}

/// Non-overlapping occurrences of the keyword in the ASCII-lowercased bytes.
pub fn count_mentions(data: &[u8]) -> usize {
    let lowered = data.to_ascii_lowercase();
    let needle = KEYWORD.as_bytes();
    let mut count = 0;
    let mut rest = lowered.as_slice();
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

/// Write the stats as indented JSON, readable only by the owner on Unix.
pub async fn write_report_summary(path: &Path, stats: &ReportStats) -> Result<(), ReportError> {
    let mut content = serde_json::to_vec_pretty(stats)?;
    content.push(b'\n');

    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(write_err)?;
    file.write_all(&content).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)
}
