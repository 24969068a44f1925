//! Detector interface and the finding type it produces.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::DetectError;

/// Severity label attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    pub target: String,
    pub detector: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Confidence in `[0, 1]`. Omitted from JSON when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub confidence: f64,
}

impl DetectorResult {
    /// Synthetic result recorded when a detector fails on a target.
    pub fn from_error(target: &str, detector: &str, err: &DetectError) -> Self {
        Self {
            target: target.to_string(),
            detector: detector.to_string(),
            severity: Severity::Info,
            summary: format!("detector error: {err}"),
            metadata: BTreeMap::new(),
            confidence: 0.0,
        }
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// A pluggable check run against a single target.
///
/// Implementations must not mutate shared state and must stop promptly once
/// `cancel` fires.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable identifier, also the registry key.
    fn name(&self) -> &str;

    /// Inspect one target.
    async fn detect(
        &self,
        cancel: &CancellationToken,
        target: &str,
    ) -> Result<DetectorResult, DetectError>;
}
