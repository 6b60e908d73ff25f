use crate::pubsub::{TriggerError, TriggerPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /runs`. The offset follows the trigger message rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    #[serde(flatten)]
    pub trigger: TriggerPayload,
    #[serde(default = "default_true")]
    pub publish_continuation: bool,
}

fn default_true() -> bool {
    true
}

impl RunRequest {
    pub fn offset(&self) -> Result<u64, TriggerError> {
        self.trigger.offset()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Reconciled,
    EndOfCatalog,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunReport {
    pub offset: u64,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
    #[serde(default)]
    pub continuation_published: bool,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn end_of_catalog(offset: u64, stages: Vec<StageReport>) -> Self {
        Self {
            offset,
            status: RunStatus::EndOfCatalog,
            template_id: None,
            next_offset: None,
            continuation_published: false,
            stages,
        }
    }

    pub fn reconciled(offset: u64, template_id: i64, stages: Vec<StageReport>) -> Self {
        Self {
            offset,
            status: RunStatus::Reconciled,
            template_id: Some(template_id),
            next_offset: offset.checked_add(1),
            continuation_published: false,
            stages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
