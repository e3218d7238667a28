use thiserror::Error;

/// Failure taxonomy for the core pipeline. External text-generation
/// failures never reach this enum; the advisory composer absorbs them.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("no administrative data loaded")]
    NoData,

    #[error("failed to parse ingestion payload: {0}")]
    Parse(String),

    #[error("no forecast models available")]
    ModelUnavailable,

    #[error("table store lock poisoned")]
    Lock,
}

impl PulseError {
    /// Error shape for the machine-readable (`--json`) command output.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }
}
