/// Where an item got to, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Pending,
    Downloading,
    Uploading,
    Uploaded,
    Failed,
    Fatal,
}

impl LedgerState {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerState::Pending => "pending",
            LedgerState::Downloading => "downloading",
            LedgerState::Uploading => "uploading",
            LedgerState::Uploaded => "uploaded",
            LedgerState::Failed => "failed",
            LedgerState::Fatal => "fatal",
        }
    }

    /// Unknown strings map to `Failed` so a damaged row is retried, never skipped.
    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => LedgerState::Pending,
            "downloading" => LedgerState::Downloading,
            "uploading" => LedgerState::Uploading,
            "uploaded" => LedgerState::Uploaded,
            "fatal" => LedgerState::Fatal,
            _ => LedgerState::Failed,
        }
    }

    /// True while a run is working on the item.
    pub fn is_in_progress(self) -> bool {
        matches!(self, LedgerState::Downloading | LedgerState::Uploading)
    }
}

/// One ledger row.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub source_ref: String,
    pub filename: Option<String>,
    pub state: LedgerState,
    pub remote_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
