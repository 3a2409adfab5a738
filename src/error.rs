use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while syncing a single addon.
///
/// None of these abort the batch: the orchestrator reports them next to the
/// addon name and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to download project metadata for addon={addon}: {source}")]
    MetadataTransport {
        addon: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download project metadata for addon={addon}, status={status}")]
    MetadataStatus { addon: String, status: u16 },

    #[error(
        "project metadata for addon={addon} is not cached yet, a fetch has been queued. retry later"
    )]
    MetadataQueued { addon: String },

    #[error("{addon} has invalid metadata: {reason}")]
    Validation { addon: String, reason: String },

    #[error("did not find a released version of addon={addon} for game version={game_version}")]
    NoEligibleRelease { addon: String, game_version: String },

    #[error("failed to parse uploaded_at={value} for file id={file_id} name={file_name}: {source}")]
    Timestamp {
        file_id: u64,
        file_name: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("failed to download {url}: {source}")]
    DownloadTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("status code was not 200 at download URL {url}, status code was {status}{}", body_suffix(.body))]
    DownloadStatus {
        url: String,
        status: u16,
        body: Option<String>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{}: illegal file path in archive entry '{entry}'", .path.display())]
    PathTraversal { entry: String, path: PathBuf },

    #[error("failed to delete archive {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SyncError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        SyncError::Json {
            context: context.into(),
            source,
        }
    }

    /// True for the 202 "queued" answer, which only a later run can fix.
    pub fn is_retry_later(&self) -> bool {
        matches!(self, SyncError::MetadataQueued { .. })
    }
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(b) if !b.trim().is_empty() => format!(", body was: {}", b.trim()),
        _ => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
