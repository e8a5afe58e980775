use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, ClipError>;

/// Coarse failure category, stable across error variants.
///
/// UI callers switch on this to pick a message; the variant carries detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Resolution,
    Network,
    Parse,
    Transcode,
    NotFound,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("`{tool}` could not be started: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("no playable stream resolved: {reason}")]
    Resolution { reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("transcode failed: {reason}")]
    Transcode { reason: String },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("I/O error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ClipError {
    pub fn tool_unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn resolution(reason: impl Into<String>) -> Self {
        Self::Resolution {
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub fn transcode(reason: impl Into<String>) -> Self {
        Self::Transcode {
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convert an IO error into a [`ClipError`] with operation + path context.
    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The external resolver or transcoder binary is missing or not executable.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. })
    }

    /// Any failure to turn a source id into a playable location.
    pub fn is_resolution_failure(&self) -> bool {
        self.kind() == FailureKind::Resolution
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ToolUnavailable { .. } | Self::Resolution { .. } => FailureKind::Resolution,
            Self::Network { .. } | Self::HttpStatus { .. } => FailureKind::Network,
            Self::Parse { .. } | Self::Json { .. } => FailureKind::Parse,
            Self::Transcode { .. } => FailureKind::Transcode,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::InvalidRequest { .. } | Self::Io { .. } | Self::Configuration { .. } => {
                FailureKind::Other
            }
        }
    }
}

impl From<mp4::SidxError> for ClipError {
    fn from(err: mp4::SidxError) -> Self {
        Self::parse(err.to_string())
    }
}
