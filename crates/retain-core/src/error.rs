use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidCapacity,
    ConfigParseError,
    HistoryParseError,
    UnresolvedRelease,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCapacity => "E1001",
            Self::ConfigParseError => "E1002",
            Self::HistoryParseError => "E2001",
            Self::UnresolvedRelease => "E9002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidCapacity => "Invalid releases-to-keep value",
            Self::ConfigParseError => "Config file parse error",
            Self::HistoryParseError => "Deployment history parse error",
            Self::UnresolvedRelease => "Retained release could not be resolved",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidCapacity => Some("Pass a releases-to-keep value of at least 1."),
            Self::ConfigParseError => Some("Fix syntax in retain.toml and retry."),
            Self::HistoryParseError => {
                Some("Provide a JSON object with projects, environments, releases and deployments.")
            }
            Self::UnresolvedRelease => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the retention engine.
///
/// Dangling references in the deployment history are not errors; they are
/// filtered during replay. Only a bad capacity and a broken internal
/// invariant reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetentionError {
    /// Capacity must be at least one release per group.
    #[error("releases to keep must be at least 1, got {requested}")]
    InvalidCapacity { requested: i64 },

    /// A release admitted into a tracker is missing from the release table.
    #[error("retained release '{release_id}' does not resolve to a known release")]
    UnresolvedRelease { release_id: String },
}

impl RetentionError {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidCapacity { .. } => ErrorCode::InvalidCapacity,
            Self::UnresolvedRelease { .. } => ErrorCode::UnresolvedRelease,
        }
    }

    /// Remediation text suitable for CLI output.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .unwrap_or_else(|| self.error_code().message())
            .to_string()
    }
}
