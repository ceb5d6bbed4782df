use thiserror::Error;

/// Classified failure of a cluster client call.
///
/// Checks branch on the variant rather than on the shape of the
/// underlying transport error, so every client implementation is
/// responsible for mapping its own errors into one of these kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The named resource does not exist
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// The acting identity may not perform the request
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Network failures, throttling and server-side errors
    #[error("transient cluster error: {0}")]
    Transient(String),

    /// Anything else
    #[error("cluster client error: {0}")]
    Other(String),
}

impl ClientError {
    /// Build a not-found error for a resource kind and name
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the same call later could plausibly succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Get error category as string
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "authorization",
            Self::Transient(_) => "transient",
            Self::Other(_) => "other",
        }
    }
}

/// Returned by a diagnostic's precondition gate when it cannot run.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct DiagnosticError {
    /// Stable message id, same namespace as finding codes
    pub id: String,
    pub message: String,
    #[source]
    pub cause: Option<ClientError>,
}

impl DiagnosticError {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ClientError) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// Failures loading settings or config files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid failure pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// A single structural problem found while validating a config file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
