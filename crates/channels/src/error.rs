use std::error::Error as StdError;

/// Crate-wide result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categorized gateway errors.
///
/// Callers branch on [`Error::is_access_denied`] and [`Error::is_not_found`];
/// every other failure is treated as generic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform refused the call (HTTP 403): the bot lost access.
    #[error("access denied: {context}")]
    AccessDenied { context: String },

    /// The target does not exist (HTTP 404).
    #[error("not found: {context}")]
    NotFound { context: String },

    /// Any other non-success status.
    #[error("{context} returned HTTP {status}: {body}")]
    Status {
        status: u16,
        context: String,
        body: String,
    },

    /// Input payload or parameter is invalid.
    #[error("invalid gateway input: {message}")]
    InvalidInput { message: String },

    /// Wrapped source error from the transport.
    #[error("gateway call failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    /// Map an HTTP status onto the error taxonomy.
    #[must_use]
    pub fn from_status(status: u16, context: impl Into<String>, body: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            403 => Self::AccessDenied { context },
            404 => Self::NotFound { context },
            _ => Self::Status {
                status,
                context,
                body: body.into(),
            },
        }
    }

    #[must_use]
    pub fn access_denied(context: impl Into<String>) -> Self {
        Self::AccessDenied {
            context: context.into(),
        }
    }

    #[must_use]
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::NotFound {
            context: context.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses() {
        assert!(Error::from_status(403, "delete channel", "").is_access_denied());
        assert!(Error::from_status(404, "get channel", "").is_not_found());

        let other = Error::from_status(502, "get messages", "bad gateway");
        assert!(!other.is_access_denied() && !other.is_not_found());
        assert_eq!(
            other.to_string(),
            "get messages returned HTTP 502: bad gateway"
        );
    }
}
