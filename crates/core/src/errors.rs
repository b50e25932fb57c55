use crate::types::Category;

/// Result type alias for custodian operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for custodian operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value matched none of the recognized resource categories
    #[error("unsupported resource kind '{type_name}': {message}")]
    UnsupportedResourceKind { type_name: String, message: String },

    /// Registration attempted on a tracker that has been destroyed
    #[error("resource tracker '{tracker}' has been destroyed")]
    TrackerDestroyed { tracker: String },

    /// A single resource failed to dispose
    #[error("failed to dispose {category} resource: {message}")]
    Disposal {
        category: Category,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Configuration {
            message: format!("invalid tracker configuration: {error}"),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an unsupported resource kind error
    #[must_use]
    pub fn unsupported_resource_kind(
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::UnsupportedResourceKind {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a tracker destroyed error
    #[must_use]
    pub fn tracker_destroyed(tracker: impl Into<String>) -> Self {
        Error::TrackerDestroyed {
            tracker: tracker.into(),
        }
    }

    /// Create a disposal error
    #[must_use]
    pub fn disposal(category: Category, message: impl Into<String>) -> Self {
        Error::Disposal {
            category,
            message: message.into(),
            source: None,
        }
    }

    /// Create a disposal error with a source error
    #[must_use]
    pub fn disposal_with_source(
        category: Category,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Disposal {
            category,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Category of the resource that failed, for disposal errors
    pub fn category(&self) -> Option<Category> {
        match self {
            Error::Disposal { category, .. } => Some(*category),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let err = Error::unsupported_resource_kind("u32", "not a disposable resource");
        assert_eq!(
            err.to_string(),
            "unsupported resource kind 'u32': not a disposable resource"
        );

        let err = Error::tracker_destroyed("session");
        assert_eq!(
            err.to_string(),
            "resource tracker 'session' has been destroyed"
        );

        let err = Error::disposal(Category::Subscription, "already closed");
        assert_eq!(
            err.to_string(),
            "failed to dispose subscription resource: already closed"
        );
    }

    #[test]
    fn test_disposal_error_keeps_source() {
        let err = Error::disposal_with_source(
            Category::Object,
            "destroy returned an error",
            anyhow::anyhow!("device lost"),
        );

        assert_eq!(err.category(), Some(Category::Object));
        let source = err.source().expect("source should be kept");
        assert_eq!(source.to_string(), "device lost");
    }

    #[test]
    fn test_category_only_for_disposal() {
        assert_eq!(Error::configuration("bad").category(), None);
        assert_eq!(Error::tracker_destroyed("t").category(), None);
    }
}
