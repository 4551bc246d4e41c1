use thiserror::Error;

pub type AdServeResult<T> = Result<T, AdServeError>;

#[derive(Error, Debug)]
pub enum AdServeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error from {source_name}: {message}")]
    Fetch {
        source_name: &'static str,
        message: String,
    },

    #[error("Parse error from {source_name}: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },

    #[error("No eligible ads for publisher {0}")]
    EmptyWinnerSet(u64),

    #[error("Refresh cycle cancelled before publishing")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AdServeError {
    pub fn fetch(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name,
            message: message.into(),
        }
    }

    pub fn parse(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name,
            message: message.into(),
        }
    }

    /// Fetch and parse failures abort a refresh cycle but leave the active
    /// snapshot in place; everything else is a programming or startup error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Parse { .. })
    }
}
