use std::error::Error as StdError;

use aggregator_common::{FromMessage, MediaId};

/// Coarse classification of [`Error`], stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Io,
    Fetch,
    UpstreamRejection,
    AllStrategiesExhausted,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Parse => "parse",
            Self::Io => "io",
            Self::Fetch => "fetch",
            Self::UpstreamRejection => "upstream_rejection",
            Self::AllStrategiesExhausted => "exhausted",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("image #{id} does not exist")]
    NotFound { id: MediaId },
    #[error("malformed image source: {reason}")]
    Parse { reason: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    /// Timeout, transport failure, non-2xx status, or empty body.
    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },
    /// The media library refused to create the attachment.
    #[error("{message}")]
    UpstreamRejection { message: String },
    #[error("all image download attempts failed")]
    AllStrategiesExhausted { failures: Vec<StrategyFailure> },
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("{message}")]
    Message { message: String },
}

/// One failed link of the download chain.
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub error: Error,
}

impl Error {
    #[must_use]
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            status: None,
            message: message.into(),
        }
    }

    /// A response arrived but was not usable.
    #[must_use]
    pub fn blocked(status: u16) -> Self {
        Self::Fetch {
            status: Some(status),
            message: format!("image blocked by remote host (HTTP {status})"),
        }
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamRejection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io { .. } => ErrorKind::Io,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::UpstreamRejection { .. } => ErrorKind::UpstreamRejection,
            Self::AllStrategiesExhausted { .. } => ErrorKind::AllStrategiesExhausted,
            Self::External { .. } | Self::Message { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status observed by a failed fetch, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

aggregator_common::impl_context!();
