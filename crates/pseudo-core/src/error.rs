use std::ops::Range;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid span{}: {reason}", describe_range(.range))]
    InvalidSpan {
        range: Option<Range<usize>>,
        reason: String,
    },

    #[error(
        "Overlapping spans: {}..{} and {}..{}",
        .first.start, .first.end, .second.start, .second.end
    )]
    OverlappingSpans {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("Unknown token: {token}{}", describe_offset(.offset))]
    UnknownToken {
        token: String,
        offset: Option<usize>,
    },

    #[error("Missing binding for {{{marker}}} (slot {slot})")]
    MissingBinding { marker: String, slot: usize },

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Corrupt mapping table: {0}")]
    CorruptTable(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn invalid_span(range: Range<usize>, reason: impl Into<String>) -> Self {
        Self::InvalidSpan {
            range: Some(range),
            reason: reason.into(),
        }
    }

    /// Attach offsets to an `InvalidSpan` raised without them.
    pub fn at(self, range: Range<usize>) -> Self {
        match self {
            Self::InvalidSpan { range: None, reason } => Self::InvalidSpan {
                range: Some(range),
                reason,
            },
            other => other,
        }
    }
}

fn describe_range(range: &Option<Range<usize>>) -> String {
    match range {
        Some(r) => format!(" at {}..{}", r.start, r.end),
        None => String::new(),
    }
}

fn describe_offset(offset: &Option<usize>) -> String {
    match offset {
        Some(o) => format!(" at offset {}", o),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
