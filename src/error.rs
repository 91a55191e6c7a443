//! Structured error type for the core pagination pipeline.

use core::fmt;

/// Processing phase an error originated in, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Line-composition (C1).
    Layout,
    /// Page assembly (C2).
    Page,
    /// SAX-driven chapter parsing (C3).
    Parse,
    /// Section cache I/O/serialization (C4).
    Cache,
    /// Reader cursor navigation (C5).
    Navigation,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Layout => "layout",
            Self::Page => "page",
            Self::Parse => "parse",
            Self::Cache => "cache",
            Self::Navigation => "navigation",
        };
        f.write_str(s)
    }
}

/// Stable, machine-readable error kind (mirrors spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidViewport,
    CorruptedCache,
    UnsupportedVersion,
    ResourceExhausted,
    Timeout,
    Cancelled,
    PageUnavailable,
    MalformedDocument,
    IoFailure,
}

impl ErrorKind {
    /// Stable string code used in error messages and logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidViewport => "INVALID_VIEWPORT",
            Self::CorruptedCache => "CORRUPTED_CACHE",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::PageUnavailable => "PAGE_UNAVAILABLE",
            Self::MalformedDocument => "MALFORMED_DOCUMENT",
            Self::IoFailure => "IO_FAILURE",
        }
    }
}

/// Core pipeline error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreError {
    /// Processing phase this error originated in.
    pub phase: ErrorPhase,
    /// Stable machine-readable kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl CoreError {
    /// Build a new structured error.
    pub fn new(phase: ErrorPhase, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.phase,
            self.kind.code(),
            self.message
        )
    }
}

impl std::error::Error for CoreError {}
