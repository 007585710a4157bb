//! Error types for probes and collectors.

use std::time::Duration;

/// Result of a single probe reading.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Failure of a single probe reading.
///
/// These never abort a snapshot: the collector turns each one into an
/// absent field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The data source does not exist or cannot be read on this host.
    Unavailable(String),
    /// A bounded external helper exceeded its deadline.
    Timeout { program: String, timeout: Duration },
    /// The data source was read but its content was malformed.
    Parse(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Unavailable(msg) => write!(f, "probe unavailable: {}", msg),
            ProbeError::Timeout { program, timeout } => {
                write!(f, "probe timeout: {} exceeded {:?}", program, timeout)
            }
            ProbeError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Unavailable(e.to_string())
    }
}

impl From<crate::collector::probe::parser::ParseError> for ProbeError {
    fn from(e: crate::collector::probe::parser::ParseError) -> Self {
        ProbeError::Parse(e.message)
    }
}

/// Error returned by collector construction and configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorError {
    /// The registry has no such collector for the platform.
    UnsupportedCollector { collector: String, platform: String },
    /// An option value was rejected; the previous configuration is kept.
    InvalidConfiguration(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::UnsupportedCollector {
                collector,
                platform,
            } => write!(
                f,
                "collector '{}' is not supported on platform '{}'",
                collector, platform
            ),
            CollectorError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for CollectorError {}
