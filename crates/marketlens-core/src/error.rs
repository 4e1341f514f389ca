use thiserror::Error;

/// Validation errors raised while normalising upstream values into domain types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("unparseable timestamp: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("bar high must be >= low")]
    InvalidBarRange,

    #[error("window start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },
}

/// Terminal outcome of one upstream call after the retry policy has run.
///
/// Empty results are not errors; sources return an empty `Vec` for those.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Throttle status persisted past the attempt ceiling.
    #[error("{provider} throttled the request after {attempts} attempt(s)")]
    Throttled { provider: &'static str, attempts: u32 },

    /// Non-throttle 4xx/5xx status.
    #[error("{provider} rejected the request with status {status}")]
    UpstreamRejected { provider: &'static str, status: u16 },

    /// DNS, connect, reset or timeout. Never retried.
    #[error("{provider} transport fault: {message}")]
    TransportFault {
        provider: &'static str,
        message: String,
    },

    /// The body did not match the provider's response schema.
    #[error("{provider} returned an undecodable body: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
}

impl FetchError {
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Throttled { provider, .. }
            | Self::UpstreamRejected { provider, .. }
            | Self::TransportFault { provider, .. }
            | Self::Decode { provider, .. } => provider,
        }
    }

    /// HTTP status associated with the failure, when there was one.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Throttled { .. } => Some(429),
            Self::UpstreamRejected { status, .. } => Some(*status),
            Self::TransportFault { .. } | Self::Decode { .. } => None,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Throttled { .. } => "fetch.throttled",
            Self::UpstreamRejected { .. } => "fetch.upstream_rejected",
            Self::TransportFault { .. } => "fetch.transport_fault",
            Self::Decode { .. } => "fetch.decode",
        }
    }

    pub(crate) fn decode(provider: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            provider,
            message: error.to_string(),
        }
    }
}
