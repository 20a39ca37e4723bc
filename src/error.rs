//! Error types for tallying and fetching.
//!
//! Every variant is terminal for the operation that raised it. The binary
//! converts to `anyhow::Error` at the boundary.

/// Errors raised by the aggregator, the configuration layer and the
/// service-desk client.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// A version date without month and year components.
    #[error("malformed date '{date}' in version #{index}: expected DD/MM/YYYY")]
    MalformedDate { date: String, index: usize },

    /// A required detail field is absent (strict mode only).
    #[error("missing field '{field}' in version #{version_index}, detail #{detail_index}")]
    MissingField {
        field: &'static str,
        version_index: usize,
        detail_index: usize,
    },

    /// The service-desk API answered with a status other than 200.
    #[error("Error: {status}")]
    Http { status: u16 },

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure or undecodable response body.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type TallyResult<T> = std::result::Result<T, TallyError>;
