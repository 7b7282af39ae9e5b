use crate::platform::EntityType;
use crate::rotation::RotatorError;
use thiserror::Error;

/// Every way a single fetch can fail. Nothing else escapes a fetcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The input matched none of the accepted URL or handle shapes.
    #[error("could not extract a valid {entity} identifier from `{identifier}`")]
    UnrecognizedIdentifier {
        entity: EntityType,
        identifier: String,
    },

    /// Rotation wrapped back to the first credential without a usable response.
    #[error("all API keys exhausted after {attempts} attempt(s); last failure: {last_failure}")]
    CredentialsExhausted {
        attempts: usize,
        last_failure: String,
    },

    /// Non-success status that a different credential would not fix.
    #[error("API error {status}: {message}")]
    UpstreamError { status: u16, message: String },

    /// Success status, but the payload lacks the entity's marker field.
    #[error("API returned no data for {identifier}: {message}")]
    NoData { identifier: String, message: String },

    /// The request could not be issued at all.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error(transparent)]
    Rotator(#[from] RotatorError),
}

impl FetchError {
    /// Stable name of the variant, used in error records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UnrecognizedIdentifier { .. } => "UnrecognizedIdentifier",
            FetchError::CredentialsExhausted { .. } => "CredentialsExhausted",
            FetchError::UpstreamError { .. } => "UpstreamError",
            FetchError::NoData { .. } => "NoData",
            FetchError::TransportFailure(_) => "TransportFailure",
            FetchError::Rotator(RotatorError::NoCredentialsConfigured) => {
                "NoCredentialsConfigured"
            }
        }
    }
}
