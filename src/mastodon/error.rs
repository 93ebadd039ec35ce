// API error taxonomy: the two failure classes the poll loop cares about.
//
// Connectivity means the transport never reached the server: the backoff
// controller retries these with exponential delay. Protocol means the
// server answered but not usefully (non-2xx status, unparseable body):
// the current cycle is abandoned and the next one starts on schedule.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connect, timeout).
    #[error("connection failure: {0}")]
    Connectivity(#[source] reqwest::Error),

    /// The server responded, but with a failure status or a body we
    /// could not parse.
    #[error("{endpoint}: {message}")]
    Protocol {
        endpoint: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn protocol(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint,
            message: message.into(),
        }
    }

    /// True for errors the backoff controller should absorb.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
