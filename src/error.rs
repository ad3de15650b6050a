//! Error types surfaced by the client.
//!
//! Every failure is returned synchronously to the caller; nothing is retried
//! or swallowed, and no partial results exist.

use crate::types::codes;

/// Errors produced by [`DecaptcherClient`](crate::DecaptcherClient).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service answered with something other than a six-field solve
    /// response. Carries the service's status code verbatim.
    #[error("{message}")]
    Service { code: String, message: String },

    /// The challenge page loaded with a success status but carried no token.
    #[error("no challenge token detected")]
    Recaptcha,

    /// Non-success HTTP status on the challenge fetch.
    #[error("http request failed with status {0}")]
    Status(u16),

    /// Underlying network failure or timeout.
    #[error("transport error: {0}")]
    Transport(#[from] wreq::Error),

    /// Pic id did not split into exactly two colon-separated parts.
    #[error("invalid pic id {0:?}: expected major_id:minor_id")]
    InvalidPicId(String),
}

impl Error {
    /// Map a service status code to its human-readable failure.
    pub(crate) fn service(code: &str) -> Self {
        let message = match code {
            codes::TOO_BUSY => "decaptcher service too busy".to_string(),
            codes::BALANCE_EMPTY => "balance empty for this account".to_string(),
            _ => format!("decaptcher service error {code}"),
        };
        Self::Service {
            code: code.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_specific_messages() {
        assert!(Error::service("-5").to_string().contains("too busy"));
        assert!(Error::service("-6").to_string().contains("balance empty"));
    }

    #[test]
    fn unknown_codes_fall_back_to_generic() {
        let err = Error::service("-99");
        assert!(matches!(&err, Error::Service { code, .. } if code == "-99"));
        assert!(err.to_string().contains("service error -99"));
    }
}
