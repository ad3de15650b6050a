//! Wire-level types for the solve exchange.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Service status codes carried in the first field of a failed solve
/// response.
pub mod codes {
    /// The service has no capacity right now.
    pub const TOO_BUSY: &str = "-5";
    /// The account has no funds left.
    pub const BALANCE_EMPTY: &str = "-6";
}

/// A successful solve response carries exactly this many pipe-delimited
/// fields.
const SOLVE_FIELD_COUNT: usize = 6;

/// Composite picture identifier assigned by the service, used later to
/// request a refund for a bad solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicId {
    pub major: String,
    pub minor: String,
}

impl FromStr for PicId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(major), Some(minor), None) if !major.is_empty() && !minor.is_empty() => {
                Ok(Self {
                    major: major.to_string(),
                    minor: minor.to_string(),
                })
            }
            _ => Err(Error::InvalidPicId(s.to_string())),
        }
    }
}

impl fmt::Display for PicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Outcome of a successful solve call.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub pic_id: PicId,
    pub text: String,
    /// Wall-clock duration of the solve round trip.
    pub elapsed: Duration,
}

/// Parse a solve response body.
///
/// Exactly six pipe-delimited fields make a success; anything else is a
/// service failure keyed on the first field.
pub(crate) fn parse_solve_response(body: &str, elapsed: Duration) -> Result<SolveResult, Error> {
    let fields: Vec<&str> = body.split('|').collect();
    if fields.len() != SOLVE_FIELD_COUNT {
        return Err(Error::service(fields.first().copied().unwrap_or("")));
    }
    Ok(SolveResult {
        pic_id: PicId {
            major: fields[1].to_string(),
            minor: fields[2].to_string(),
        },
        text: fields[5].to_string(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pic_id_parses_two_components() {
        let id: PicId = "123:456".parse().unwrap();
        assert_eq!(id.major, "123");
        assert_eq!(id.minor, "456");
        assert_eq!(id.to_string(), "123:456");
    }

    #[test]
    fn pic_id_rejects_malformed_input() {
        for bad in ["123", "1:2:3", "", ":", "123:"] {
            assert!(
                matches!(bad.parse::<PicId>(), Err(Error::InvalidPicId(s)) if s == bad),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn six_fields_make_a_result() {
        let result =
            parse_solve_response("0|ok|111|222|x|HELLO", Duration::from_millis(5)).unwrap();
        assert_eq!(result.pic_id.to_string(), "111:222");
        assert_eq!(result.text, "HELLO");
        assert_eq!(result.elapsed, Duration::from_millis(5));
    }

    #[test]
    fn short_responses_map_to_service_errors() {
        for (body, code) in [("-5", "-5"), ("-6", "-6"), ("-13|oops", "-13"), ("", "")] {
            match parse_solve_response(body, Duration::ZERO) {
                Err(Error::Service { code: got, .. }) => assert_eq!(got, code),
                other => panic!("expected service error for {body:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn seven_fields_are_not_a_result() {
        let err = parse_solve_response("0|a|b|c|d|e|f", Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::Service { code, .. } if code == "0"));
    }
}
