extern crate reqwest;

use std::{error::Error as StdError, fmt, result::Result as StdResult};

/// Closed taxonomy of remote-service failures, decided once at the network
/// boundary. Everything above it matches on `Kind`, never on type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Unauthorized,
    NotFound,
    Input,
    Protocol,
    Generic,
}

#[derive(Debug, Clone)]
pub struct Error {
    kind: Kind,
    message: String,
}

pub type Result<T> = StdResult<T, Error>;

impl Error {
    pub fn new<T: Into<String>>(kind: Kind, message: T) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }
    pub fn kind(&self) -> Kind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn protocol<T: Into<String>>(message: T) -> Self {
        Self::new(Kind::Protocol, message)
    }
    pub(crate) fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        let kind = match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Kind::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Kind::NotFound,
            reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::UNPROCESSABLE_ENTITY => {
                Kind::Input
            }
            _ => Kind::Generic,
        };
        Self::new(kind, message)
    }
    pub(crate) fn network(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status, err.to_string()),
            None => Self::new(Kind::Generic, err.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Unauthorized => write!(f, "session expired or not signed in: {}", self.message),
            Kind::NotFound => write!(f, "not found: {}", self.message),
            Kind::Input => write!(f, "judge rejected the request: {}", self.message),
            Kind::Protocol => write!(f, "malformed judge response: {}", self.message),
            Kind::Generic => write!(f, "judge request failed: {}", self.message),
        }
    }
}
impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_closed_taxonomy() {
        let of = |code| Error::from_status(code, String::new()).kind();
        assert_eq!(of(reqwest::StatusCode::UNAUTHORIZED), Kind::Unauthorized);
        assert_eq!(of(reqwest::StatusCode::FORBIDDEN), Kind::Unauthorized);
        assert_eq!(of(reqwest::StatusCode::NOT_FOUND), Kind::NotFound);
        assert_eq!(of(reqwest::StatusCode::BAD_REQUEST), Kind::Input);
        assert_eq!(of(reqwest::StatusCode::BAD_GATEWAY), Kind::Generic);
    }
}
