use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectFailed,
    Timeout,
    TlsHandshakeFailed,
    TlsAcceptFailed,
    HttpHandshakeFailed,
    HttpSendReqFailed,
    HttpRecvRspFailed,
    HttpRecvReqFailed,
    TcpBindFailed,
    BadStatus(u16),
    SerializeFailed,
    DeserializeFailed,
    CompressFailed,
    DecompressFailed,
    InvalidUrl,
    UnsupportedScheme,
    InvalidTrustMaterial,
    InvalidKeyMaterial,
    TooManyArguments,
    MissingServicePath,
    InvalidServicePath,
    InvalidConfig,
}

/// Coarse classification of an [`ErrorKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection refused, timed out, reset, or a failed handshake.
    Transport,
    /// The peer answered with a status outside the 2xx class.
    Protocol,
    /// A payload could not be encoded, compressed, or decoded.
    Serialization,
    /// Invalid setup detected before any I/O. Never worth retrying.
    Config,
}

impl ErrorKind {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::ConnectFailed
            | ErrorKind::Timeout
            | ErrorKind::TlsHandshakeFailed
            | ErrorKind::TlsAcceptFailed
            | ErrorKind::HttpHandshakeFailed
            | ErrorKind::HttpSendReqFailed
            | ErrorKind::HttpRecvRspFailed
            | ErrorKind::HttpRecvReqFailed
            | ErrorKind::TcpBindFailed => ErrorCategory::Transport,
            ErrorKind::BadStatus(_) => ErrorCategory::Protocol,
            ErrorKind::SerializeFailed
            | ErrorKind::DeserializeFailed
            | ErrorKind::CompressFailed
            | ErrorKind::DecompressFailed => ErrorCategory::Serialization,
            ErrorKind::InvalidUrl
            | ErrorKind::UnsupportedScheme
            | ErrorKind::InvalidTrustMaterial
            | ErrorKind::InvalidKeyMaterial
            | ErrorKind::TooManyArguments
            | ErrorKind::MissingServicePath
            | ErrorKind::InvalidServicePath
            | ErrorKind::InvalidConfig => ErrorCategory::Config,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    #[must_use]
    pub fn kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            msg: String::default(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// The HTTP status carried by a protocol error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::BadStatus(code) => Some(code),
            _ => None,
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::kind(kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::DeserializeFailed,
            msg: value.to_string(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}: {}", self.kind, self.msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let kind = ErrorKind::Timeout;
        let error: Error = kind.into();
        assert_eq!(error.to_string(), "Timeout");
        assert_eq!(error.category(), ErrorCategory::Transport);

        let error = Error::new(ErrorKind::ConnectFailed, "connection refused".into());
        assert_eq!(error.to_string(), "ConnectFailed: connection refused");

        let error: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(error.kind, ErrorKind::DeserializeFailed);
        assert_eq!(error.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_bad_status() {
        let error = Error::kind(ErrorKind::BadStatus(503));
        assert_eq!(error.category(), ErrorCategory::Protocol);
        assert_eq!(error.status(), Some(503));
        assert_eq!(error.to_string(), "BadStatus(503)");

        let error = Error::kind(ErrorKind::TooManyArguments);
        assert_eq!(error.category(), ErrorCategory::Config);
        assert_eq!(error.status(), None);
    }
}
