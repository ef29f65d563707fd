use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid timeout: {timeout_ms} ms")]
    InvalidTimeout { timeout_ms: u64 },
    #[error("failed to build http client: {reason}")]
    ClientBuild { reason: String },
}

/// Classified failure of a single outbound HTTP call.
///
/// The variants follow the provider error families the host knows how to
/// classify: connect failures, timeouts, broken or malformed responses,
/// non-2xx statuses and request-construction problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed{context}: {message}", context = format_url(.url.as_deref()))]
    Connect { url: Option<String>, message: String },
    #[error("request timed out{context}: {message}", context = format_url(.url.as_deref()))]
    Timeout { url: Option<String>, message: String },
    #[error("malformed provider response{context}: {message}", context = format_url(.url.as_deref()))]
    Protocol { url: Option<String>, message: String },
    #[error(
        "http status {status_code}{context}: {message}",
        context = format_url(.url.as_deref())
    )]
    Status {
        url: Option<String>,
        status_code: u16,
        message: String,
    },
    #[error("invalid request{context}: {message}", context = format_url(.url.as_deref()))]
    Request { url: Option<String>, message: String },
}

impl TransportError {
    pub fn from_reqwest(error: &reqwest::Error, url: &str) -> Self {
        let url = Some(url.to_string());
        let message = error.to_string();

        if let Some(status) = error.status() {
            return Self::Status {
                url,
                status_code: status.as_u16(),
                message,
            };
        }
        if error.is_connect() {
            return Self::Connect { url, message };
        }
        if error.is_timeout() {
            return Self::Timeout { url, message };
        }
        if error.is_decode() || error.is_body() {
            return Self::Protocol { url, message };
        }
        Self::Request { url, message }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// True for every failure raised while sending or reading a request,
    /// which covers connect, timeout and protocol failures as well as
    /// request-construction errors. Status errors are not request errors.
    pub fn is_request_error(&self) -> bool {
        !self.is_status()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeErrorKind {
    Connection,
    ServerUnavailable,
    RateLimited,
    Unauthorized,
    BadRequest,
    CredentialsValidateFailed,
}

/// Host-level error taxonomy every adapter reports in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("server unavailable: {0}")]
    ServerUnavailable(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("credentials validation failed: {0}")]
    CredentialsValidateFailed(String),
}

impl InvokeError {
    pub fn new(kind: InvokeErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            InvokeErrorKind::Connection => Self::Connection(message),
            InvokeErrorKind::ServerUnavailable => Self::ServerUnavailable(message),
            InvokeErrorKind::RateLimited => Self::RateLimited(message),
            InvokeErrorKind::Unauthorized => Self::Unauthorized(message),
            InvokeErrorKind::BadRequest => Self::BadRequest(message),
            InvokeErrorKind::CredentialsValidateFailed => Self::CredentialsValidateFailed(message),
        }
    }

    pub fn kind(&self) -> InvokeErrorKind {
        match self {
            Self::Connection(_) => InvokeErrorKind::Connection,
            Self::ServerUnavailable(_) => InvokeErrorKind::ServerUnavailable,
            Self::RateLimited(_) => InvokeErrorKind::RateLimited,
            Self::Unauthorized(_) => InvokeErrorKind::Unauthorized,
            Self::BadRequest(_) => InvokeErrorKind::BadRequest,
            Self::CredentialsValidateFailed(_) => InvokeErrorKind::CredentialsValidateFailed,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Connection(message)
            | Self::ServerUnavailable(message)
            | Self::RateLimited(message)
            | Self::Unauthorized(message)
            | Self::BadRequest(message)
            | Self::CredentialsValidateFailed(message) => message,
        }
    }

    /// Wraps any failure seen during a credential smoke test.
    pub fn credentials_invalid(cause: &dyn std::fmt::Display) -> Self {
        Self::CredentialsValidateFailed(cause.to_string())
    }
}

pub type ErrorPredicate = fn(&TransportError) -> bool;

/// One row of the declarative error-mapping table.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMapping {
    pub kind: InvokeErrorKind,
    pub matches: ErrorPredicate,
}

fn never(_error: &TransportError) -> bool {
    false
}

/// Ordered mapping from transport failures to host error kinds. The first
/// matching row wins, so the narrow rows must stay above `BadRequest`.
pub const INVOKE_ERROR_MAPPING: &[ErrorMapping] = &[
    ErrorMapping {
        kind: InvokeErrorKind::Connection,
        matches: TransportError::is_connect,
    },
    ErrorMapping {
        kind: InvokeErrorKind::ServerUnavailable,
        matches: TransportError::is_protocol,
    },
    ErrorMapping {
        kind: InvokeErrorKind::RateLimited,
        matches: never,
    },
    ErrorMapping {
        kind: InvokeErrorKind::Unauthorized,
        matches: TransportError::is_status,
    },
    ErrorMapping {
        kind: InvokeErrorKind::BadRequest,
        matches: TransportError::is_request_error,
    },
];

pub const UNMATCHED_ERROR_KIND: InvokeErrorKind = InvokeErrorKind::BadRequest;

pub fn map_transport_error(mapping: &[ErrorMapping], error: &TransportError) -> InvokeError {
    let kind = mapping
        .iter()
        .find(|row| (row.matches)(error))
        .map_or(UNMATCHED_ERROR_KIND, |row| row.kind);

    InvokeError::new(kind, error.to_string())
}

impl From<TransportError> for InvokeError {
    fn from(error: TransportError) -> Self {
        map_transport_error(INVOKE_ERROR_MAPPING, &error)
    }
}

impl From<ConfigError> for InvokeError {
    fn from(error: ConfigError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

fn format_url(url: Option<&str>) -> String {
    match url {
        Some(url) => format!(" [url={url}]"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests;
