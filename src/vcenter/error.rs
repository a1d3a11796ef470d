//! Management API error types with HTTP status classification.
//!
//! Nothing here is retried; the classification only decides how a failure is
//! described to the operator.

/// Error from management server calls.
#[derive(Debug)]
pub struct ApiError {
    /// The kind of error
    pub kind: ApiErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl ApiError {
    /// Create an error from a non-success HTTP response.
    pub fn from_status(status_code: u16, message: String) -> Self {
        Self {
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a network error (connection refused, TLS failure, timeout).
    pub fn network_error(message: String) -> Self {
        Self {
            kind: ApiErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: ApiErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    /// Whether the server rejected our credentials or session.
    pub fn is_auth(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::network_error(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            ApiError::network_error(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            ApiError::parse_error(format!("Failed to decode response: {}", e))
        } else {
            ApiError::network_error(format!("Request failed: {}", e))
        }
    }
}

/// Classification of management API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 401 / 403 - bad credentials or expired session
    Unauthorized,
    /// 404 - unknown entity, task or endpoint
    NotFound,
    /// Other 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Connection failed, TLS handshake failed, timeout
    NetworkError,
    /// Response body did not match the expected shape
    ParseError,
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ApiErrorKind::NotFound => write!(f, "Not found"),
            ApiErrorKind::ClientError => write!(f, "Client error"),
            ApiErrorKind::ServerError => write!(f, "Server error"),
            ApiErrorKind::NetworkError => write!(f, "Network error"),
            ApiErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> ApiErrorKind {
    match status {
        401 | 403 => ApiErrorKind::Unauthorized,
        404 => ApiErrorKind::NotFound,
        400..=499 => ApiErrorKind::ClientError,
        _ => ApiErrorKind::ServerError,
    }
}
