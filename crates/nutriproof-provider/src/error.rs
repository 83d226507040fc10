use reqwest::StatusCode;

/// Coarse classification of a failed generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    Overloaded,
    ServerError,
    Timeout,
    Connect,
    AuthError,
    InvalidRequest,
    MalformedResponse,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            529 => Self::Overloaded,
            401 | 403 => Self::AuthError,
            400 | 404 | 413 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Overloaded | Self::ServerError | Self::Timeout | Self::Connect
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{provider} api error ({condition}){}: {message}", retry_marker(.kind))]
pub struct ProviderError {
    pub provider: &'static str,
    pub kind: ProviderErrorKind,
    /// HTTP status, or the transport condition when no response arrived.
    pub condition: String,
    pub message: String,
}

fn retry_marker(kind: &ProviderErrorKind) -> &'static str {
    if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    }
}

impl ProviderError {
    /// Non-success response. `detail` is the backend's `(error type, message)`
    /// when its error body could be parsed.
    pub fn status(
        provider: &'static str,
        status: StatusCode,
        detail: Option<(String, String)>,
    ) -> Self {
        let message = match detail {
            Some((error_type, message)) => format!("{message} ({error_type})"),
            None => status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        };
        Self {
            provider,
            kind: ProviderErrorKind::from_status(status),
            condition: status.as_u16().to_string(),
            message,
        }
    }

    pub fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        let (kind, condition) = if err.is_timeout() {
            (ProviderErrorKind::Timeout, "timeout")
        } else if err.is_connect() {
            (ProviderErrorKind::Connect, "connect")
        } else {
            (ProviderErrorKind::Unknown, "transport")
        };
        Self {
            provider,
            kind,
            condition: condition.to_string(),
            message: err.to_string(),
        }
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind: ProviderErrorKind::MalformedResponse,
            condition: "response".to_string(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::from_u16(529).unwrap()),
            ProviderErrorKind::Overloaded
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::FORBIDDEN),
            ProviderErrorKind::AuthError
        );
        assert!(ProviderErrorKind::ServerError.is_retryable());
        assert!(!ProviderErrorKind::InvalidRequest.is_retryable());
        assert!(!ProviderErrorKind::MalformedResponse.is_retryable());
    }

    #[test]
    fn display_carries_status_and_retry_marker() {
        let err = ProviderError::status("anthropic", StatusCode::INTERNAL_SERVER_ERROR, None);
        assert_eq!(
            err.to_string(),
            "anthropic api error (500) [retryable]: Internal Server Error"
        );

        let err = ProviderError::status(
            "openai",
            StatusCode::BAD_REQUEST,
            Some(("invalid_request_error".into(), "bad field".into())),
        );
        assert_eq!(
            err.to_string(),
            "openai api error (400): bad field (invalid_request_error)"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn malformed_is_not_retryable() {
        let err = ProviderError::malformed("openai", "empty choices");
        assert_eq!(err.to_string(), "openai api error (response): empty choices");
        assert!(!err.is_retryable());
    }
}
