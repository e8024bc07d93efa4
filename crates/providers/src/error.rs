use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: http error: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: quota suspended for today")]
    QuotaSuspended { provider: &'static str },

    #[error("{provider}: unexpected response shape: {reason}")]
    BadResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: rate limiter denied the request")]
    RateLimited { provider: &'static str },

    #[error("{provider}: rejected credentials (401); aborting rather than retrying")]
    ConfigurationError { provider: &'static str },
}

impl ProviderError {
    /// Whether a caller should retry this call (spec §4.5: "do not retry
    /// 4xx except 429"). Network errors, timeouts, 429s, and 5xx responses
    /// are retryable; authentication/validation failures and rate-limiter
    /// denials are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { source, .. } => match source.status() {
                Some(status) => status.as_u16() == 429 || status.is_server_error(),
                None => source.is_timeout() || source.is_connect() || source.is_request(),
            },
            ProviderError::QuotaSuspended { .. } => false,
            ProviderError::BadResponse { .. } => false,
            ProviderError::RateLimited { .. } => false,
            ProviderError::ConfigurationError { .. } => false,
        }
    }

    /// Build a `ProviderError` from a `reqwest::Error`, surfacing a 401
    /// as a fatal `ConfigurationError` instead of a plain `Http` error so
    /// callers can distinguish "bad API key" from a transient failure.
    pub fn from_reqwest(provider: &'static str, source: reqwest::Error) -> Self {
        if source.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            ProviderError::ConfigurationError { provider }
        } else {
            ProviderError::Http { provider, source }
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
