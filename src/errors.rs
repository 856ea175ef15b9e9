use serde::Serialize;

/// All application errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Market data source ──
    #[error("Connection to market data source failed: {0}")]
    ConnectionFailed(String),

    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Malformed bar data: {0}")]
    MalformedBar(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    // ── Download ──
    #[error("Download failed: {0}")]
    Download(String),

    // ── Indicator ──
    #[error("Invalid indicator parameters: {0}")]
    InvalidIndicatorParams(String),

    // ── Configuration ──
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Files ──
    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ── General ──
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code handed to the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ConnectionFailed(_) => "CONNECTION_FAILED",
            AppError::DataUnavailable(_) => "DATA_UNAVAILABLE",
            AppError::MalformedBar(_) => "MALFORMED_BAR",
            AppError::UnknownSymbol(_) => "UNKNOWN_SYMBOL",
            AppError::Download(_) => "DOWNLOAD_ERROR",
            AppError::InvalidIndicatorParams(_) => "INVALID_INDICATOR_PARAMS",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::FileRead(_) => "FILE_READ",
            AppError::FileWrite(_) => "FILE_WRITE",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// True when the same request may succeed later (e.g. market closed).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::DataUnavailable(_))
    }
}

/// Serializable error response for the presentation layer.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileRead(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::FileRead(format!("CSV error: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::InvalidConfig(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AppError::ConnectionFailed(err.to_string())
        } else {
            AppError::Download(err.to_string())
        }
    }
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self {
        AppError::Internal(format!("DataFrame error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_code() {
        let err = AppError::DataUnavailable("GBPUSD m1".into());
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.code, "DATA_UNAVAILABLE");
        assert!(resp.message.contains("GBPUSD m1"));
    }

    #[test]
    fn test_only_data_unavailable_is_recoverable() {
        assert!(AppError::DataUnavailable(String::new()).is_recoverable());
        assert!(!AppError::ConnectionFailed(String::new()).is_recoverable());
        assert!(!AppError::MalformedBar(String::new()).is_recoverable());
    }

    #[test]
    fn test_serializes_as_error_response() {
        let err = AppError::MalformedBar("low above high".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MALFORMED_BAR");
    }
}
