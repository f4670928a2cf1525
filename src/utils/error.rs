use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Fetch failed for {url}: {message}")]
    FetchError {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Parse error for {url}: {message}")]
    ParseError { url: String, message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Query error: {message}")]
    QueryError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Parsing,
    Authentication,
    Query,
    Configuration,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HarvestError {
    pub fn fetch(url: impl Into<String>, message: impl ToString) -> Self {
        Self::FetchError {
            url: url.into(),
            status: None,
            message: message.to_string(),
        }
    }

    pub fn status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::FetchError {
            url: url.into(),
            status: Some(status.as_u16()),
            message: format!("HTTP {}", status),
        }
    }

    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// HTTP 狀態碼（僅限 FetchError）
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::FetchError { status, .. } => *status,
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FetchError { .. } | Self::HttpError(_) => ErrorCategory::Network,
            Self::ParseError { .. } => ErrorCategory::Parsing,
            Self::AuthError { .. } => ErrorCategory::Authentication,
            Self::QueryError { .. } => ErrorCategory::Query,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::ZipError(_)
            | Self::CsvError(_)
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Parsing => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Query => ErrorSeverity::Medium,
            ErrorCategory::Authentication | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::FetchError {
                status: Some(403), ..
            } => "The site is blocking plain requests; try --render-mode auto with a render endpoint",
            Self::FetchError {
                status: Some(404), ..
            } => "Check that the URL points to an existing public page",
            Self::FetchError { .. } | Self::HttpError(_) => {
                "Check your network connection and the target URL, then run again"
            }
            Self::ParseError { .. } => {
                "The page layout may have changed; verify the selectors in the [participants] or [contacts] config"
            }
            Self::AuthError { .. } => {
                "Verify GITHUB_TOKEN is valid and not rate limited (wait for the limit to reset)"
            }
            Self::QueryError { .. } => {
                "Check the repository name and, if you supplied one, the custom query document"
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Fix the configuration file or command-line arguments"
            }
            Self::ZipError(_) | Self::CsvError(_) | Self::IoError(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::SerializationError(_) => "Check the input file is valid JSON",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not download a page: {}", self),
            ErrorCategory::Parsing => format!("Could not understand a page: {}", self),
            ErrorCategory::Authentication => format!("Access was denied: {}", self),
            ErrorCategory::Query => format!("The API returned an unusable response: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Output => format!("Could not write results: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_severity() {
        let err = HarvestError::auth("Bad credentials");
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = HarvestError::parse("https://example.com", "no entries");
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_status_error_keeps_code() {
        let err = HarvestError::status("https://example.com", reqwest::StatusCode::FORBIDDEN);
        assert_eq!(err.http_status(), Some(403));
        assert!(err.recovery_suggestion().contains("render"));
        assert!(err.to_string().contains("403"));
    }
}
