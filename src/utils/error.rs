use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsgError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("Base64 decoding error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{entity} not found: {key}")]
    NotFoundError { entity: String, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Parsing,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EsgError {
    pub fn processing(message: impl Into<String>) -> Self {
        EsgError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EsgError::ApiError(_) | EsgError::UrlError(_) => ErrorCategory::Network,
            EsgError::IoError(_) | EsgError::DatabaseError(_) | EsgError::NotFoundError { .. } => {
                ErrorCategory::Storage
            }
            EsgError::ZipError(_)
            | EsgError::CsvError(_)
            | EsgError::SerializationError(_)
            | EsgError::XmlError(_)
            | EsgError::DecodeError(_) => ErrorCategory::Parsing,
            EsgError::ConfigError { .. }
            | EsgError::ConfigValidationError { .. }
            | EsgError::InvalidConfigValueError { .. }
            | EsgError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EsgError::ProcessingError { .. } | EsgError::ValidationError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // CVM portal hiccups usually clear up on the next run
            EsgError::ApiError(_) => ErrorSeverity::Medium,
            EsgError::NotFoundError { .. } | EsgError::ValidationError { .. } => {
                ErrorSeverity::Low
            }
            EsgError::DatabaseError(_) | EsgError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network access to dados.cvm.gov.br (or CVM_BASE_URL) and retry later"
            }
            ErrorCategory::Storage => {
                "Check DATABASE_URL, disk space and permissions of the temp directory"
            }
            ErrorCategory::Parsing => {
                "The CVM file may be truncated or in an unexpected layout; re-download it"
            }
            ErrorCategory::Configuration => {
                "Review lupa-esg.toml and the variables in .env (see .env.example)"
            }
            ErrorCategory::Processing => {
                "Inspect the document with `lupa-esg inspect-xml` and retry with --retry-errors"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EsgError::ApiError(e) if e.is_timeout() => {
                "The CVM portal took too long to answer".to_string()
            }
            EsgError::ApiError(e) => match e.status() {
                Some(status) => format!("The CVM portal answered with HTTP {}", status),
                None => "Could not reach the CVM portal".to_string(),
            },
            EsgError::DatabaseError(_) => "The local database could not be used".to_string(),
            EsgError::MissingConfigError { field } => {
                format!("Missing configuration value: {}", field)
            }
            EsgError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    /// Process exit code for the CLI; zero means the failure is only a warning.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EsgError>;
