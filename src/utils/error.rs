use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecError {
    /// 傳輸層的暫時性錯誤（逾時、連線失敗），可以重試
    #[error("Network error: {message}")]
    Net { message: String },

    /// 服務端回傳的業務錯誤
    #[error("Business error: {message}")]
    Biz { message: String },

    /// 重試次數用盡後仍是網路錯誤
    #[error("Request failed after {attempts} attempts: {message}")]
    RetryExhausted { attempts: u32, message: String },

    #[error("Server overload")]
    ServerOverload,

    #[error("Operation loss, name: {name}")]
    OperationLoss { name: String },

    #[error("Polling import result timeout after {elapsed:?}, name: {name}")]
    PollingTimeout { name: String, elapsed: Duration },

    #[error("Parse import response fail: {message}")]
    ParseResponse { message: String },

    #[error("Request dispatcher is shut down")]
    DispatcherClosed,

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Server,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RecError {
    pub fn net(message: impl Into<String>) -> Self {
        Self::Net {
            message: message.into(),
        }
    }

    pub fn biz(message: impl Into<String>) -> Self {
        Self::Biz {
            message: message.into(),
        }
    }

    /// 只有傳輸層錯誤會被重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Net { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Net { .. } | Self::RetryExhausted { .. } | Self::ApiError(_) => {
                ErrorCategory::Network
            }
            Self::Biz { .. }
            | Self::ServerOverload
            | Self::OperationLoss { .. }
            | Self::PollingTimeout { .. } => ErrorCategory::Server,
            Self::ParseResponse { .. } | Self::SerializationError(_) => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::DispatcherClosed => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Net { .. }
            | Self::RetryExhausted { .. }
            | Self::ServerOverload
            | Self::PollingTimeout { .. } => ErrorSeverity::Medium,
            Self::Biz { .. }
            | Self::ParseResponse { .. }
            | Self::SerializationError(_)
            | Self::ApiError(_)
            | Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::OperationLoss { .. } | Self::IoError(_) | Self::DispatcherClosed => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Net { .. } | Self::RetryExhausted { .. } | Self::ApiError(_) => {
                "Check network connectivity and consider raising the request timeout"
            }
            Self::ServerOverload => "Reduce the request rate or retry later",
            Self::PollingTimeout { .. } => {
                "The import task may still be running; query it later with get-operation"
            }
            Self::OperationLoss { .. } => "Report the operation name to the service provider",
            Self::Biz { .. } => "Inspect the returned status message and the request payload",
            Self::ParseResponse { .. } | Self::SerializationError(_) => {
                "Verify the payload format matches what the service expects"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Fix the configuration file and run again",
            Self::IoError(_) => "Check file paths and permissions",
            Self::DispatcherClosed => "Submit requests before calling wait_and_shutdown",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Net { .. } | Self::RetryExhausted { .. } | Self::ApiError(_) => {
                format!("Could not reach the recommendation service: {}", self)
            }
            Self::ServerOverload => {
                "The service is overloaded and rejected the request after all retries".to_string()
            }
            Self::PollingTimeout { name, .. } => {
                format!("Import task '{}' did not finish in time", name)
            }
            Self::OperationLoss { name } => {
                format!("Import task '{}' was lost by the service", name)
            }
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
            Self::MissingConfigError { field } => {
                format!("Configuration field '{}' is required", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(RecError::net("timeout").is_retryable());
        assert!(!RecError::biz("bad request").is_retryable());
        assert!(!RecError::ServerOverload.is_retryable());
        assert!(!RecError::RetryExhausted {
            attempts: 3,
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!RecError::OperationLoss {
            name: "op".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_severity_ordering_drives_exit_codes() {
        assert_eq!(RecError::ServerOverload.severity(), ErrorSeverity::Medium);
        assert_eq!(
            RecError::MissingConfigError {
                field: "client.tenant".to_string()
            }
            .severity(),
            ErrorSeverity::High
        );
        assert!(
            RecError::OperationLoss {
                name: "op".to_string()
            }
            .severity()
                > ErrorSeverity::High
        );
    }

    #[test]
    fn test_user_friendly_message_names_the_operation() {
        let err = RecError::PollingTimeout {
            name: "750eca88".to_string(),
            elapsed: Duration::from_secs(10),
        };
        assert!(err.user_friendly_message().contains("750eca88"));
        assert_eq!(err.category(), ErrorCategory::Server);
    }
}
