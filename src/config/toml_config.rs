use crate::utils::error::{RecError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecConfig {
    pub client: ClientConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub tenant: String,
    pub tenant_id: String,
    pub project_id: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_times")]
    pub retry_times: i32,
    /// 輪詢匯入結果的最長時間
    #[serde(default = "default_polling_timeout_ms")]
    pub polling_timeout_ms: u64,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// 伺服器過載時重試間隔的基數
    #[serde(default = "default_overload_retry_interval_ms")]
    pub overload_retry_interval_ms: u64,
    #[serde(default = "default_overload_increase_speed")]
    pub overload_increase_speed: u32,
    #[serde(default = "default_get_operation_timeout_ms")]
    pub get_operation_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub write_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub import_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub done_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub predict_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub callback_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub get_operation_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub list_operations_ms: u64,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_retry_times() -> i32 {
    2
}

fn default_polling_timeout_ms() -> u64 {
    10_000
}

fn default_polling_interval_ms() -> u64 {
    100
}

fn default_overload_retry_interval_ms() -> u64 {
    200
}

fn default_overload_increase_speed() -> u32 {
    3
}

fn default_get_operation_timeout_ms() -> u64 {
    600
}

fn default_workers() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    800
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_times: default_retry_times(),
            polling_timeout_ms: default_polling_timeout_ms(),
            polling_interval_ms: default_polling_interval_ms(),
            overload_retry_interval_ms: default_overload_retry_interval_ms(),
            overload_increase_speed: default_overload_increase_speed(),
            get_operation_timeout_ms: default_get_operation_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn polling_timeout(&self) -> Duration {
        Duration::from_millis(self.polling_timeout_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn overload_retry_interval(&self) -> Duration {
        Duration::from_millis(self.overload_retry_interval_ms)
    }

    pub fn get_operation_timeout(&self) -> Duration {
        Duration::from_millis(self.get_operation_timeout_ms)
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            write_ms: default_timeout_ms(),
            import_ms: default_timeout_ms(),
            done_ms: default_timeout_ms(),
            predict_ms: default_timeout_ms(),
            callback_ms: default_timeout_ms(),
            get_operation_ms: default_timeout_ms(),
            list_operations_ms: default_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn import(&self) -> Duration {
        Duration::from_millis(self.import_ms)
    }

    pub fn done(&self) -> Duration {
        Duration::from_millis(self.done_ms)
    }

    pub fn predict(&self) -> Duration {
        Duration::from_millis(self.predict_ms)
    }

    pub fn callback(&self) -> Duration {
        Duration::from_millis(self.callback_ms)
    }

    pub fn get_operation(&self) -> Duration {
        Duration::from_millis(self.get_operation_ms)
    }

    pub fn list_operations(&self) -> Duration {
        Duration::from_millis(self.list_operations_ms)
    }
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl RecConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RecError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RecError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REC_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RecError::ConfigError {
            message: format!("invalid env pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("client.tenant", &self.tenant)?;
        validation::validate_non_empty_string("client.tenant_id", &self.tenant_id)?;

        // 沒被替換的 ${VAR} 代表環境變數未設定
        validation::validate_resolved("client.tenant", &self.tenant)?;
        validation::validate_resolved("client.tenant_id", &self.tenant_id)?;
        validation::validate_resolved("client.scheme", &self.scheme)?;
        validation::validate_resolved("client.host", &self.host)?;
        if let Some(project_id) = &self.project_id {
            validation::validate_resolved("client.project_id", project_id)?;
        }
        if let Some(token) = &self.token {
            validation::validate_resolved("client.token", token)?;
        }
        for (name, value) in self.headers.iter().flatten() {
            validation::validate_resolved(&format!("client.headers.{}", name), value)?;
        }

        validation::validate_url("client.host", &self.base_url())
    }
}

impl Validate for RecConfig {
    fn validate(&self) -> Result<()> {
        self.client.validate()?;

        validation::validate_range("retry.retry_times", self.retry.retry_times, 0, 10)?;
        validation::validate_positive_number(
            "retry.polling_interval_ms",
            self.retry.polling_interval_ms as usize,
            1,
        )?;
        if self.retry.polling_interval_ms > self.retry.polling_timeout_ms {
            return Err(RecError::InvalidConfigValueError {
                field: "retry.polling_interval_ms".to_string(),
                value: self.retry.polling_interval_ms.to_string(),
                reason: "Polling interval must not exceed polling timeout".to_string(),
            });
        }
        validation::validate_range(
            "retry.overload_increase_speed",
            self.retry.overload_increase_speed,
            1,
            10,
        )?;
        validation::validate_positive_number("concurrency.workers", self.concurrency.workers, 1)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[client]
tenant = "general_demo"
tenant_id = "2100021"
host = "rec-api.example.com"
"#;

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let config = RecConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.client.scheme, "https");
        assert_eq!(config.client.base_url(), "https://rec-api.example.com");
        assert_eq!(config.retry.retry_times, 2);
        assert_eq!(config.retry.polling_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry.polling_interval(), Duration::from_millis(100));
        assert_eq!(config.retry.overload_retry_interval(), Duration::from_millis(200));
        assert_eq!(config.retry.get_operation_timeout(), Duration::from_millis(600));
        assert_eq!(config.concurrency.workers, 5);
        assert_eq!(config.timeouts.predict(), Duration::from_millis(800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REC_INGEST_TEST_TOKEN", "secret-token");

        let toml_content = format!("{}token = \"${{REC_INGEST_TEST_TOKEN}}\"\n", MINIMAL);
        let config = RecConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.client.token.as_deref(), Some("secret-token"));

        std::env::remove_var("REC_INGEST_TEST_TOKEN");
    }

    #[test]
    fn test_unresolved_token_fails_validation() {
        let toml_content = format!("{}token = \"${{REC_INGEST_UNSET_TOKEN}}\"\n", MINIMAL);
        let config = RecConfig::from_toml_str(&toml_content).unwrap();

        assert!(matches!(
            config.validate(),
            Err(RecError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_unresolved_client_fields_fail_validation() {
        let cases = [
            (
                "tenant_id",
                r#"
[client]
tenant = "general_demo"
tenant_id = "${REC_INGEST_UNSET_TENANT_ID}"
host = "rec-api.example.com"
"#,
            ),
            (
                "project_id",
                r#"
[client]
tenant = "general_demo"
tenant_id = "2100021"
project_id = "${REC_INGEST_UNSET_PROJECT_ID}"
host = "rec-api.example.com"
"#,
            ),
            (
                "host",
                r#"
[client]
tenant = "general_demo"
tenant_id = "2100021"
host = "${REC_INGEST_UNSET_HOST}"
"#,
            ),
            (
                "headers",
                r#"
[client]
tenant = "general_demo"
tenant_id = "2100021"
host = "rec-api.example.com"

[client.headers]
X-Trace = "${REC_INGEST_UNSET_HEADER}"
"#,
            ),
        ];

        for (field, content) in cases {
            let config = RecConfig::from_toml_str(content).unwrap();
            match config.validate() {
                Err(RecError::MissingConfigError { field: reported }) => {
                    assert!(reported.starts_with(&format!("client.{}", field)), "{}", reported)
                }
                other => panic!("{} should be reported as missing, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[client]
tenant = "general_demo"
tenant_id = "2100021"
scheme = "ftp"
host = "rec-api.example.com"
"#;
        let config = RecConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = format!("{}\n[concurrency]\nworkers = 0\n", MINIMAL);
        let config = RecConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = format!(
            "{}\n[retry]\npolling_timeout_ms = 50\npolling_interval_ms = 100\n",
            MINIMAL
        );
        let config = RecConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = RecConfig::from_toml_str("[client\ntenant = ").unwrap_err();
        assert!(matches!(err, RecError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = format!(
            "{}\n[retry]\nretry_times = 4\n\n[timeouts]\nwrite_ms = 1500\n",
            MINIMAL
        );
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = RecConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.client.tenant, "general_demo");
        assert_eq!(config.retry.retry_times, 4);
        assert_eq!(config.timeouts.write(), Duration::from_millis(1500));
        assert_eq!(config.timeouts.import(), Duration::from_millis(800));
    }
}
