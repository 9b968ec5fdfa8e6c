use crate::utils::error::{RecError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TOPIC_ITEM: &str = "item";
pub const TOPIC_USER: &str = "user";
pub const TOPIC_BEHAVIOR: &str = "behavior";

/// One data row as uploaded to the service.
pub type DataRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Every response message carries a status.
pub trait HasStatus {
    fn status(&self) -> &Status;
}

macro_rules! impl_has_status {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasStatus for $ty {
                fn status(&self) -> &Status {
                    &self.status
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteDataRequest {
    pub topic: String,
    pub data: Vec<DataRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub errors: Vec<DataError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateConfig {
    /// RFC 3339 timestamp of the day being imported.
    pub date: String,
    #[serde(default)]
    pub is_end: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDataRequest {
    pub topic: String,
    pub data: Vec<DataRecord>,
    pub date_config: DateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub error_samples: Vec<DataError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoneRequest {
    pub topic: String,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoneResponse {
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictUser {
    pub uid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    pub scene_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictItem {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    pub user: PredictUser,
    pub size: u32,
    #[serde(default)]
    pub scene: Scene,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub candidate_items: Vec<PredictItem>,
    #[serde(default)]
    pub related_item: Option<PredictItem>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResultItem {
    pub id: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResult {
    #[serde(default)]
    pub items: Vec<PredictResultItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub value: PredictResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackItem {
    pub id: String,
    pub pos: String,
    #[serde(default)]
    pub extra: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub predict_request_id: String,
    pub uid: String,
    #[serde(default)]
    pub scene: String,
    pub items: Vec<CallbackItem>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackResponse {
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetOperationRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResponse {
    pub type_url: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<TaskResponse>,
}

impl Operation {
    /// Decodes the finished task payload of an import operation.
    pub fn import_response(&self) -> Result<ImportResponse> {
        let task = self.response.as_ref().ok_or_else(|| RecError::ParseResponse {
            message: format!("operation '{}' has no response", self.name),
        })?;

        if !task.type_url.contains("Import") {
            return Err(RecError::ParseResponse {
                message: format!("unexpected task response type: {}", task.type_url),
            });
        }

        serde_json::from_value(task.value.clone()).map_err(|e| RecError::ParseResponse {
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOperationsRequest {
    #[serde(default)]
    pub filter: String,
    pub page_size: u32,
    #[serde(default)]
    pub page_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOperationsResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub next_page_token: String,
}

impl_has_status!(
    WriteResponse,
    ImportResponse,
    DoneResponse,
    PredictResponse,
    CallbackResponse,
    OperationResponse,
    ListOperationsResponse,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finished(type_url: &str, value: serde_json::Value) -> Operation {
        Operation {
            name: "op-1".to_string(),
            done: true,
            response: Some(TaskResponse {
                type_url: type_url.to_string(),
                value,
            }),
        }
    }

    #[test]
    fn test_import_response_decodes_payload() {
        let op = finished(
            "type.googleapis.com/ImportResponse",
            json!({"status": {"code": 0, "message": "ok"}, "error_samples": []}),
        );

        let rsp = op.import_response().unwrap();
        assert_eq!(rsp.status.code, 0);
        assert!(rsp.error_samples.is_empty());
    }

    #[test]
    fn test_import_response_without_payload_is_parse_error() {
        let op = Operation {
            name: "op-2".to_string(),
            done: true,
            response: None,
        };

        assert!(matches!(
            op.import_response(),
            Err(RecError::ParseResponse { .. })
        ));
    }

    #[test]
    fn test_import_response_rejects_other_task_types() {
        let op = finished("type.googleapis.com/PredictResponse", json!({}));
        assert!(op.import_response().is_err());
    }

    #[test]
    fn test_missing_status_defaults_to_success_code() {
        let rsp: WriteResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(rsp.status().code, 0);
    }
}
