use crate::domain::model::*;
use crate::domain::options::CallOptions;
use crate::domain::ports::RecClient;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub request_id: Option<String>,
    pub timeout: Option<Duration>,
    pub at: tokio::time::Instant,
}

/// Client whose responses are queued up front. Empty queues answer with a success status,
/// except `get_operation` which answers with a task that is still running.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    pub write: Mutex<VecDeque<Result<WriteResponse>>>,
    pub import: Mutex<VecDeque<Result<OperationResponse>>>,
    pub get_operation: Mutex<VecDeque<Result<OperationResponse>>>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push_write(&self, rsp: Result<WriteResponse>) {
        self.write.lock().unwrap().push_back(rsp);
    }

    pub fn push_import(&self, rsp: Result<OperationResponse>) {
        self.import.lock().unwrap().push_back(rsp);
    }

    pub fn push_get_operation(&self, rsp: Result<OperationResponse>) {
        self.get_operation.lock().unwrap().push_back(rsp);
    }

    pub fn calls(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, method: &'static str, opts: &CallOptions) {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            request_id: opts.request_id.clone(),
            timeout: opts.timeout,
            at: tokio::time::Instant::now(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn status(code: i32) -> Status {
    Status::new(code, format!("code {}", code))
}

pub(crate) fn write_response(code: i32) -> WriteResponse {
    WriteResponse {
        status: status(code),
        errors: vec![],
    }
}

pub(crate) fn operation(name: &str, code: i32, done: bool) -> OperationResponse {
    let response = done.then(|| TaskResponse {
        type_url: "type.googleapis.com/ImportResponse".to_string(),
        value: serde_json::json!({
            "status": {"code": 0, "message": "success"},
            "error_samples": []
        }),
    });
    OperationResponse {
        status: status(code),
        operation: Operation {
            name: name.to_string(),
            done,
            response,
        },
    }
}

#[async_trait]
impl RecClient for ScriptedClient {
    async fn write_data(
        &self,
        _request: &WriteDataRequest,
        opts: CallOptions,
    ) -> Result<WriteResponse> {
        self.enter("write_data", &opts).await;
        let next = self.write.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(write_response(0)))
    }

    async fn import_data(
        &self,
        _request: &ImportDataRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse> {
        self.enter("import_data", &opts).await;
        let next = self.import.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(operation("op-default", 0, false)))
    }

    async fn done(&self, _request: &DoneRequest, opts: CallOptions) -> Result<DoneResponse> {
        self.enter("done", &opts).await;
        Ok(DoneResponse { status: status(0) })
    }

    async fn predict(
        &self,
        _request: &PredictRequest,
        opts: CallOptions,
    ) -> Result<PredictResponse> {
        self.enter("predict", &opts).await;
        Ok(PredictResponse {
            status: status(0),
            ..PredictResponse::default()
        })
    }

    async fn callback(
        &self,
        _request: &CallbackRequest,
        opts: CallOptions,
    ) -> Result<CallbackResponse> {
        self.enter("callback", &opts).await;
        Ok(CallbackResponse { status: status(0) })
    }

    async fn get_operation(
        &self,
        request: &GetOperationRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse> {
        self.enter("get_operation", &opts).await;
        let next = self.get_operation.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(operation(&request.name, 0, false)))
    }

    async fn list_operations(
        &self,
        _request: &ListOperationsRequest,
        opts: CallOptions,
    ) -> Result<ListOperationsResponse> {
        self.enter("list_operations", &opts).await;
        Ok(ListOperationsResponse {
            status: status(0),
            ..ListOperationsResponse::default()
        })
    }
}
