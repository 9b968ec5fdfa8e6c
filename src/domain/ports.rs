use crate::domain::model::{
    CallbackRequest, CallbackResponse, DoneRequest, DoneResponse, GetOperationRequest,
    ImportDataRequest, ListOperationsRequest, ListOperationsResponse, OperationResponse,
    PredictRequest, PredictResponse, WriteDataRequest, WriteResponse,
};
use crate::domain::options::CallOptions;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Call surface of the recommendation service client.
///
/// Implementations report transport failures as `RecError::Net` so that callers can tell
/// them apart from business failures; everything else about the wire is up to them.
#[async_trait]
pub trait RecClient: Send + Sync {
    /// Real-time ingestion. At most 100 records per request.
    async fn write_data(&self, request: &WriteDataRequest, opts: CallOptions)
        -> Result<WriteResponse>;

    /// Daily batch ingestion. Returns a handle to the asynchronous import task.
    async fn import_data(
        &self,
        request: &ImportDataRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse>;

    async fn done(&self, request: &DoneRequest, opts: CallOptions) -> Result<DoneResponse>;

    async fn predict(&self, request: &PredictRequest, opts: CallOptions)
        -> Result<PredictResponse>;

    async fn callback(
        &self,
        request: &CallbackRequest,
        opts: CallOptions,
    ) -> Result<CallbackResponse>;

    async fn get_operation(
        &self,
        request: &GetOperationRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse>;

    async fn list_operations(
        &self,
        request: &ListOperationsRequest,
        opts: CallOptions,
    ) -> Result<ListOperationsResponse>;
}
