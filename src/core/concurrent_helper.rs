use crate::core::request_helper::RequestHelper;
use crate::domain::model::{CallbackRequest, DoneRequest, ImportDataRequest, WriteDataRequest};
use crate::domain::options::CallOptions;
use crate::domain::ports::RecClient;
use crate::domain::status::{is_success, is_upload_success};
use crate::utils::error::{RecError, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_WORKERS: usize = 5;

/// Requests that can be handed to the pool.
#[derive(Debug, Clone)]
pub enum AsyncRequest {
    Write(WriteDataRequest),
    Import(ImportDataRequest),
    Done(DoneRequest),
    Callback(CallbackRequest),
}

impl AsyncRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AsyncRequest::Write(_) => "write",
            AsyncRequest::Import(_) => "import",
            AsyncRequest::Done(_) => "done",
            AsyncRequest::Callback(_) => "callback",
        }
    }
}

struct Job {
    request: AsyncRequest,
    opts: CallOptions,
}

type JobQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

/// Fire-and-forget dispatcher: requests run on a fixed number of worker tasks and their
/// outcome is only logged.
pub struct ConcurrentHelper<C: RecClient + 'static> {
    helper: Arc<RequestHelper<C>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: RecClient + 'static> ConcurrentHelper<C> {
    /// Spawns `workers` tasks on the current tokio runtime.
    pub fn new(helper: Arc<RequestHelper<C>>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: JobQueue = Arc::new(tokio::sync::Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|id| tokio::spawn(run_worker(id, helper.clone(), queue.clone())))
            .collect();

        Self {
            helper,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        }
    }

    pub fn request_helper(&self) -> &Arc<RequestHelper<C>> {
        &self.helper
    }

    /// Queues the request and returns immediately.
    pub fn submit_request(&self, request: AsyncRequest, opts: CallOptions) -> Result<()> {
        let guard = self.sender.lock().map_err(|_| RecError::DispatcherClosed)?;
        let sender = guard.as_ref().ok_or(RecError::DispatcherClosed)?;

        let kind = request.kind();
        sender
            .send(Job { request, opts })
            .map_err(|_| RecError::DispatcherClosed)?;
        tracing::debug!("[ConcurrentHelper] queued {} request", kind);
        Ok(())
    }

    /// Stops accepting requests and waits until everything queued has been processed.
    pub async fn wait_and_shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }

        let handles = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("[ConcurrentHelper] worker panicked: {}", e);
            }
        }
    }
}

async fn run_worker<C: RecClient + 'static>(
    id: usize,
    helper: Arc<RequestHelper<C>>,
    queue: JobQueue,
) {
    loop {
        let job = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };
        dispatch(&helper, job).await;
    }
    tracing::debug!("[ConcurrentHelper] worker {} stopped", id);
}

async fn dispatch<C: RecClient>(helper: &RequestHelper<C>, job: Job) {
    let retry_times = helper.config().retry_times;
    let client = helper.client();
    let opts = job.opts;

    match job.request {
        AsyncRequest::Write(request) => {
            let result = helper
                .do_with_retry(|r, o| client.write_data(r, o), &request, &opts, retry_times)
                .await;
            match result {
                Ok(rsp) if is_upload_success(&rsp.status) => {
                    tracing::info!("[AsyncWrite] success, topic: {}", request.topic)
                }
                Ok(rsp) => tracing::error!(
                    "[AsyncWrite] fail, topic: {} rsp: {:?}",
                    request.topic,
                    rsp
                ),
                Err(e) => tracing::error!(
                    "[AsyncWrite] occur error, topic: {} msg: {}",
                    request.topic,
                    e
                ),
            }
        }
        AsyncRequest::Import(request) => {
            let result = helper
                .do_import(|r, o| client.import_data(r, o), &request, &opts, retry_times)
                .await;
            match result {
                Ok(rsp) if is_success(&rsp.status) => {
                    tracing::info!("[AsyncImport] success, topic: {}", request.topic)
                }
                Ok(rsp) => tracing::error!(
                    "[AsyncImport] fail, topic: {} rsp: {:?}",
                    request.topic,
                    rsp
                ),
                Err(e) => tracing::error!(
                    "[AsyncImport] occur error, topic: {} msg: {}",
                    request.topic,
                    e
                ),
            }
        }
        AsyncRequest::Done(request) => {
            let result = helper
                .do_with_retry(|r, o| client.done(r, o), &request, &opts, retry_times)
                .await;
            match result {
                Ok(rsp) if is_success(&rsp.status) => tracing::info!("[AsyncDone] success"),
                Ok(rsp) => tracing::error!("[AsyncDone] fail, rsp: {:?}", rsp),
                Err(e) => tracing::error!("[AsyncDone] occur error, msg: {}", e),
            }
        }
        AsyncRequest::Callback(request) => {
            let result = helper
                .do_with_retry(|r, o| client.callback(r, o), &request, &opts, retry_times)
                .await;
            match result {
                Ok(rsp) if is_success(&rsp.status) => tracing::info!("[AsyncCallback] success"),
                Ok(rsp) => tracing::error!("[AsyncCallback] fail, rsp: {:?}", rsp),
                Err(e) => tracing::error!("[AsyncCallback] occur error, msg: {}", e),
            }
        }
    }
}
