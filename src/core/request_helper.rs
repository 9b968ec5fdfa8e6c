use crate::config::toml_config::RetryConfig;
use crate::domain::model::{GetOperationRequest, HasStatus, ImportResponse, OperationResponse};
use crate::domain::options::{new_request_id, CallOptions};
use crate::domain::ports::RecClient;
use crate::domain::status::{is_loss_operation, is_server_overload, is_upload_success};
use crate::utils::error::{RecError, Result};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for a single overload wait, whatever the retry settings.
pub const MAX_OVERLOAD_WAIT: Duration = Duration::from_secs(60);

/// Retry, overload backoff and import polling around the calls of a [`RecClient`].
///
/// Every call goes through [`RequestHelper::do_with_retry`], which only retries transient
/// network errors and keeps the request id stable so the server can drop duplicates.
/// Ingestion calls should additionally use [`RequestHelper::do_with_retry_although_overload`]
/// because the server refuses uploads that arrive too fast.
pub struct RequestHelper<C: RecClient> {
    client: Arc<C>,
    config: RetryConfig,
    jitter: fn() -> f64,
}

impl<C: RecClient> RequestHelper<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self::with_config(client, RetryConfig::default())
    }

    pub fn with_config(client: Arc<C>, config: RetryConfig) -> Self {
        Self {
            client,
            config,
            jitter: uniform_sample,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_jitter(mut self, jitter: fn() -> f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `call` up to `retry_times + 1` times, retrying only on `RecError::Net`.
    ///
    /// A request id is attached when `opts` has none, and the same id is sent on every
    /// attempt. A new id would make the server treat the retry as a new upload.
    pub async fn do_with_retry<'a, Req, Rsp, F, Fut>(
        &self,
        call: F,
        request: &'a Req,
        opts: &CallOptions,
        retry_times: i32,
    ) -> Result<Rsp>
    where
        F: Fn(&'a Req, CallOptions) -> Fut,
        Fut: Future<Output = Result<Rsp>>,
    {
        let opts = with_request_id(opts);
        let try_times = retry_times.max(0) as u32 + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match call(request, opts.clone()).await {
                Ok(rsp) => return Ok(rsp),
                Err(e) if e.is_retryable() => {
                    if attempt >= try_times {
                        tracing::error!(
                            request_id = opts.request_id.as_deref().unwrap_or_default(),
                            "[RequestRetry] give up after {} attempts, msg: {}",
                            attempt,
                            e
                        );
                        return Err(RecError::RetryExhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!(
                        request_id = opts.request_id.as_deref().unwrap_or_default(),
                        "[RequestRetry] attempt {}/{} failed, msg: {}",
                        attempt,
                        try_times,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`RequestHelper::do_with_retry`], but a response with the overload status is
    /// retried after a randomized wait that grows with every attempt. Gives up with
    /// `RecError::ServerOverload` after `retry_times + 1` overloaded responses.
    pub async fn do_with_retry_although_overload<'a, Req, Rsp, F, Fut>(
        &self,
        call: F,
        request: &'a Req,
        opts: &CallOptions,
        retry_times: i32,
    ) -> Result<Rsp>
    where
        F: Fn(&'a Req, CallOptions) -> Fut,
        Fut: Future<Output = Result<Rsp>>,
        Rsp: HasStatus,
    {
        let retry_times = retry_times.max(0);
        let opts = with_request_id(opts);

        for i in 0..=retry_times {
            let rsp = self
                .do_with_retry(&call, request, &opts, retry_times - i)
                .await?;
            if !is_server_overload(rsp.status()) {
                return Ok(rsp);
            }

            let wait = self.random_overload_wait_time(i);
            tracing::warn!(
                "[OverloadRetry] server overload, attempt {}/{}, wait {:?}",
                i + 1,
                retry_times + 1,
                wait
            );
            tokio::time::sleep(wait).await;
        }

        Err(RecError::ServerOverload)
    }

    /// Submits an import task and waits for its result.
    pub async fn do_import<'a, Req, F, Fut>(
        &self,
        call: F,
        request: &'a Req,
        opts: &CallOptions,
        retry_times: i32,
    ) -> Result<ImportResponse>
    where
        F: Fn(&'a Req, CallOptions) -> Fut,
        Fut: Future<Output = Result<OperationResponse>>,
    {
        let op_rsp = self
            .do_with_retry_although_overload(call, request, opts, retry_times)
            .await?;

        if !is_upload_success(&op_rsp.status) {
            tracing::error!(
                "[PollingImportResponse] server return error info, rsp: {:?}",
                op_rsp
            );
            return Err(RecError::biz(op_rsp.status.message));
        }

        self.polling_response(&op_rsp.operation.name).await
    }

    /// Polls the operation until it is done, lost, or the polling timeout elapses.
    pub async fn polling_response(&self, name: &str) -> Result<ImportResponse> {
        let started = Instant::now();
        let deadline = started + self.config.polling_timeout();

        while Instant::now() < deadline {
            if let Some(op_rsp) = self.get_polling_operation(name).await? {
                if is_loss_operation(&op_rsp.status) {
                    tracing::error!("[PollingResponse] operation loss, rsp: {:?}", op_rsp);
                    return Err(RecError::OperationLoss {
                        name: name.to_string(),
                    });
                }
                if op_rsp.operation.done {
                    tracing::debug!(
                        "[PollingResponse] operation {} done after {:?}",
                        name,
                        started.elapsed()
                    );
                    return op_rsp.operation.import_response().map_err(|e| {
                        tracing::error!("[PollingResponse] parse response fail, {}", e);
                        e
                    });
                }
            }
            tokio::time::sleep(self.config.polling_interval()).await;
        }

        tracing::error!(
            "[PollingResponse] timeout after {:?}",
            self.config.polling_timeout()
        );
        Err(RecError::PollingTimeout {
            name: name.to_string(),
            elapsed: started.elapsed(),
        })
    }

    // 網路錯誤不應中斷輪詢，只要沒有明確的終止訊號就繼續到逾時為止
    async fn get_polling_operation(&self, name: &str) -> Result<Option<OperationResponse>> {
        let request = GetOperationRequest {
            name: name.to_string(),
        };
        let opts = CallOptions::new().with_timeout(self.config.get_operation_timeout());

        match self.client.get_operation(&request, opts).await {
            Ok(rsp) => Ok(Some(rsp)),
            Err(e) if e.is_retryable() => {
                tracing::debug!("[PollingResponse] get operation fail, msg: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn random_overload_wait_time(&self, retried_times: i32) -> Duration {
        self.overload_wait_time(retried_times, (self.jitter)())
    }

    /// Wait before the next attempt after `retried_times` overloaded responses, for a
    /// `sample` in `[0, 1)`. Always within `[base, max_overload_wait_time(retried_times)]`.
    pub fn overload_wait_time(&self, retried_times: i32, sample: f64) -> Duration {
        let base = self.config.overload_retry_interval();
        if retried_times < 0 {
            return base;
        }
        let sample = sample.clamp(0.0, 1.0);
        scaled_wait(base, 1.0 + sample * self.growth(retried_times))
    }

    pub fn max_overload_wait_time(&self, retried_times: i32) -> Duration {
        let base = self.config.overload_retry_interval();
        if retried_times < 0 {
            return base;
        }
        scaled_wait(base, 1.0 + self.growth(retried_times))
    }

    fn growth(&self, retried_times: i32) -> f64 {
        (self.config.overload_increase_speed as f64).powi(retried_times)
    }
}

fn uniform_sample() -> f64 {
    rand::thread_rng().gen()
}

// 過大的重試設定會讓乘積溢位，一律收斂到上限
fn scaled_wait(base: Duration, factor: f64) -> Duration {
    let cap = MAX_OVERLOAD_WAIT.max(base);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor)
        .map(|wait| wait.min(cap))
        .unwrap_or(cap)
}

fn with_request_id(opts: &CallOptions) -> CallOptions {
    let mut opts = opts.clone();
    if opts.request_id.is_none() {
        opts.request_id = Some(new_request_id());
    }
    opts
}
