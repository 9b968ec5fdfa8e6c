use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use rec_ingest::config::cli::{
    CallbackArgs, CliArgs, Command, DoneArgs, GetOperationArgs, ListOperationsArgs, PredictArgs,
    UploadArgs,
};
use rec_ingest::domain::model::{
    CallbackRequest, DataRecord, DateConfig, DoneRequest, GetOperationRequest, ImportDataRequest,
    ListOperationsRequest, PredictRequest, WriteDataRequest,
};
use rec_ingest::domain::options::{
    daily_write_options, default_options, done_options, streaming_write_options, Stage,
};
use rec_ingest::domain::status::{is_success, is_upload_success};
use rec_ingest::utils::error::ErrorSeverity;
use rec_ingest::utils::validation::{validate_batch_size, Validate};
use rec_ingest::utils::logger;
use rec_ingest::{
    AsyncRequest, ConcurrentHelper, HttpRecClient, RecClient, RecConfig, RecError, RequestHelper,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

const MAX_WRITE_BATCH: usize = 100;
const MAX_IMPORT_BATCH: usize = 10_000;

type Helper = RequestHelper<HttpRecClient>;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose, args.log_format);
    tracing::info!("Starting rec-ingest CLI");
    tracing::debug!("CLI args: {:?}", args);

    if let Err(e) = run(args).await {
        let Some(rec_err) = e.downcast_ref::<RecError>() else {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        };

        tracing::error!(
            "❌ {:#} (Category: {:?}, Severity: {:?})",
            e,
            rec_err.category(),
            rec_err.severity()
        );
        eprintln!("❌ {}", rec_err.user_friendly_message());
        eprintln!("💡 建議: {}", rec_err.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match rec_err.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let mut config = RecConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(retry_times) = args.retry_times {
        config.retry.retry_times = retry_times;
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        return Err(e.into());
    }

    let client = HttpRecClient::from_config(&config.client)?;
    let helper = Arc::new(RequestHelper::with_config(
        Arc::new(client),
        config.retry.clone(),
    ));

    match args.command {
        Command::Write(upload) => write(&helper, &config, upload).await,
        Command::Import(upload) => import(&helper, &config, upload).await,
        Command::Done(done_args) => done(&helper, &config, done_args).await,
        Command::Predict(predict_args) => predict(&helper, &config, predict_args).await,
        Command::Callback(callback_args) => callback(&helper, &config, callback_args).await,
        Command::GetOperation(get_args) => get_operation(&helper, &config, get_args).await,
        Command::ListOperations(list_args) => list_operations(&helper, &config, list_args).await,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Submits a single request through the worker pool and waits for it to drain.
async fn submit_concurrently(
    helper: &Arc<Helper>,
    config: &RecConfig,
    request: AsyncRequest,
    opts: rec_ingest::domain::options::CallOptions,
) -> anyhow::Result<()> {
    let pool = ConcurrentHelper::new(helper.clone(), config.concurrency.workers);
    pool.submit_request(request, opts)?;
    pool.wait_and_shutdown().await;
    println!("✅ Request dispatched, see logs for the outcome");
    Ok(())
}

async fn write(helper: &Arc<Helper>, config: &RecConfig, args: UploadArgs) -> anyhow::Result<()> {
    let data: Vec<DataRecord> = read_json(&args.data).await?;
    validate_batch_size("data", data.len(), MAX_WRITE_BATCH)?;

    let request = WriteDataRequest {
        topic: args.topic,
        data,
    };
    let opts = match (args.stage, args.date) {
        (Some(stage), Some(date)) => daily_write_options(stage, date, config.timeouts.write()),
        (Some(stage), None) => streaming_write_options(config.timeouts.write()).with_stage(stage),
        (None, _) => streaming_write_options(config.timeouts.write()),
    };

    if args.concurrent {
        return submit_concurrently(helper, config, AsyncRequest::Write(request), opts).await;
    }

    let client = helper.client();
    let rsp = helper
        .do_with_retry_although_overload(
            |r, o| client.write_data(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_upload_success(&rsp.status) {
        tracing::error!("[Write] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    if !rsp.errors.is_empty() {
        tracing::warn!("[Write] {} records rejected", rsp.errors.len());
    }
    tracing::info!("[Write] success, topic: {}", request.topic);
    println!("✅ Wrote {} records to {}", request.data.len(), request.topic);
    Ok(())
}

fn import_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

async fn import(helper: &Arc<Helper>, config: &RecConfig, args: UploadArgs) -> anyhow::Result<()> {
    let data: Vec<DataRecord> = read_json(&args.data).await?;
    validate_batch_size("data", data.len(), MAX_IMPORT_BATCH)?;

    let date = import_date(args.date);
    let request = ImportDataRequest {
        topic: args.topic,
        data,
        date_config: DateConfig {
            date: format!("{}T00:00:00Z", date),
            is_end: false,
        },
    };
    let stage = args.stage.unwrap_or(Stage::IncrementalSyncDaily);
    let opts = daily_write_options(stage, date, config.timeouts.import());

    if args.concurrent {
        return submit_concurrently(helper, config, AsyncRequest::Import(request), opts).await;
    }

    let client = helper.client();
    let rsp = helper
        .do_import(
            |r, o| client.import_data(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_upload_success(&rsp.status) {
        tracing::error!("[Import] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    for sample in &rsp.error_samples {
        tracing::warn!("[Import] error sample: {} {}", sample.message, sample.data);
    }
    tracing::info!("[Import] success, topic: {}", request.topic);
    println!("✅ Imported {} records to {}", request.data.len(), request.topic);
    Ok(())
}

async fn done(helper: &Arc<Helper>, config: &RecConfig, args: DoneArgs) -> anyhow::Result<()> {
    let request = DoneRequest {
        topic: args.topic,
        dates: args.dates,
    };
    let stage = args.stage.unwrap_or(Stage::IncrementalSyncDaily);
    let opts = done_options(stage, config.timeouts.done());

    if args.concurrent {
        return submit_concurrently(helper, config, AsyncRequest::Done(request), opts).await;
    }

    let client = helper.client();
    let rsp = helper
        .do_with_retry(
            |r, o| client.done(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_success(&rsp.status) {
        tracing::error!("[Done] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    tracing::info!("[Done] success, topic: {}", request.topic);
    println!("✅ Marked {} day(s) done for {}", request.dates.len(), request.topic);
    Ok(())
}

async fn predict(
    helper: &Arc<Helper>,
    config: &RecConfig,
    args: PredictArgs,
) -> anyhow::Result<()> {
    let request: PredictRequest = read_json(&args.request).await?;
    let mut opts = default_options(config.timeouts.predict());
    if let Some(scene) = args.scene {
        opts = opts.with_scene(scene);
    }

    let client = helper.client();
    let rsp = helper
        .do_with_retry(
            |r, o| client.predict(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_success(&rsp.status) {
        tracing::error!("[Predict] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    tracing::info!(
        "[Predict] success, request_id: {}, {} items",
        rsp.request_id,
        rsp.value.items.len()
    );
    println!("{}", serde_json::to_string_pretty(&rsp)?);
    Ok(())
}

async fn callback(
    helper: &Arc<Helper>,
    config: &RecConfig,
    args: CallbackArgs,
) -> anyhow::Result<()> {
    let request: CallbackRequest = read_json(&args.request).await?;
    let opts = default_options(config.timeouts.callback());

    if args.concurrent {
        return submit_concurrently(helper, config, AsyncRequest::Callback(request), opts).await;
    }

    let client = helper.client();
    let rsp = helper
        .do_with_retry(
            |r, o| client.callback(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_success(&rsp.status) {
        tracing::error!("[Callback] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    tracing::info!("[Callback] success, predict_request_id: {}", request.predict_request_id);
    println!("✅ Callback reported");
    Ok(())
}

async fn get_operation(
    helper: &Arc<Helper>,
    config: &RecConfig,
    args: GetOperationArgs,
) -> anyhow::Result<()> {
    let request = GetOperationRequest { name: args.name };
    let opts = default_options(config.timeouts.get_operation());

    let client = helper.client();
    let rsp = helper
        .do_with_retry(
            |r, o| client.get_operation(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_success(&rsp.status) {
        tracing::error!("[GetOperation] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }
    println!("{}", serde_json::to_string_pretty(&rsp.operation)?);
    Ok(())
}

async fn list_operations(
    helper: &Arc<Helper>,
    config: &RecConfig,
    args: ListOperationsArgs,
) -> anyhow::Result<()> {
    let request = ListOperationsRequest {
        filter: args.filter,
        page_size: args.page_size,
        page_token: args.page_token,
    };
    let opts = default_options(config.timeouts.list_operations());

    let client = helper.client();
    let rsp = helper
        .do_with_retry(
            |r, o| client.list_operations(r, o),
            &request,
            &opts,
            config.retry.retry_times,
        )
        .await?;

    if !is_success(&rsp.status) {
        tracing::error!("[ListOperations] fail, rsp: {:?}", rsp);
        return Err(RecError::biz(rsp.status.message).into());
    }

    for operation in &rsp.operations {
        if !operation.done {
            println!("⏳ {} running", operation.name);
            continue;
        }
        match operation.import_response() {
            Ok(import_rsp) => println!(
                "✅ {} done, code: {}, {} error samples",
                operation.name,
                import_rsp.status.code,
                import_rsp.error_samples.len()
            ),
            Err(e) => tracing::warn!("[ListOperations] {} unreadable result: {}", operation.name, e),
        }
    }
    if !rsp.next_page_token.is_empty() {
        tracing::info!("[ListOperations] next_page_token: {}", rsp.next_page_token);
    }
    Ok(())
}
