use crate::config::toml_config::ClientConfig;
use crate::domain::model::*;
use crate::domain::options::CallOptions;
use crate::domain::ports::RecClient;
use crate::utils::error::{RecError, Result};
use crate::utils::validation;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

const DEFAULT_SCENE: &str = "default";

/// JSON-over-HTTP implementation of [`RecClient`].
///
/// Each operation is a `POST {scheme}://{host}/{tenant}/...` with the request as JSON body
/// and the response decoded from JSON. Timeouts and connection failures are reported as
/// `RecError::Net`, so the retry helpers treat them as transient.
#[derive(Debug, Clone)]
pub struct HttpRecClient {
    http: Client,
    base_url: String,
    tenant: String,
    default_headers: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone)]
pub struct HttpRecClientBuilder {
    tenant: Option<String>,
    tenant_id: Option<String>,
    project_id: Option<String>,
    token: Option<String>,
    scheme: Option<String>,
    host: Option<String>,
    headers: HashMap<String, String>,
}

impl HttpRecClientBuilder {
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn build(self) -> Result<HttpRecClient> {
        let tenant = required_field("tenant", self.tenant)?;
        let tenant_id = required_field("tenant_id", self.tenant_id)?;
        let host = required_field("host", self.host)?;
        let scheme = self.scheme.unwrap_or_else(|| "https".to_string());

        let base_url = format!("{}://{}", scheme, host);
        validation::validate_url("host", &base_url)?;

        let mut default_headers = vec![("Tenant-Id".to_string(), tenant_id)];
        if let Some(project_id) = self.project_id {
            default_headers.push(("Project-Id".to_string(), project_id));
        }
        if let Some(token) = self.token {
            default_headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        default_headers.extend(self.headers);

        Ok(HttpRecClient {
            http: Client::builder().build()?,
            base_url,
            tenant,
            default_headers,
        })
    }
}

fn required_field(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RecError::MissingConfigError {
            field: field.to_string(),
        }),
    }
}

impl HttpRecClient {
    pub fn builder() -> HttpRecClientBuilder {
        HttpRecClientBuilder::default()
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .tenant(&config.tenant)
            .tenant_id(&config.tenant_id)
            .scheme(&config.scheme)
            .host(&config.host);
        if let Some(project_id) = &config.project_id {
            builder = builder.project_id(project_id);
        }
        if let Some(token) = &config.token {
            builder = builder.token(token);
        }
        if let Some(headers) = &config.headers {
            builder = builder.headers(headers.clone());
        }
        builder.build()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.tenant, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B, opts: &CallOptions) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let mut request = self.http.post(&url).json(body).headers(self.headers_for(opts)?);
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!("POST {}", url);
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecError::biz(format!("http status {}, body: {}", status, body)));
        }

        // 讀取失敗是傳輸問題，解析失敗才是回應內容的問題
        let bytes = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RecError::biz(format!("decode response fail: {}", e)))
    }

    /// Later sources replace earlier ones: client defaults, caller headers, then option fields.
    fn headers_for(&self, opts: &CallOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in &opts.headers {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(request_id) = &opts.request_id {
            insert_header(&mut headers, "Request-Id", request_id)?;
        }
        if let Some(stage) = opts.stage {
            insert_header(&mut headers, "Stage", stage.as_str())?;
        }
        if let Some(date) = opts.data_date {
            insert_header(&mut headers, "Data-Date", &date.format("%Y-%m-%d").to_string())?;
        }
        if let Some(server_timeout) = opts.server_timeout {
            insert_header(
                &mut headers,
                "Server-Timeout-Ms",
                &server_timeout.as_millis().to_string(),
            )?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let invalid = |reason: String| RecError::InvalidConfigValueError {
        field: "headers".to_string(),
        value: name.to_string(),
        reason,
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}

/// Anything that went wrong on the wire is transient. Only a request that could not be
/// built is reported as is.
fn classify(e: reqwest::Error) -> RecError {
    if e.is_builder() {
        RecError::ApiError(e)
    } else if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        RecError::net(e.to_string())
    } else if e.is_decode() || e.is_redirect() {
        RecError::biz(e.to_string())
    } else {
        RecError::net(e.to_string())
    }
}

#[async_trait]
impl RecClient for HttpRecClient {
    async fn write_data(
        &self,
        request: &WriteDataRequest,
        opts: CallOptions,
    ) -> Result<WriteResponse> {
        let path = format!("data/{}/write", request.topic);
        self.post(&path, &request.data, &opts).await
    }

    async fn import_data(
        &self,
        request: &ImportDataRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse> {
        let path = format!("data/{}/import", request.topic);
        self.post(&path, request, &opts).await
    }

    async fn done(&self, request: &DoneRequest, opts: CallOptions) -> Result<DoneResponse> {
        let path = format!("data/{}/done", request.topic);
        self.post(&path, &request.dates, &opts).await
    }

    async fn predict(
        &self,
        request: &PredictRequest,
        opts: CallOptions,
    ) -> Result<PredictResponse> {
        let scene = opts
            .scene
            .clone()
            .or_else(|| Some(request.scene.scene_name.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SCENE.to_string());
        self.post(&format!("{}/predict", scene), request, &opts).await
    }

    async fn callback(
        &self,
        request: &CallbackRequest,
        opts: CallOptions,
    ) -> Result<CallbackResponse> {
        let scene = if request.scene.is_empty() {
            DEFAULT_SCENE
        } else {
            request.scene.as_str()
        };
        self.post(&format!("{}/callback", scene), request, &opts).await
    }

    async fn get_operation(
        &self,
        request: &GetOperationRequest,
        opts: CallOptions,
    ) -> Result<OperationResponse> {
        self.post("operations/get", request, &opts).await
    }

    async fn list_operations(
        &self,
        request: &ListOperationsRequest,
        opts: CallOptions,
    ) -> Result<ListOperationsResponse> {
        self.post("operations/list", request, &opts).await
    }
}
