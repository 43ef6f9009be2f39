//! HTTP command channel backed by `reqwest`

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{AgentStatusReport, CommandChannel, CommandKind, StartAck};
use crate::VERSION;
use crate::error::{ConsoleError, Result};
use crate::types::options::ConsoleOptions;
use crate::types::task::{StartRequest, UploadFile, UploadedDocument};

const START_PATH: &str = "/api/v1/agent/start";
const PAUSE_PATH: &str = "/api/v1/agent/pause";
const RESUME_PATH: &str = "/api/v1/agent/resume";
const STOP_PATH: &str = "/api/v1/agent/stop";
const STATUS_PATH: &str = "/api/v1/agent/status";
const UPLOAD_PATH: &str = "/api/v1/upload";

/// Fields checked, in order, for an error message in a JSON error body
const ERROR_FIELDS: &[&str] = &["detail", "message", "error"];

/// Command channel speaking the backend's REST API
#[derive(Debug, Clone)]
pub struct HttpCommandChannel {
    client: Client,
    start_url: Url,
    pause_url: Url,
    resume_url: Url,
    stop_url: Url,
    status_url: Url,
    upload_url: Url,
}

impl HttpCommandChannel {
    /// Create a channel for the configured backend
    ///
    /// # Errors
    /// Returns error if an endpoint URL cannot be derived or the HTTP client
    /// cannot be built
    pub fn new(options: &ConsoleOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.command_timeout)
            .user_agent(format!("browser-agent-console/{VERSION}"))
            .build()
            .map_err(|e| ConsoleError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            start_url: options.endpoint(START_PATH)?,
            pause_url: options.endpoint(PAUSE_PATH)?,
            resume_url: options.endpoint(RESUME_PATH)?,
            stop_url: options.endpoint(STOP_PATH)?,
            status_url: options.endpoint(STATUS_PATH)?,
            upload_url: options.endpoint(UPLOAD_PATH)?,
        })
    }

    /// Fetch the backend's current status report
    ///
    /// # Errors
    /// Returns error if the request fails or the body is not a status report
    pub async fn status(&self) -> Result<AgentStatusReport> {
        let response = self
            .client
            .get(self.status_url.clone())
            .send()
            .await
            .map_err(|e| request_error("status", &e))?;
        let response = check_status("status", response).await?;
        response
            .json::<AgentStatusReport>()
            .await
            .map_err(|e| ConsoleError::command("status", None, format!("unexpected response: {e}")))
    }

    async fn post_empty(&self, kind: CommandKind, url: &Url) -> Result<()> {
        log::debug!("POST {url}");
        let response = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| request_error(kind.as_str(), &e))?;
        check_status(kind.as_str(), response).await?;
        Ok(())
    }
}

impl CommandChannel for HttpCommandChannel {
    async fn start(&self, request: &StartRequest) -> Result<StartAck> {
        log::debug!("POST {} {request:?}", self.start_url);
        let response = self
            .client
            .post(self.start_url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| request_error("start", &e))?;
        let response = check_status("start", response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| request_error("start", &e))?;
        if body.trim().is_empty() {
            return Ok(StartAck::default());
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            log::warn!("Start accepted with an unreadable body: {e}");
            StartAck::default()
        }))
    }

    async fn pause(&self) -> Result<()> {
        self.post_empty(CommandKind::Pause, &self.pause_url).await
    }

    async fn resume(&self) -> Result<()> {
        self.post_empty(CommandKind::Resume, &self.resume_url).await
    }

    async fn stop(&self) -> Result<()> {
        self.post_empty(CommandKind::Stop, &self.stop_url).await
    }

    async fn upload(&self, file: UploadFile) -> Result<UploadedDocument> {
        log::debug!("POST {} ({}, {} bytes)", self.upload_url, file.filename, file.bytes.len());
        let mut part = Part::bytes(file.bytes).file_name(file.filename);
        if let Some(content_type) = file.content_type {
            part = part.mime_str(&content_type).map_err(|e| {
                ConsoleError::command("upload", None, format!("invalid content type: {e}"))
            })?;
        }
        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| request_error("upload", &e))?;
        let status = response.status();
        let response = check_status("upload", response).await?;
        response.json::<UploadedDocument>().await.map_err(|e| {
            ConsoleError::command("upload", Some(status.as_u16()), format!("unexpected response: {e}"))
        })
    }
}

fn request_error(operation: &str, error: &reqwest::Error) -> ConsoleError {
    if error.is_timeout() {
        ConsoleError::timeout(format!("{operation} request timed out"))
    } else {
        ConsoleError::command(
            operation,
            error.status().map(|s| s.as_u16()),
            error.to_string(),
        )
    }
}

async fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ConsoleError::command(
        operation,
        Some(status.as_u16()),
        error_message(&body, status),
    ))
}

/// Pull the most useful message out of an error body
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ERROR_FIELDS {
            match fields.get(*key) {
                Some(Value::String(message)) => return message.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
