//! Task requests, uploads and the start command wire format

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::options::ConsoleOptions;
use crate::error::{ConsoleError, Result};

// ============================================================================
// Provider
// ============================================================================

/// LLM provider the backend should drive the agent with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// `OpenAI` chat models
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini models
    Gemini,
    /// Anthropic models
    Anthropic,
}

impl Provider {
    /// Infer the provider from a model identifier
    #[must_use]
    pub fn from_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.starts_with("gemini") {
            Self::Gemini
        } else if model.starts_with("claude") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConsoleError::invalid_config(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Uploads
// ============================================================================

/// File to send to the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name reported to the backend
    pub filename: String,
    /// MIME type, when known
    pub content_type: Option<String>,
    /// File contents
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Create an upload from in-memory bytes
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename).map(str::to_string);
        Self {
            filename,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Override the MIME type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(filename, bytes))
    }
}

/// Document returned by the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Name of the uploaded file
    pub filename: String,
    /// MIME type reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Text extracted by the backend
    #[serde(default, alias = "content")]
    pub text_content: String,
}

fn guess_content_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    })
}

/// Encode an image as a `data:` URL for the task context
#[must_use]
pub fn image_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

// ============================================================================
// Task Request
// ============================================================================

/// Optional context sent with a task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskContext {
    /// Uploaded document to work from
    pub document: Option<UploadedDocument>,
    /// Image as a data URL
    pub image: Option<String>,
    /// Free-form fields (a starting `url`, hints, ...)
    pub extra: Map<String, Value>,
}

impl TaskContext {
    /// Whether nothing would be sent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.is_none() && self.image.is_none() && self.extra.is_empty()
    }
}

/// Task submitted through `SessionController::start`
#[derive(Clone, Default, PartialEq)]
pub struct TaskRequest {
    /// Natural-language task
    pub task: String,
    /// Model identifier; falls back to the configured default
    pub model: Option<String>,
    /// Provider; inferred from the model when absent
    pub provider: Option<Provider>,
    /// API key; falls back to the configured key for the provider
    pub api_key: Option<String>,
    /// Optional context
    pub context: TaskContext,
    /// Step limit for the agent
    pub max_steps: Option<u32>,
    /// Run the browser headless
    pub headless: Option<bool>,
}

impl std::fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRequest")
            .field("task", &self.task)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("context", &self.context)
            .field("max_steps", &self.max_steps)
            .field("headless", &self.headless)
            .finish()
    }
}

impl TaskRequest {
    /// Create a request for the given task text
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the provider
    #[must_use]
    pub const fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the API key
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Attach an uploaded document
    #[must_use]
    pub fn document(mut self, document: UploadedDocument) -> Self {
        self.context.document = Some(document);
        self
    }

    /// Attach an image data URL
    #[must_use]
    pub fn image(mut self, data_url: impl Into<String>) -> Self {
        self.context.image = Some(data_url.into());
        self
    }

    /// Add a free-form context field
    #[must_use]
    pub fn context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.extra.insert(key.into(), value.into());
        self
    }

    /// Set the step limit
    #[must_use]
    pub const fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }
}

// ============================================================================
// Wire Format
// ============================================================================

/// JSON body of `POST /api/v1/agent/start`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Task text
    pub task: String,
    /// Model identifier
    pub model: String,
    /// Provider name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<Provider>,
    /// API key for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Context object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Image data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Step limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Headless mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
}

impl std::fmt::Debug for StartRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartRequest")
            .field("task", &self.task)
            .field("model", &self.model)
            .field("llm_provider", &self.llm_provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("context", &self.context)
            .field("image", &self.image.as_ref().map(String::len))
            .field("max_steps", &self.max_steps)
            .field("headless", &self.headless)
            .finish()
    }
}

impl StartRequest {
    /// Build the wire request from a task, the configured defaults and a
    /// document staged by an earlier upload
    ///
    /// A document already present on the task takes precedence over the
    /// staged one.
    #[must_use]
    pub fn resolve(
        task: TaskRequest,
        options: &ConsoleOptions,
        staged: Option<&UploadedDocument>,
    ) -> Self {
        let model = task.model.unwrap_or_else(|| options.model.clone());
        let provider = task
            .provider
            .or(options.provider)
            .unwrap_or_else(|| Provider::from_model(&model));
        let api_key = task
            .api_key
            .or_else(|| options.api_key_for(provider).map(str::to_string));

        let TaskContext {
            document,
            image,
            extra,
        } = task.context;
        let mut context = extra;
        if let Some(doc) = document.as_ref().or(staged) {
            context.insert("document".to_string(), document_value(doc));
        }

        Self {
            task: task.task,
            model,
            llm_provider: Some(provider),
            api_key,
            context: if context.is_empty() { None } else { Some(context) },
            image,
            max_steps: task.max_steps.or(options.max_steps),
            headless: task.headless.or(options.headless),
        }
    }
}

fn document_value(doc: &UploadedDocument) -> Value {
    let mut fields = Map::new();
    fields.insert("filename".to_string(), Value::String(doc.filename.clone()));
    if let Some(content_type) = &doc.content_type {
        fields.insert(
            "content_type".to_string(),
            Value::String(content_type.clone()),
        );
    }
    fields.insert(
        "text_content".to_string(),
        Value::String(doc.text_content.clone()),
    );
    Value::Object(fields)
}
