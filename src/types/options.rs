//! Console options and configuration
//!
//! This module contains the configuration shared by the connection manager,
//! the command channel and the session controller, including a builder and
//! environment loading.

use std::time::Duration;

use url::Url;

use super::task::Provider;
use crate::error::{ConsoleError, Result};
use crate::transport::connection::ReconnectPolicy;

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Model used when neither the task nor the environment names one
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Path of the agent stream relative to the backend root
pub const STREAM_PATH: &str = "/ws/agent-stream";

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

// ============================================================================
// Console Options
// ============================================================================

/// Options for the browser agent console
#[derive(Clone)]
pub struct ConsoleOptions {
    /// Root URL of the backend (`http` or `https`)
    pub base_url: Url,
    /// Default model for tasks that do not name one
    pub model: String,
    /// Provider override for tasks that do not name one
    pub provider: Option<Provider>,
    /// `OpenAI` API key
    pub openai_api_key: Option<String>,
    /// Google API key, used for Gemini models
    pub google_api_key: Option<String>,
    /// Anthropic API key
    pub anthropic_api_key: Option<String>,
    /// Upper bound on every command round trip
    pub command_timeout: Duration,
    /// Reconnect policy of the agent stream
    pub reconnect: ReconnectPolicy,
    /// Keepalive ping interval; `None` disables pings
    pub keepalive: Option<Duration>,
    /// Default step limit
    pub max_steps: Option<u32>,
    /// Default headless mode
    pub headless: Option<bool>,
}

impl ConsoleOptions {
    /// Create a new builder for `ConsoleOptions`
    #[must_use]
    pub fn builder() -> ConsoleOptionsBuilder {
        ConsoleOptionsBuilder::default()
    }

    /// Load options from the process environment
    ///
    /// See [`ConsoleOptionsBuilder::from_env`] for the variables read.
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        ConsoleOptionsBuilder::from_env()?.build()
    }

    /// Resolve an endpoint path against the backend root
    ///
    /// # Errors
    /// Returns an error if the path cannot be joined onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ConsoleError::invalid_config(format!("bad endpoint '{path}': {e}")))
    }

    /// URL of the agent stream (`ws` for `http`, `wss` for `https`)
    ///
    /// # Errors
    /// Returns an error if the base URL scheme has no WebSocket counterpart.
    pub fn stream_url(&self) -> Result<Url> {
        let mut url = self.endpoint(STREAM_PATH)?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ConsoleError::invalid_config(format!(
                    "unsupported URL scheme '{other}'"
                )));
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            ConsoleError::invalid_config(format!("cannot derive stream URL from {}", self.base_url))
        })?;
        Ok(url)
    }

    /// Configured API key for a provider
    #[must_use]
    pub fn api_key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Gemini => self.google_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}

impl std::fmt::Debug for ConsoleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ConsoleOptions")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("google_api_key", &redact(&self.google_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("command_timeout", &self.command_timeout)
            .field("reconnect", &self.reconnect)
            .field("keepalive", &self.keepalive)
            .field("max_steps", &self.max_steps)
            .field("headless", &self.headless)
            .finish()
    }
}

// ============================================================================
// Builder for ConsoleOptions
// ============================================================================

/// Builder for `ConsoleOptions`
#[derive(Clone)]
pub struct ConsoleOptionsBuilder {
    base_url: String,
    model: String,
    provider: Option<Provider>,
    openai_api_key: Option<String>,
    google_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    command_timeout: Duration,
    reconnect: ReconnectPolicy,
    keepalive: Option<Duration>,
    max_steps: Option<u32>,
    headless: Option<bool>,
}

impl Default for ConsoleOptionsBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            openai_api_key: None,
            google_api_key: None,
            anthropic_api_key: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            keepalive: Some(DEFAULT_KEEPALIVE),
            max_steps: None,
            headless: None,
        }
    }
}

impl ConsoleOptionsBuilder {
    /// Start a builder from the process environment
    ///
    /// Reads `AGENT_CONSOLE_URL` (or `HOST` and `PORT`), `DEFAULT_MODEL`,
    /// `OPENAI_API_KEY`, `GOOGLE_API_KEY`, `ANTHROPIC_API_KEY` and
    /// `AGENT_COMMAND_TIMEOUT_SECS`. Unset and blank variables keep the
    /// defaults.
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Start a builder from an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::default();

        if let Some(url) = var("AGENT_CONSOLE_URL") {
            builder = builder.base_url(url);
        } else if var("HOST").is_some() || var("PORT").is_some() {
            let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
            // The backend binds 0.0.0.0; connect through loopback instead.
            let host = if host == "0.0.0.0" {
                "127.0.0.1".to_string()
            } else {
                host
            };
            let port = var("PORT").unwrap_or_else(|| "8000".to_string());
            builder = builder.base_url(format!("http://{host}:{port}"));
        }

        if let Some(model) = var("DEFAULT_MODEL") {
            builder = builder.model(model);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            builder = builder.api_key(Provider::OpenAi, key);
        }
        if let Some(key) = var("GOOGLE_API_KEY") {
            builder = builder.api_key(Provider::Gemini, key);
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            builder = builder.api_key(Provider::Anthropic, key);
        }
        if let Some(secs) = var("AGENT_COMMAND_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ConsoleError::invalid_config(format!(
                    "AGENT_COMMAND_TIMEOUT_SECS must be a whole number of seconds, got '{secs}'"
                ))
            })?;
            builder = builder.command_timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Set the backend root URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the default provider
    #[must_use]
    pub const fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the API key for a provider
    #[must_use]
    pub fn api_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match provider {
            Provider::OpenAi => self.openai_api_key = key,
            Provider::Gemini => self.google_api_key = key,
            Provider::Anthropic => self.anthropic_api_key = key,
        }
        self
    }

    /// Set the command timeout
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the reconnect policy
    #[must_use]
    pub const fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the keepalive interval; `None` disables pings
    #[must_use]
    pub const fn keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive = interval;
        self
    }

    /// Set the default step limit
    #[must_use]
    pub const fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the default headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Build the options
    ///
    /// # Errors
    /// Returns an error if the base URL is not an absolute `http(s)` URL or
    /// a duration is zero.
    pub fn build(self) -> Result<ConsoleOptions> {
        let base_url = Url::parse(self.base_url.trim()).map_err(|e| {
            ConsoleError::invalid_config(format!("invalid base URL '{}': {e}", self.base_url))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConsoleError::invalid_config(format!(
                "base URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }
        if self.command_timeout.is_zero() {
            return Err(ConsoleError::invalid_config("command timeout must be non-zero"));
        }
        if self.keepalive.is_some_and(|k| k.is_zero()) {
            return Err(ConsoleError::invalid_config("keepalive interval must be non-zero"));
        }
        if self.model.trim().is_empty() {
            return Err(ConsoleError::invalid_config("model must not be empty"));
        }

        Ok(ConsoleOptions {
            base_url,
            model: self.model,
            provider: self.provider,
            openai_api_key: self.openai_api_key,
            google_api_key: self.google_api_key,
            anthropic_api_key: self.anthropic_api_key,
            command_timeout: self.command_timeout,
            reconnect: self.reconnect,
            keepalive: self.keepalive,
            max_steps: self.max_steps,
            headless: self.headless,
        })
    }
}
