//! Streaming client for an Ollama-compatible `/api/generate` endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{error, info, warn};

use super::prompt::{build_system_prompt, build_user_prompt};
use super::stream::StreamParser;
use crate::config::Config;
use crate::error::ClientError;
use crate::settings::{Settings, DEFAULT_MODEL};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Connection and streaming knobs.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Tried in order until one answers with a success status
    pub endpoints: Vec<String>,
    pub progress_throttle: Duration,
    pub max_content_chars: usize,
    pub connect_timeout: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoints: config.ollama_endpoints.clone(),
            progress_throttle: config.progress_throttle(),
            max_content_chars: config.max_content_chars,
            connect_timeout: config.connect_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    options: Arc<ClientOptions>,
}

impl OllamaClient {
    /// Only the connect phase has a timeout; generation may take as long as
    /// the model needs.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            options: Arc::new(options),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Stream a summary of `text`, calling `on_progress(partial, done)` as it
    /// grows. Returns the trimmed summary, which may be empty.
    ///
    /// Only a failure to open any endpoint is an error. A stream that breaks
    /// halfway is drained and whatever arrived is returned.
    pub async fn summarize<F>(
        &self,
        text: &str,
        subject: &str,
        settings: &Settings,
        mut on_progress: F,
    ) -> Result<String, ClientError>
    where
        F: FnMut(&str, bool) + Send,
    {
        let model = match settings.model_name.trim() {
            "" => DEFAULT_MODEL,
            name => name,
        };
        let system = build_system_prompt(&settings.system_prompt_override, Local::now().fixed_offset());
        let prompt = build_user_prompt(subject, text, self.options.max_content_chars);

        let request = GenerateRequest {
            model,
            system: &system,
            prompt: &prompt,
            stream: true,
        };

        let mut parser = StreamParser::new(self.options.progress_throttle);
        let response = self.open_stream(&request).await?;
        parser.open();

        let mut body = response.bytes_stream();
        while let Some(next) = body.next().await {
            match next {
                Ok(chunk) => parser.feed(&chunk, &mut on_progress),
                Err(e) => {
                    warn!(
                        model = model,
                        received_length = parser.summary().len(),
                        error = %e,
                        "ollama_stream_interrupted"
                    );
                    break;
                }
            }
        }

        let summary = parser.finish(&mut on_progress);

        info!(
            model = model,
            prompt_length = prompt.len(),
            summary_length = summary.len(),
            "ollama_summary_complete"
        );

        Ok(summary)
    }

    async fn open_stream(&self, request: &GenerateRequest<'_>) -> Result<Response, ClientError> {
        let mut last_error = ClientError::NoEndpoints;

        for url in &self.options.endpoints {
            info!(url = %url, model = request.model, "ollama_request_starting");

            match self.http.post(url).json(request).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(url = %url, status_code = resp.status().as_u16(), "ollama_stream_opened");
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    warn!(url = %url, status_code = status, "ollama_endpoint_rejected");
                    last_error = ClientError::Status {
                        url: url.clone(),
                        status,
                    };
                }
                Err(e) => {
                    warn!(
                        url = %url,
                        is_connect = e.is_connect(),
                        is_timeout = e.is_timeout(),
                        error = %e,
                        "ollama_endpoint_unreachable"
                    );
                    last_error = ClientError::Transport {
                        url: url.clone(),
                        source: e,
                    };
                }
            }
        }

        error!(
            endpoint_count = self.options.endpoints.len(),
            error = %last_error,
            "ollama_all_endpoints_failed"
        );
        Err(last_error)
    }
}
