//! Mailsum CLI - summarize one raw RFC 5322 message file.
//!
//! Partial summaries stream to stderr while the model generates; the final
//! result (or a sentinel such as "(no body to summarize)") goes to stdout.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailsum::{Config, ProgressSink, SharedSettings, SummaryService};

#[derive(Parser)]
#[command(name = "mailsum", version, about = "Summarize an email with a local model")]
struct Cli {
    /// Raw message file (.eml)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Model tag, overrides MODEL_NAME
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt, overrides SYSTEM_PROMPT
    #[arg(long, value_name = "PROMPT")]
    system_prompt: Option<String>,

    /// Generate endpoint, repeatable; overrides OLLAMA_ENDPOINTS
    #[arg(short, long = "endpoint", value_name = "URL")]
    endpoints: Vec<String>,

    /// Cache key when the message has no Message-Id
    #[arg(long)]
    message_id: Option<String>,
}

/// Writes the growing summary to stderr, one suffix at a time.
struct StderrSink {
    printed: Mutex<String>,
}

impl ProgressSink for StderrSink {
    fn on_progress(&self, _key: &str, partial: &str, done: bool) {
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stderr = std::io::stderr().lock();

        let suffix = match partial.strip_prefix(printed.as_str()) {
            Some(suffix) => suffix,
            None => {
                let _ = writeln!(stderr);
                partial
            }
        };
        let _ = write!(stderr, "{suffix}");
        if done {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();

        printed.clear();
        printed.push_str(partial);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the summary, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = Config::from_env();
    if !cli.endpoints.is_empty() {
        config.ollama_endpoints = cli.endpoints;
    }
    if let Some(model) = cli.model.filter(|m| !m.trim().is_empty()) {
        config.initial_settings.model_name = model.trim().to_string();
    }
    if let Some(prompt) = cli.system_prompt {
        config.initial_settings.system_prompt_override = prompt;
    }

    tracing::info!(
        file = %cli.file.display(),
        endpoints = ?config.ollama_endpoints,
        model = %config.initial_settings.model_name,
        "cli_starting"
    );

    let raw = std::fs::read(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    let settings = SharedSettings::new(config.initial_settings.clone());
    let service = SummaryService::from_config(&config, Arc::new(settings))?;
    let sink = Arc::new(StderrSink {
        printed: Mutex::new(String::new()),
    });

    let key = cli
        .message_id
        .unwrap_or_else(|| cli.file.display().to_string());
    let message = mailsum::parse_raw_message(&raw)?;
    let key = message.message_id.clone().unwrap_or(key);
    let subject = message.subject.unwrap_or_default();

    let result = service.summarize(&key, message.root, &subject, sink).await;

    println!("{result}");

    Ok(())
}
