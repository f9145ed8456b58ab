//! User settings consumed by the summarizer.
//!
//! Settings belong to an external collaborator and may change at any time,
//! so the service asks its [`SettingsSource`] for a fresh snapshot at the
//! start of every computation.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

/// Snapshot of the user-facing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Global on/off switch
    pub enabled: bool,
    /// Ollama model tag
    pub model_name: String,
    /// Replacement for the built-in system prompt; empty means built-in
    pub system_prompt_override: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_name: DEFAULT_MODEL.to_string(),
            system_prompt_override: String::new(),
        }
    }
}

/// Partial settings change, as sent by a settings editor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub model_name: Option<String>,
    pub system_prompt: Option<String>,
}

impl Settings {
    /// Apply a partial update. Blank model names are ignored.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(model) = update.model_name {
            let model = model.trim();
            if !model.is_empty() {
                self.model_name = model.to_string();
            }
        }
        if let Some(prompt) = update.system_prompt {
            self.system_prompt_override = prompt;
        }
    }
}

/// Source of the latest settings.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Settings;
}

/// In-memory settings shared between the service and whoever edits them.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Apply an update and return the resulting settings.
    pub fn update(&self, update: SettingsUpdate) -> Settings {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.apply(update);

        info!(
            enabled = guard.enabled,
            model = %guard.model_name,
            prompt_override_length = guard.system_prompt_override.len(),
            "settings_updated"
        );

        guard.clone()
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
