//! Provider router — builds the configured LLM provider.
//!
//! Every supported backend speaks the OpenAI-compatible streaming protocol,
//! so a provider is a preset name plus a base URL and a bearer key.

use crate::openai_compat::OpenAiCompatProvider;
use std::collections::HashMap;
use std::sync::Arc;
use streambot_core::error::ProviderError;
use streambot_core::provider::Provider;

/// Holds named providers and knows which one is the default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from configuration.
///
/// Fails when the provider has no known base URL and none is configured,
/// or when a hosted provider has no API key.
pub fn build_from_config(config: &streambot_config::AppConfig) -> Result<ProviderRouter, ProviderError> {
    let name = config.provider.as_str();
    let base_url = match (&config.base_url, preset_base_url(name)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "provider '{name}' needs a base_url"
            )));
        }
    };

    let api_key = match (&config.api_key, name) {
        (Some(key), _) => key.clone(),
        // Local servers accept any key
        (None, "ollama") => "ollama".to_string(),
        (None, _) if config.base_url.is_some() => String::new(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for '{name}' (set STREAMBOT_API_KEY)"
            )));
        }
    };

    let mut router = ProviderRouter::new(name);
    router.register(
        name,
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)),
    );
    Ok(router)
}

/// Default base URL for the well-known presets.
fn preset_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}
