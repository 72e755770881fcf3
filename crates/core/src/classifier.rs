//! Builds the local and remote classifiers described by the configuration.

use crate::config::{AppConfig, LocalConfig, RemoteConfig};
use classifiers::local::{self, LocalClassifier};
use classifiers::openai::{OpenAiConfig, RemoteClassifier};
use classifiers::Classifier;
use std::sync::Arc;
use tracing::{info, warn};

/// Loads the configured local model. A model that fails to load leaves the
/// classifier unloaded, so every file falls back to "Other".
pub fn build_local(cfg: &LocalConfig) -> Arc<dyn Classifier> {
    if cfg.model.eq_ignore_ascii_case("none") {
        info!("Local model disabled.");
        return Arc::new(LocalClassifier::unloaded());
    }
    match local::load_model(&cfg.model) {
        Ok(model) => {
            info!("Loaded local model: {}", model.name());
            Arc::new(LocalClassifier::new(model))
        }
        Err(e) => {
            warn!(
                "Failed to load model {}: {} (known models: {:?})",
                cfg.model,
                e,
                local::KNOWN_MODELS
            );
            Arc::new(LocalClassifier::unloaded())
        }
    }
}

/// Remote classifier, or `None` when remote use is disabled, no credential is
/// available, or the endpoint is rejected.
pub fn build_remote(cfg: &RemoteConfig) -> Option<Arc<dyn Classifier>> {
    if !cfg.enabled {
        return None;
    }
    let Some(api_key) = cfg.resolved_api_key() else {
        warn!("Remote classification enabled but no API key configured; disabling it.");
        return None;
    };
    match RemoteClassifier::new(OpenAiConfig {
        api_key,
        base_url: cfg.base_url.clone(),
        chat_model: cfg.model.clone(),
    }) {
        Ok(remote) => Some(Arc::new(remote)),
        Err(e) => {
            warn!("Remote classification disabled: {e}");
            None
        }
    }
}

pub fn build_pair(cfg: &AppConfig) -> (Arc<dyn Classifier>, Option<Arc<dyn Classifier>>) {
    (build_local(&cfg.local), build_remote(&cfg.remote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_requires_enable_key_and_https() {
        let mut cfg = RemoteConfig {
            enabled: false,
            api_key: Some("sk-test".into()),
            ..RemoteConfig::default()
        };
        assert!(build_remote(&cfg).is_none());

        cfg.enabled = true;
        assert!(build_remote(&cfg).is_some());

        cfg.base_url = "http://localhost:8080/v1".into();
        assert!(build_remote(&cfg).is_none());
    }

    #[test]
    fn unknown_local_model_degrades_to_unloaded() {
        let clf = build_local(&LocalConfig {
            model: "facebook/bart-large-mnli".into(),
        });
        assert_eq!(clf.name(), "local");
        let clf = build_local(&LocalConfig::default());
        assert_eq!(clf.name(), "extension");
    }
}
