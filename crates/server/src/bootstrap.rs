use std::sync::Arc;
use std::time::Duration;

use coverbot_core::config::{AppConfig, ConfigError};
use coverbot_core::dialog::DialogService;
use coverbot_core::extraction::SeededExtractor;
use coverbot_core::policy::PolicyGenerator;
use coverbot_core::session::InMemorySessionStore;
use coverbot_core::storage::{DocumentStore, FsDocumentStore, StorageError};
use coverbot_genai::client::{GeminiClient, LlmError};
use coverbot_genai::phrasing::LlmPhraser;
use coverbot_telegram::api::{HttpBotApi, TelegramSink, TransportError};
use coverbot_telegram::poller::{ReconnectPolicy, UpdatePoller};
use thiserror::Error;
use tracing::{info, warn};

use crate::dispatch::EventDispatcher;

pub struct Application {
    pub config: AppConfig,
    pub poller: UpdatePoller,
    pub documents: Arc<dyn DocumentStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("document storage setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("generative client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("telegram transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let documents: Arc<dyn DocumentStore> =
        Arc::new(FsDocumentStore::new(config.storage.root.clone())?);
    info!(
        event_name = "system.bootstrap.storage_ready",
        root = %config.storage.root.display(),
        "document storage ready"
    );

    let sessions = Arc::new(InMemorySessionStore::default());
    let extractor = Arc::new(SeededExtractor);
    let policies = PolicyGenerator::new(documents.clone());
    let phraser = Arc::new(LlmPhraser::new(GeminiClient::new(&config.genai)?));

    let transport = Arc::new(HttpBotApi::new(
        &config.telegram.bot_token,
        config.telegram.poll_timeout_secs,
    )?);
    let sink = Arc::new(TelegramSink::new(transport.clone()));

    let service = Arc::new(DialogService::new(
        sessions,
        documents.clone(),
        extractor,
        policies,
        phraser,
        sink,
    ));
    let dispatcher = Arc::new(EventDispatcher::new(service, transport.clone()));
    let poller = UpdatePoller::new(transport, dispatcher, ReconnectPolicy::default());

    info!(event_name = "system.bootstrap.complete", "application bootstrap complete");
    Ok(Application { config, poller, documents })
}

/// Periodically removes stored documents older than the retention window.
pub fn spawn_retention_sweep(
    documents: Arc<dyn DocumentStore>,
    retention_hours: u64,
    sweep_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    let ttl = Duration::from_secs(retention_hours * 3600);
    let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval_secs));
    tokio::spawn(async move {
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            match documents.purge_older_than(ttl).await {
                Ok(removed) if removed > 0 => {
                    info!(
                        event_name = "storage.retention_sweep",
                        removed,
                        retention_hours,
                        "purged expired documents"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        event_name = "storage.retention_sweep_failed",
                        error = %error,
                        "retention sweep failed; will retry on next interval"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use coverbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(options)?;
        bootstrap_with_config(config).await
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_tokens() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                storage_root: Some(temp.path().join("docs")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("missing tokens must be fatal");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_the_full_pipeline_with_valid_overrides() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage_root = temp.path().join("docs");
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("123456:test-token".to_string()),
                genai_api_key: Some("test-api-key".to_string()),
                storage_root: Some(storage_root.clone()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert!(storage_root.is_dir(), "bootstrap should create the storage root");
        assert_eq!(app.config.storage.root, storage_root);
    }
}
