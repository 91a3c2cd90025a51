use std::{
    collections::HashSet,
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use ime_watcher_platform::Platform;
use ime_watcher_shared_types::{AppEvent, Config};
use tokio::sync::broadcast;
use tracing::warn;

pub mod detector;

pub use detector::LanguageChangeDetector;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn send(&self, event: AppEvent) {
        let _ = self.sender.send(event);
    }

    /// Resolves once `ShutdownRequested` goes through the bus. Subscribes
    /// immediately, so requests sent before the first poll are not missed.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::ShutdownRequested) | Err(broadcast::error::RecvError::Closed) => {
                        return;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "shutdown watcher lagged behind event bus");
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct ModuleContext {
    pub bus: EventBus,
    pub platform: Platform,
}

#[derive(Debug)]
pub struct ModuleHandle {
    join: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl ModuleHandle {
    pub fn new(join: tokio::task::JoinHandle<anyhow::Result<()>>) -> Self {
        Self { join }
    }

    pub async fn join(self) -> anyhow::Result<()> {
        self.join
            .await
            .context("module task panicked")?
            .context("module task returned error")
    }
}

#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start(&self, ctx: ModuleContext) -> anyhow::Result<ModuleHandle>;
}

/// A missing file is not an error: the watcher runs on defaults.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn is_module_loaded(config: &Config, name: &str) -> bool {
    let loaded: HashSet<&str> = config.modules.loaded.iter().map(|s| s.as_str()).collect();
    let disabled: HashSet<&str> =
        config.modules.disabled.iter().map(|s| s.as_str()).collect();
    loaded.contains(name) && !disabled.contains(name)
}

pub struct Runtime {
    pub config_path: PathBuf,
    pub config: Config,
    pub bus: EventBus,
    pub platform: Platform,
}

impl Runtime {
    pub fn new(config_path: PathBuf, config: Config) -> Self {
        Self {
            config_path,
            config,
            bus: EventBus::new(256),
            platform: Platform::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_loaded_unless_disabled() {
        let mut config = Config::default();
        assert!(is_module_loaded(&config, "language_notifier"));
        assert!(!is_module_loaded(&config, "layout_indicator"));

        config.modules.disabled.push("language_notifier".to_string());
        assert!(!is_module_loaded(&config, "language_notifier"));
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("ime_watcher_missing_config.toml");
        let _ = std::fs::remove_file(&path);

        let config = load_config(&path).unwrap();
        assert!(config.language_notifier.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join("ime_watcher_test_config.toml");
        std::fs::write(&path, "[tray]\nenabled = false\n").unwrap();

        let config = load_config(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(!config.tray.enabled);
        assert_eq!(config.logging.output, "console");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let path = std::env::temp_dir().join("ime_watcher_invalid_config.toml");
        std::fs::write(&path, "[tray\n").unwrap();

        let result = load_config(&path);
        let _ = std::fs::remove_file(&path);

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_requested_resolves_on_event() {
        let bus = EventBus::new(8);
        let shutdown = bus.shutdown_requested();

        bus.send(AppEvent::ForegroundChanged);
        bus.send(AppEvent::ShutdownRequested);

        shutdown.await;
    }
}
