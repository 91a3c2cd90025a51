use ime_watcher_shared_types::LanguageSample;
use tracing::debug;

/// Receives the effective input language each time it changes.
pub trait NotificationSink: Send + Sync {
    fn language_changed(&self, sample: LanguageSample, display_name: &str) -> anyhow::Result<()>;
}

/// The external keyboard that should follow the input language.
///
/// No device protocol exists yet, so this only records that a notification
/// would have been sent.
#[derive(Debug, Default, Clone)]
pub struct KeyboardDeviceSink;

impl NotificationSink for KeyboardDeviceSink {
    fn language_changed(&self, sample: LanguageSample, display_name: &str) -> anyhow::Result<()> {
        debug!(
            lang_id = sample.primary_id(),
            language = display_name,
            "keyboard device notification not implemented",
        );
        Ok(())
    }
}
