use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ime_watcher_core::{LanguageChangeDetector, Module, ModuleContext, ModuleHandle};
use ime_watcher_platform::Platform;
use ime_watcher_shared_types::{config::LanguageNotifierConfig, AppEvent, LanguageSample};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, trace, warn};

pub mod sink;

pub use sink::{KeyboardDeviceSink, NotificationSink};

pub struct LanguageNotifierModule {
    config: LanguageNotifierConfig,
    sink: Arc<dyn NotificationSink>,
}

impl LanguageNotifierModule {
    pub fn new(config: LanguageNotifierConfig) -> Self {
        Self::with_sink(config, Arc::new(KeyboardDeviceSink))
    }

    pub fn with_sink(config: LanguageNotifierConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self { config, sink }
    }
}

/// Feeds samples through the detector and tells the sink about transitions.
pub struct ChangeReporter {
    detector: LanguageChangeDetector,
    sink: Arc<dyn NotificationSink>,
}

impl ChangeReporter {
    pub fn new(base: LanguageSample, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            detector: LanguageChangeDetector::with_base(base),
            sink,
        }
    }

    /// Returns whether `sample` was a change and the sink was called.
    pub fn observe(
        &mut self,
        sample: LanguageSample,
        display_name: impl FnOnce(LanguageSample) -> String,
    ) -> bool {
        self.detector.update(sample);
        if !self.detector.is_changed() {
            return false;
        }

        let current = self.detector.current();
        let name = display_name(current);
        info!(language = %name, lang_id = current.primary_id(), "input language changed");

        if let Err(err) = self.sink.language_changed(current, &name) {
            warn!(error = %err, "language change notification failed");
        }
        true
    }

    pub fn current(&self) -> LanguageSample {
        self.detector.current()
    }
}

fn is_trigger(config: &LanguageNotifierConfig, event: &AppEvent) -> bool {
    match event {
        AppEvent::Keyboard(_) => config.sample_on_keyboard,
        AppEvent::ForegroundChanged => config.sample_on_foreground,
        AppEvent::InputLanguageChanged => config.sample_on_input_language_change,
        AppEvent::ShutdownRequested => false,
    }
}

async fn sample(platform: &Platform, base: LanguageSample, delay: Duration) -> LanguageSample {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    // The IME query is a blocking cross-process SendMessage.
    let query = platform.clone();
    match tokio::task::spawn_blocking(move || query.input_state()).await {
        Ok(Ok(state)) => state.to_sample(base),
        Ok(Err(err)) => {
            debug!(error = %err, "input state unavailable, using base language");
            base
        }
        Err(err) => {
            warn!(error = %err, "input state query panicked, using base language");
            base
        }
    }
}

#[async_trait]
impl Module for LanguageNotifierModule {
    fn name(&self) -> &'static str {
        "language_notifier"
    }

    async fn start(&self, ctx: ModuleContext) -> anyhow::Result<ModuleHandle> {
        let mut rx = ctx.bus.subscribe();
        let config = self.config.clone();
        let platform = ctx.platform.clone();
        let base = config.base_sample();
        let delay = Duration::from_millis(config.sample_delay_ms);
        let mut reporter = ChangeReporter::new(base, self.sink.clone());

        let join = tokio::spawn(async move {
            info!(
                base_language = %base,
                sample_on_keyboard = config.sample_on_keyboard,
                sample_on_foreground = config.sample_on_foreground,
                sample_on_input_language_change = config.sample_on_input_language_change,
                sample_delay_ms = config.sample_delay_ms,
                "language_notifier started",
            );

            let initial = sample(&platform, base, Duration::ZERO).await;
            reporter.observe(initial, |s| platform.language_name(s));
            info!(language = %platform.language_name(reporter.current()), "initial input language");

            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "language_notifier lagged behind event bus");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if matches!(event, AppEvent::ShutdownRequested) {
                    info!("language_notifier shutting down");
                    break;
                }
                if !is_trigger(&config, &event) {
                    continue;
                }
                if let AppEvent::Keyboard(key) = &event {
                    trace!(
                        vk_code = key.vk_code,
                        scan_code = key.scan_code,
                        flags = key.flags,
                        is_key_down = key.is_key_down,
                        "key event",
                    );
                }

                let next = sample(&platform, base, delay).await;
                reporter.observe(next, |s| platform.language_name(s));
            }

            Ok(())
        });

        Ok(ModuleHandle::new(join))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ime_watcher_core::EventBus;
    use ime_watcher_shared_types::{ImeMode, InputState, KeyboardEvent};

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(LanguageSample, String)>>,
    }

    impl NotificationSink for RecordingSink {
        fn language_changed(&self, sample: LanguageSample, display_name: &str) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((sample, display_name.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn language_changed(&self, _: LanguageSample, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("device unplugged")
        }
    }

    const EN: LanguageSample = LanguageSample::BASE;

    fn ko() -> LanguageSample {
        LanguageSample::from_lang_id(0x0412)
    }

    fn name(sample: LanguageSample) -> String {
        sample.iso_code().unwrap_or("?").to_string()
    }

    #[test]
    fn test_reporter_notifies_once_per_transition() {
        let sink = Arc::new(RecordingSink::default());
        let mut reporter = ChangeReporter::new(EN, sink.clone());

        let reported: Vec<bool> = [EN, EN, ko(), ko(), EN]
            .into_iter()
            .map(|s| reporter.observe(s, name))
            .collect();

        assert_eq!(reported, vec![false, false, true, false, true]);
        let seen = sink.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(ko(), "ko".to_string()), (EN, "en".to_string())]
        );
    }

    #[test]
    fn test_ime_off_on_different_layouts_is_not_a_change() {
        let sink = Arc::new(RecordingSink::default());
        let mut reporter = ChangeReporter::new(EN, sink.clone());

        for layout_lang_id in [0x0412, 0x0411, 0x0419] {
            let state = InputState {
                layout_lang_id,
                ime: ImeMode::Alphanumeric,
            };
            reporter.observe(state.to_sample(EN), name);
        }

        assert!(sink.seen.lock().unwrap().is_empty());
        assert_eq!(reporter.current(), EN);
    }

    #[test]
    fn test_sink_failure_does_not_stop_reporting() {
        let mut reporter = ChangeReporter::new(EN, Arc::new(FailingSink));

        assert!(!reporter.observe(EN, name));
        assert!(reporter.observe(ko(), name));
        assert!(reporter.observe(EN, name));
    }

    #[test]
    fn test_triggers_follow_config() {
        let mut config = LanguageNotifierConfig::default();
        let key = AppEvent::Keyboard(KeyboardEvent {
            vk_code: 0x15,
            scan_code: 0x72,
            flags: 0,
            is_key_down: true,
        });

        assert!(is_trigger(&config, &key));
        assert!(is_trigger(&config, &AppEvent::ForegroundChanged));
        assert!(!is_trigger(&config, &AppEvent::ShutdownRequested));

        config.sample_on_keyboard = false;
        config.sample_on_input_language_change = false;
        assert!(!is_trigger(&config, &key));
        assert!(!is_trigger(&config, &AppEvent::InputLanguageChanged));
        assert!(is_trigger(&config, &AppEvent::ForegroundChanged));
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn test_unavailable_input_state_samples_base() {
        let sampled = sample(&Platform::new(), ko(), Duration::ZERO).await;

        assert_eq!(sampled, ko());
        assert_ne!(sampled, EN);
    }

    #[tokio::test]
    async fn test_module_stops_on_shutdown() {
        let bus = EventBus::new(16);
        let ctx = ModuleContext {
            bus: bus.clone(),
            platform: Platform::new(),
        };
        let sink = Arc::new(RecordingSink::default());
        let module =
            LanguageNotifierModule::with_sink(LanguageNotifierConfig::default(), sink.clone());

        let handle = module.start(ctx).await.unwrap();
        bus.send(AppEvent::ForegroundChanged);
        bus.send(AppEvent::ShutdownRequested);

        handle.join().await.unwrap();
    }
}
