use serde::Deserialize;

use crate::LanguageSample;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub logging: LoggingConfig,
    pub language_notifier: LanguageNotifierConfig,
    pub tray: TrayConfig,
    pub modules: ModulesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "console".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LanguageNotifierConfig {
    pub enabled: bool,
    /// Primary language id reported while the IME is closed.
    pub base_language: u16,
    pub sample_on_keyboard: bool,
    pub sample_on_foreground: bool,
    pub sample_on_input_language_change: bool,
    pub sample_delay_ms: u64,
}

impl LanguageNotifierConfig {
    pub fn base_sample(&self) -> LanguageSample {
        LanguageSample::from_lang_id(self.base_language)
    }
}

impl Default for LanguageNotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_language: LanguageSample::BASE.primary_id(),
            sample_on_keyboard: true,
            sample_on_foreground: true,
            sample_on_input_language_change: true,
            sample_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TrayConfig {
    pub enabled: bool,
    pub tooltip: String,
    pub start_hidden: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tooltip: "ImeWatcher".to_string(),
            start_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ModulesConfig {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            loaded: vec!["language_notifier".to_string()],
            disabled: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.logging.level, "info");
        assert!(config.language_notifier.enabled);
        assert_eq!(config.language_notifier.base_sample(), LanguageSample::BASE);
        assert!(config.tray.enabled);
        assert_eq!(config.modules.loaded, vec!["language_notifier"]);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let raw = r#"
            [language_notifier]
            base_language = 0x0412
            sample_on_keyboard = false
            sample_delay_ms = 50

            [tray]
            start_hidden = true
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        let notifier = &config.language_notifier;

        assert_eq!(notifier.base_sample().iso_code(), Some("ko"));
        assert!(!notifier.sample_on_keyboard);
        assert!(notifier.sample_on_foreground);
        assert_eq!(notifier.sample_delay_ms, 50);
        assert!(config.tray.start_hidden);
        assert_eq!(config.tray.tooltip, "ImeWatcher");
    }
}
