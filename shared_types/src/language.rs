use std::fmt;

/// Primary language of the active input, as the low 10 bits of a Windows LANGID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageSample(u16);

impl LanguageSample {
    /// English. Reported whenever the IME is not composing native text.
    pub const BASE: Self = Self(0x09);

    const PRIMARY_MASK: u16 = 0x03ff;

    /// Builds a sample from a full LANGID, dropping the sublanguage bits.
    pub fn from_lang_id(lang_id: u16) -> Self {
        Self(lang_id & Self::PRIMARY_MASK)
    }

    pub fn primary_id(self) -> u16 {
        self.0
    }

    /// ISO 639-1 code for the languages people commonly type with an IME or
    /// a non-latin layout.
    pub fn iso_code(self) -> Option<&'static str> {
        let code = match self.0 {
            0x01 => "ar",
            0x02 => "bg",
            0x04 => "zh",
            0x05 => "cs",
            0x07 => "de",
            0x08 => "el",
            0x09 => "en",
            0x0a => "es",
            0x0c => "fr",
            0x0d => "he",
            0x10 => "it",
            0x11 => "ja",
            0x12 => "ko",
            0x15 => "pl",
            0x16 => "pt",
            0x19 => "ru",
            0x1e => "th",
            0x1f => "tr",
            0x22 => "uk",
            0x2a => "vi",
            0x39 => "hi",
            _ => return None,
        };
        Some(code)
    }
}

impl Default for LanguageSample {
    fn default() -> Self {
        Self::BASE
    }
}

impl fmt::Display for LanguageSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.iso_code() {
            Some(code) => write!(f, "{code} (0x{:04x})", self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeMode {
    Native,
    Alphanumeric,
}

impl ImeMode {
    /// Maps the reply to `WM_IME_CONTROL`/`IMC_GETOPENSTATUS`.
    /// Anything other than exactly 1 counts as alphanumeric input.
    pub fn from_open_status(status: usize) -> Self {
        if status == 1 {
            Self::Native
        } else {
            Self::Alphanumeric
        }
    }
}

/// One raw reading of the foreground window's input state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub layout_lang_id: u16,
    pub ime: ImeMode,
}

impl InputState {
    /// With the IME closed every layout collapses to `base`.
    pub fn to_sample(self, base: LanguageSample) -> LanguageSample {
        match self.ime {
            ImeMode::Native => LanguageSample::from_lang_id(self.layout_lang_id),
            ImeMode::Alphanumeric => base,
        }
    }
}
