#[derive(Debug, Clone)]
pub enum AppEvent {
    ShutdownRequested,
    Keyboard(KeyboardEvent),
    /// Another window was brought to the foreground.
    ForegroundChanged,
    /// The app window received `WM_INPUTLANGCHANGE`.
    InputLanguageChanged,
}

#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    pub vk_code: u32,
    pub scan_code: u32,
    pub flags: u32,
    pub is_key_down: bool,
}
