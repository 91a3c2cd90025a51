use ime_watcher_shared_types::{InputState, KeyboardEvent, LanguageSample};

/// Raw events coming out of the OS hooks and the app window.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Keyboard(KeyboardEvent),
    ForegroundChanged,
    InputLanguageChanged,
    /// "Exit" was picked from the tray menu, or the window was closed with no tray.
    ExitRequested,
}

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub tray: bool,
    pub tooltip: String,
    pub start_hidden: bool,
}

/// Close or minimize request on the app window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRequest {
    Close,
    Minimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    HideToTray,
    Exit,
    /// Let `DefWindowProcW` handle it.
    Default,
}

/// With a tray both requests hide the window. Without one, closing ends the
/// program and minimizing behaves normally.
pub fn window_action(request: WindowRequest, has_tray: bool) -> WindowAction {
    match (request, has_tray) {
        (_, true) => WindowAction::HideToTray,
        (WindowRequest::Close, false) => WindowAction::Exit,
        (WindowRequest::Minimize, false) => WindowAction::Default,
    }
}

#[derive(Debug, Default, Clone)]
pub struct Platform;

impl Platform {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "windows")]
    pub fn start_host(&self, options: HostOptions) -> anyhow::Result<windows::Host> {
        windows::start_host(options)
    }

    #[cfg(target_os = "windows")]
    pub fn input_state(&self) -> anyhow::Result<InputState> {
        windows::query_input_state()
    }

    #[cfg(not(target_os = "windows"))]
    pub fn input_state(&self) -> anyhow::Result<InputState> {
        anyhow::bail!("input state is only available on windows")
    }

    /// Human-readable name for log lines; falls back to the ISO code.
    pub fn language_name(&self, sample: LanguageSample) -> String {
        #[cfg(target_os = "windows")]
        {
            if let Some(name) = windows::language_name(sample) {
                return name;
            }
        }

        sample.to_string()
    }
}

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_action_with_tray_hides() {
        assert_eq!(
            window_action(WindowRequest::Close, true),
            WindowAction::HideToTray
        );
        assert_eq!(
            window_action(WindowRequest::Minimize, true),
            WindowAction::HideToTray
        );
    }

    #[test]
    fn test_window_action_without_tray() {
        assert_eq!(window_action(WindowRequest::Close, false), WindowAction::Exit);
        assert_eq!(
            window_action(WindowRequest::Minimize, false),
            WindowAction::Default
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_input_state_unavailable_off_windows() {
        assert!(Platform::new().input_state().is_err());
        assert_eq!(
            Platform::new().language_name(LanguageSample::BASE),
            "en (0x0009)"
        );
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_language_name_from_locale() {
        let korean = LanguageSample::from_lang_id(0x0412);
        assert_eq!(Platform::new().language_name(korean), "Korean");
    }
}
