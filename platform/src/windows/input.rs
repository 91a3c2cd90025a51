use anyhow::bail;
use ime_watcher_shared_types::{ImeMode, InputState, LanguageSample};
use tracing::trace;
use windows_sys::Win32::{
    Foundation::HWND,
    Globalization::{GetLocaleInfoW, LOCALE_SENGLISHLANGUAGENAME},
    UI::{
        Input::{Ime::ImmGetDefaultIMEWnd, KeyboardAndMouse::GetKeyboardLayout},
        WindowsAndMessaging::{
            GetForegroundWindow, GetGUIThreadInfo, GetWindowThreadProcessId,
            SendMessageTimeoutW, GUITHREADINFO, SMTO_ABORTIFHUNG, SMTO_NORMAL, WM_IME_CONTROL,
        },
    },
};

const IMC_GETOPENSTATUS: usize = 0x0005;
const IME_QUERY_TIMEOUT_MS: u32 = 100;

const LOCALE_NAME_MAX_LENGTH: usize = 85;
const SUBLANG_DEFAULT: u16 = 0x01;

/// Reads the keyboard layout and IME open status of the foreground window.
///
/// Sends a message to the IME window of another process, so this must not
/// run on the thread that owns the hooks.
pub fn query_input_state() -> anyhow::Result<InputState> {
    let foreground = unsafe { GetForegroundWindow() };
    if foreground.is_null() {
        bail!("no foreground window");
    }

    let thread_id = unsafe { GetWindowThreadProcessId(foreground, std::ptr::null_mut()) };
    if thread_id == 0 {
        bail!("GetWindowThreadProcessId failed for foreground window");
    }

    // The low word of an HKL is the layout's LANGID.
    let layout = unsafe { GetKeyboardLayout(thread_id) };
    let layout_lang_id = (layout as usize & 0xffff) as u16;

    let ime = ime_mode(focus_window(foreground, thread_id))?;
    trace!(layout_lang_id, ?ime, "input state");

    Ok(InputState {
        layout_lang_id,
        ime,
    })
}

fn focus_window(foreground: HWND, thread_id: u32) -> HWND {
    let mut info: GUITHREADINFO = unsafe { std::mem::zeroed() };
    info.cbSize = std::mem::size_of::<GUITHREADINFO>() as u32;

    let ok = unsafe { GetGUIThreadInfo(thread_id, &mut info) } != 0;
    if ok && !info.hwndFocus.is_null() {
        info.hwndFocus
    } else {
        foreground
    }
}

fn ime_mode(target: HWND) -> anyhow::Result<ImeMode> {
    let ime_window = unsafe { ImmGetDefaultIMEWnd(target) };
    if ime_window.is_null() {
        // No IME attached to the window: plain layout input.
        return Ok(ImeMode::Alphanumeric);
    }

    let mut status: usize = 0;
    let sent = unsafe {
        SendMessageTimeoutW(
            ime_window,
            WM_IME_CONTROL,
            IMC_GETOPENSTATUS,
            0,
            SMTO_NORMAL | SMTO_ABORTIFHUNG,
            IME_QUERY_TIMEOUT_MS,
            &mut status,
        )
    };
    if sent == 0 {
        bail!("IMC_GETOPENSTATUS timed out or failed");
    }

    Ok(ImeMode::from_open_status(status))
}

/// English name of the language, e.g. "Korean".
pub fn language_name(sample: LanguageSample) -> Option<String> {
    let lang_id = (SUBLANG_DEFAULT << 10) | sample.primary_id();
    // MAKELCID(lang_id, SORT_DEFAULT)
    let lcid = u32::from(lang_id);

    let mut buf = [0u16; LOCALE_NAME_MAX_LENGTH];
    let len = unsafe {
        GetLocaleInfoW(
            lcid,
            LOCALE_SENGLISHLANGUAGENAME,
            buf.as_mut_ptr(),
            buf.len() as i32,
        )
    };
    if len <= 1 {
        return None;
    }

    // `len` counts the terminating nul.
    Some(String::from_utf16_lossy(&buf[..len as usize - 1]))
}
