use std::{
    cell::RefCell,
    sync::mpsc,
    thread,
};

use anyhow::Context;
use ime_watcher_shared_types::KeyboardEvent;
use tracing::{debug, info, warn};
use windows_sys::Win32::{
    Foundation::{GetLastError, ERROR_CLASS_ALREADY_EXISTS, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM},
    System::{LibraryLoader::GetModuleHandleW, Threading::GetCurrentThreadId},
    UI::{
        Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK},
        WindowsAndMessaging::{
            CallNextHookEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
            GetForegroundWindow, GetMessageW, IsWindow, PostQuitMessage, PostThreadMessageW,
            RegisterClassW, SetForegroundWindow, SetWindowsHookExW, ShowWindow, TranslateMessage,
            UnhookWindowsHookEx, CW_USEDEFAULT, EVENT_SYSTEM_FOREGROUND, HC_ACTION, HHOOK,
            KBDLLHOOKSTRUCT, MSG, SC_CLOSE, SC_MINIMIZE, SW_HIDE, SW_RESTORE, SW_SHOWNORMAL,
            WH_KEYBOARD_LL, WINEVENT_OUTOFCONTEXT, WINEVENT_SKIPOWNPROCESS, WM_CLOSE,
            WM_DESTROY, WM_INPUTLANGCHANGE, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDBLCLK, WM_QUIT,
            WM_RBUTTONUP, WM_SYSCOMMAND, WM_SYSKEYDOWN, WM_SYSKEYUP, WNDCLASSW,
            WS_OVERLAPPEDWINDOW,
        },
    },
};

use crate::{window_action, HostEvent, HostOptions, WindowAction, WindowRequest};

mod input;
mod tray;

pub use input::{language_name, query_input_state};
use tray::{TrayCommand, TrayIcon, WM_TRAY_CALLBACK};

const WINDOW_CLASS: &str = "ImeWatcher";
const WINDOW_TITLE: &str = "ImeWatcherWindow";

/// State the OS callbacks need. Lives on the host thread only, for as long as
/// its hooks and window exist.
struct HostState {
    events: mpsc::Sender<HostEvent>,
    tray: Option<TrayIcon>,
}

thread_local! {
    static HOST: RefCell<Option<HostState>> = const { RefCell::new(None) };
}

fn emit(event: HostEvent) {
    HOST.with(|slot| {
        if let Some(state) = slot.borrow().as_ref() {
            let _ = state.events.send(event);
        }
    });
}

fn has_tray() -> bool {
    HOST.with(|slot| slot.borrow().as_ref().is_some_and(|s| s.tray.is_some()))
}

fn popup_tray_menu() -> Option<TrayCommand> {
    HOST.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|s| s.tray.as_ref())
            .and_then(TrayIcon::popup_menu)
    })
}

pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let msg = wparam as u32;
        let is_key_down = matches!(msg, WM_KEYDOWN | WM_SYSKEYDOWN);
        let is_key_up = matches!(msg, WM_KEYUP | WM_SYSKEYUP);

        if is_key_down || is_key_up {
            let kb = unsafe { *(lparam as *const KBDLLHOOKSTRUCT) };
            emit(HostEvent::Keyboard(KeyboardEvent {
                vk_code: kb.vkCode,
                scan_code: kb.scanCode,
                flags: kb.flags,
                is_key_down,
            }));
        }
    }

    unsafe { CallNextHookEx(std::ptr::null_mut(), code, wparam, lparam) }
}

unsafe extern "system" fn foreground_proc(
    _hook: HWINEVENTHOOK,
    _event: u32,
    _hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_event_thread: u32,
    _dwms_event_time: u32,
) {
    if !unsafe { GetForegroundWindow() }.is_null() {
        emit(HostEvent::ForegroundChanged);
    }
}

/// Returns `None` when the message should go to `DefWindowProcW`.
unsafe fn handle_window_request(hwnd: HWND, request: WindowRequest) -> Option<LRESULT> {
    match window_action(request, has_tray()) {
        WindowAction::HideToTray => unsafe { ShowWindow(hwnd, SW_HIDE) },
        WindowAction::Exit => {
            emit(HostEvent::ExitRequested);
            unsafe { DestroyWindow(hwnd) }
        }
        WindowAction::Default => return None,
    };
    Some(0)
}

unsafe fn restore_window(hwnd: HWND) {
    unsafe {
        ShowWindow(hwnd, SW_RESTORE);
        SetForegroundWindow(hwnd);
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_TRAY_CALLBACK => {
            match (lparam as u32) & 0xffff {
                WM_RBUTTONUP => match popup_tray_menu() {
                    Some(TrayCommand::Settings) => unsafe { restore_window(hwnd) },
                    Some(TrayCommand::Exit) => {
                        info!("exit requested from tray");
                        emit(HostEvent::ExitRequested);
                        unsafe { DestroyWindow(hwnd) };
                    }
                    None => {}
                },
                WM_LBUTTONDBLCLK => unsafe { restore_window(hwnd) },
                _ => {}
            }
            0
        }
        WM_CLOSE => unsafe { handle_window_request(hwnd, WindowRequest::Close) }
            .unwrap_or_else(|| unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }),
        WM_SYSCOMMAND => {
            let request = match wparam as u32 & 0xfff0 {
                SC_CLOSE => Some(WindowRequest::Close),
                SC_MINIMIZE => Some(WindowRequest::Minimize),
                _ => None,
            };
            request
                .and_then(|request| unsafe { handle_window_request(hwnd, request) })
                .unwrap_or_else(|| unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) })
        }
        WM_INPUTLANGCHANGE => {
            debug!("WM_INPUTLANGCHANGE");
            emit(HostEvent::InputLanguageChanged);
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            0
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Everything installed on the host thread. Dropping it tears the lot down.
struct HostResources {
    window: HWND,
    keyboard_hook: HHOOK,
    foreground_hook: HWINEVENTHOOK,
}

impl HostResources {
    fn install(options: &HostOptions, events: mpsc::Sender<HostEvent>) -> anyhow::Result<Self> {
        HOST.with(|slot| {
            *slot.borrow_mut() = Some(HostState { events, tray: None });
        });

        let mut resources = Self {
            window: std::ptr::null_mut(),
            keyboard_hook: std::ptr::null_mut(),
            foreground_hook: std::ptr::null_mut(),
        };

        let hinstance: HINSTANCE = unsafe { GetModuleHandleW(std::ptr::null()) };
        resources.window = create_window(hinstance)?;

        if options.tray {
            let tray = TrayIcon::add(resources.window, &options.tooltip).context("add tray icon")?;
            HOST.with(|slot| {
                if let Some(state) = slot.borrow_mut().as_mut() {
                    state.tray = Some(tray);
                }
            });
        }

        resources.keyboard_hook =
            unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), hinstance, 0) };
        if resources.keyboard_hook.is_null() {
            let err = unsafe { GetLastError() };
            anyhow::bail!("SetWindowsHookExW(WH_KEYBOARD_LL) failed, GetLastError={err}");
        }

        resources.foreground_hook = unsafe {
            SetWinEventHook(
                EVENT_SYSTEM_FOREGROUND,
                EVENT_SYSTEM_FOREGROUND,
                std::ptr::null_mut(),
                Some(foreground_proc),
                0,
                0,
                WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
            )
        };
        if resources.foreground_hook.is_null() {
            anyhow::bail!("SetWinEventHook(EVENT_SYSTEM_FOREGROUND) failed");
        }

        let show = if options.start_hidden && options.tray {
            SW_HIDE
        } else {
            SW_SHOWNORMAL
        };
        unsafe { ShowWindow(resources.window, show) };

        Ok(resources)
    }
}

impl Drop for HostResources {
    fn drop(&mut self) {
        unsafe {
            if !self.foreground_hook.is_null() {
                UnhookWinEvent(self.foreground_hook);
            }
            if !self.keyboard_hook.is_null() {
                UnhookWindowsHookEx(self.keyboard_hook);
            }
        }

        // Drops the tray icon and the event sender.
        let state = HOST.with(|slot| slot.borrow_mut().take());
        drop(state);

        if !self.window.is_null() && unsafe { IsWindow(self.window) } != 0 {
            unsafe { DestroyWindow(self.window) };
        }
    }
}

fn create_window(hinstance: HINSTANCE) -> anyhow::Result<HWND> {
    let class_name = wide(WINDOW_CLASS);
    let title = wide(WINDOW_TITLE);

    let mut wc: WNDCLASSW = unsafe { std::mem::zeroed() };
    wc.lpfnWndProc = Some(window_proc);
    wc.hInstance = hinstance;
    wc.lpszClassName = class_name.as_ptr();

    if unsafe { RegisterClassW(&wc) } == 0 {
        let err = unsafe { GetLastError() };
        if err != ERROR_CLASS_ALREADY_EXISTS {
            anyhow::bail!("RegisterClassW failed, GetLastError={err}");
        }
    }

    let hwnd = unsafe {
        CreateWindowExW(
            0,
            class_name.as_ptr(),
            title.as_ptr(),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            400,
            300,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            hinstance,
            std::ptr::null(),
        )
    };
    if hwnd.is_null() {
        let err = unsafe { GetLastError() };
        anyhow::bail!("CreateWindowExW failed, GetLastError={err}");
    }

    Ok(hwnd)
}

fn run_message_loop() {
    let mut msg: MSG = unsafe { std::mem::zeroed() };
    loop {
        let ret = unsafe { GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) };
        if ret <= 0 {
            break;
        }
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

pub struct HostController {
    thread_id: u32,
    join: Option<thread::JoinHandle<()>>,
}

impl HostController {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(join) = self.join.take() {
            // Fails harmlessly when the loop already ended via the tray.
            unsafe {
                let _ = PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0);
            }
            if join.join().is_err() {
                warn!("host thread panicked");
            }
        }
    }
}

impl Drop for HostController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct Host {
    controller: HostController,
    events: mpsc::Receiver<HostEvent>,
}

impl Host {
    pub fn into_parts(self) -> (HostController, mpsc::Receiver<HostEvent>) {
        (self.controller, self.events)
    }
}

/// Spawns the thread that owns the window, tray icon and both hooks, and
/// waits until they are installed.
pub fn start_host(options: HostOptions) -> anyhow::Result<Host> {
    let (events_tx, events_rx) = mpsc::channel::<HostEvent>();
    let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<u32>>();

    let join = thread::Builder::new()
        .name("ime-watcher-host".to_string())
        .spawn(move || {
            let thread_id = unsafe { GetCurrentThreadId() };

            let resources = match HostResources::install(&options, events_tx) {
                Ok(resources) => resources,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let _ = ready_tx.send(Ok(thread_id));
            debug!(thread_id, "host message loop running");

            run_message_loop();
            drop(resources);

            debug!("host message loop stopped");
        })
        .context("spawn host thread")?;

    let thread_id = ready_rx
        .recv()
        .context("host thread did not report status")??;

    Ok(Host {
        controller: HostController {
            thread_id,
            join: Some(join),
        },
        events: events_rx,
    })
}
