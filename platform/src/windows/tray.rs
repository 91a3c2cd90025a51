use anyhow::bail;
use windows_sys::Win32::{
    Foundation::{GetLastError, HWND, POINT},
    UI::{
        Shell::{
            Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE,
            NOTIFYICONDATAW,
        },
        WindowsAndMessaging::{
            AppendMenuW, CreatePopupMenu, DestroyMenu, GetCursorPos, LoadIconW, PostMessageW,
            SetForegroundWindow, TrackPopupMenu, HMENU, IDI_APPLICATION, MF_STRING,
            TPM_BOTTOMALIGN, TPM_RETURNCMD, TPM_RIGHTALIGN, TPM_RIGHTBUTTON, WM_NULL, WM_USER,
        },
    },
};

use super::wide;

/// Message the shell posts to the app window for tray icon clicks.
pub(super) const WM_TRAY_CALLBACK: u32 = WM_USER + 1;

const TRAY_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TrayCommand {
    Settings,
    Exit,
}

impl TrayCommand {
    const SETTINGS_ID: usize = 1;
    const EXIT_ID: usize = 2;

    fn from_menu_id(id: i32) -> Option<Self> {
        match usize::try_from(id).ok()? {
            Self::SETTINGS_ID => Some(Self::Settings),
            Self::EXIT_ID => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Notification-area icon plus its popup menu. Removed on drop.
pub(super) struct TrayIcon {
    data: NOTIFYICONDATAW,
    menu: HMENU,
}

impl TrayIcon {
    pub(super) fn add(hwnd: HWND, tooltip: &str) -> anyhow::Result<Self> {
        let mut data: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        data.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        data.hWnd = hwnd;
        data.uID = TRAY_ID;
        data.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
        data.uCallbackMessage = WM_TRAY_CALLBACK;
        data.hIcon = unsafe { LoadIconW(std::ptr::null_mut(), IDI_APPLICATION) };

        let tip: Vec<u16> = tooltip.encode_utf16().collect();
        let len = tip.len().min(data.szTip.len() - 1);
        data.szTip[..len].copy_from_slice(&tip[..len]);

        let menu = unsafe { CreatePopupMenu() };
        if menu.is_null() {
            let err = unsafe { GetLastError() };
            bail!("CreatePopupMenu failed, GetLastError={err}");
        }
        let settings = wide("Settings");
        let exit = wide("Exit");
        unsafe {
            AppendMenuW(menu, MF_STRING, TrayCommand::SETTINGS_ID, settings.as_ptr());
            AppendMenuW(menu, MF_STRING, TrayCommand::EXIT_ID, exit.as_ptr());
        }

        if unsafe { Shell_NotifyIconW(NIM_ADD, &data) } == 0 {
            unsafe { DestroyMenu(menu) };
            bail!("Shell_NotifyIconW(NIM_ADD) failed");
        }

        Ok(Self { data, menu })
    }

    /// Shows the menu at the cursor and blocks until the user picks or dismisses it.
    pub(super) fn popup_menu(&self) -> Option<TrayCommand> {
        let hwnd = self.data.hWnd;
        let mut pt = POINT { x: 0, y: 0 };

        let picked = unsafe {
            GetCursorPos(&mut pt);
            // Without this the menu stays open when the user clicks elsewhere.
            SetForegroundWindow(hwnd);
            let picked = TrackPopupMenu(
                self.menu,
                TPM_RETURNCMD | TPM_RIGHTBUTTON | TPM_RIGHTALIGN | TPM_BOTTOMALIGN,
                pt.x,
                pt.y,
                0,
                hwnd,
                std::ptr::null(),
            );
            PostMessageW(hwnd, WM_NULL, 0, 0);
            picked
        };

        TrayCommand::from_menu_id(picked)
    }
}

impl Drop for TrayIcon {
    fn drop(&mut self) {
        unsafe {
            Shell_NotifyIconW(NIM_DELETE, &self.data);
            DestroyMenu(self.menu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_ids() {
        assert_eq!(TrayCommand::from_menu_id(1), Some(TrayCommand::Settings));
        assert_eq!(TrayCommand::from_menu_id(2), Some(TrayCommand::Exit));
        assert_eq!(TrayCommand::from_menu_id(0), None);
        assert_eq!(TrayCommand::from_menu_id(-1), None);
    }
}
