use super::{ActiveWindow, ForegroundProbe, MAX_TEXT_LEN};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::ProcessStatus::GetModuleBaseNameW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId,
};

pub struct WindowsProbe;

impl WindowsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ForegroundProbe for WindowsProbe {
    fn sample(&self) -> ActiveWindow {
        // SAFETY: read-only Win32 queries against the foreground window.
        // The only resource acquired is the process handle, which is owned
        // by ProcessHandle and closed on drop.
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_invalid() {
                return ActiveWindow::default();
            }

            let mut buf = [0u16; MAX_TEXT_LEN];
            let len = GetWindowTextW(hwnd, &mut buf);
            let title = decode(&buf, usize::try_from(len).unwrap_or(0));

            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            let app_name = if pid == 0 {
                String::new()
            } else {
                module_base_name(pid).unwrap_or_default()
            };

            ActiveWindow { app_name, title }
        }
    }
}

/// Base name of the executable owning `pid`, or None when the process
/// cannot be opened or queried.
fn module_base_name(pid: u32) -> Option<String> {
    // SAFETY: the handle is released by ProcessHandle on every exit path.
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid).ok()?;
        let handle = ProcessHandle(handle);

        let mut buf = [0u16; MAX_TEXT_LEN];
        let len = GetModuleBaseNameW(handle.0, None, &mut buf);
        if len == 0 {
            return None;
        }
        Some(decode(&buf, len as usize))
    }
}

fn decode(buf: &[u16], len: usize) -> String {
    String::from_utf16_lossy(&buf[..len.min(buf.len())])
}

/// Owned process handle, closed on drop.
struct ProcessHandle(HANDLE);

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: self.0 came from a successful OpenProcess call.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
