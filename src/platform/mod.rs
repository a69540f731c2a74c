pub mod types;

pub use types::{ActiveWindow, ForegroundProbe, MAX_TEXT_LEN};

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub use windows::WindowsProbe as NativeProbe;

#[cfg(target_os = "linux")]
pub use linux::LinuxProbe as NativeProbe;

// Stub for development on other platforms
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub struct NativeProbe;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
impl NativeProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
impl ForegroundProbe for NativeProbe {
    fn sample(&self) -> ActiveWindow {
        ActiveWindow {
            app_name: "TestApp".to_string(),
            title: "Test Window".to_string(),
        }
    }
}
