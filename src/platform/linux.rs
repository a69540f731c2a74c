use super::{ActiveWindow, ForegroundProbe, MAX_TEXT_LEN};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};

pub struct LinuxProbe {
    conn: x11rb::rust_connection::RustConnection,
    root: Window,
}

impl LinuxProbe {
    pub fn new() -> Self {
        let (conn, screen_num) = x11rb::connect(None).expect("Failed to connect to X server");
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        Self { conn, root }
    }

    fn atom(&self, name: &str) -> Option<u32> {
        self.conn
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn text_property(&self, window: Window, atom: u32) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, atom, AtomEnum::ANY, 0, MAX_TEXT_LEN as u32)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        String::from_utf8(reply.value).ok()
    }

    fn active_window_id(&self) -> Option<Window> {
        let atom = self.atom("_NET_ACTIVE_WINDOW")?;
        let reply = self
            .conn
            .get_property(false, self.root, atom, AtomEnum::WINDOW, 0, 1)
            .ok()?
            .reply()
            .ok()?;

        let bytes: [u8; 4] = reply.value.get(..4)?.try_into().ok()?;
        let id = u32::from_ne_bytes(bytes);
        (id != 0).then_some(id)
    }
}

impl ForegroundProbe for LinuxProbe {
    fn sample(&self) -> ActiveWindow {
        let Some(window) = self.active_window_id() else {
            return ActiveWindow::default();
        };

        let title = self
            .atom("_NET_WM_NAME")
            .and_then(|atom| self.text_property(window, atom))
            .or_else(|| self.text_property(window, AtomEnum::WM_NAME.into()))
            .unwrap_or_default();

        // WM_CLASS holds instance\0class\0; the instance name is the
        // closest analogue of an executable base name.
        let app_name = self
            .text_property(window, AtomEnum::WM_CLASS.into())
            .and_then(|s| s.split('\0').next().map(str::to_string))
            .unwrap_or_default();

        ActiveWindow { app_name, title }
    }
}
