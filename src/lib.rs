mod commands;
pub mod ledger;
pub mod persist;
pub mod platform;
pub mod sampler;
pub mod signal;

use crate::ledger::Ledger;
use crate::persist::Persister;
use crate::platform::{ForegroundProbe, NativeProbe};
use crate::sampler::{SamplerConfig, SamplerService};
use crate::signal::ShowSignal;
use log::warn;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use tauri::{
    menu::{Menu, MenuItem},
    tray::TrayIconBuilder,
    webview::WebviewWindowBuilder,
    Manager, RunEvent,
};

/// Holds the sampler thread handle for graceful shutdown
pub struct SamplerHandle(Mutex<Option<JoinHandle<()>>>);

/// Ledger file, written to the working directory.
const ACTIVITY_FILE: &str = "activity.json";

/// Tray icon, looked up in the working directory.
const ICON_FILE: &str = "clock.ico";

/// A missing or unreadable icon degrades to a bare tray entry.
fn tray_icon() -> Option<tauri::image::Image<'static>> {
    match tauri::image::Image::from_path(ICON_FILE) {
        Ok(icon) => Some(icon),
        Err(e) => {
            warn!("No tray icon ({}): {}", ICON_FILE, e);
            None
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let ledger = Arc::new(Ledger::new());
            let persister = Arc::new(Persister::new(ACTIVITY_FILE));
            let probe: Arc<dyn ForegroundProbe> = Arc::new(NativeProbe::new());

            // Start the sampler
            let sampler = SamplerService::new(
                Arc::clone(&ledger),
                Arc::clone(&persister),
                probe,
                SamplerConfig::default(),
            );
            let handle = sampler.start();
            let sampler = Arc::new(sampler);
            let sampler_handle = SamplerHandle(Mutex::new(Some(handle)));

            let show_signal = Arc::new(ShowSignal::new());

            // Store in app state
            app.manage(ledger);
            app.manage(Arc::clone(&sampler));
            app.manage(sampler_handle);
            app.manage(Arc::clone(&show_signal));

            // Create the main window at startup (hidden). "Show" only
            // ever raises this one instance.
            let _main_window = WebviewWindowBuilder::new(app, "main", tauri::WebviewUrl::default())
                .title("Time Tracker")
                .inner_size(360.0, 480.0)
                .resizable(true)
                .visible(false)
                .center()
                .build()?;

            // UI controller: consume show signals off the tray and raise
            // the window.
            {
                let app_handle = app.handle().clone();
                let show_signal = Arc::clone(&show_signal);
                thread::spawn(move || {
                    while show_signal.wait() {
                        if let Some(window) = app_handle.get_webview_window("main") {
                            let _ = window.show();
                            let _ = window.set_focus();
                        }
                    }
                });
            }

            // Setup tray
            let show = MenuItem::with_id(app, "show", "Show", true, None::<&str>)?;
            let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
            let menu = Menu::with_items(app, &[&show, &quit])?;

            let mut tray = TrayIconBuilder::new()
                .menu(&menu)
                .title("Time Tracker")
                .tooltip("Click to view time spent")
                .on_menu_event(|app, event| {
                    if event.id == "show" {
                        if let Some(signal) = app.try_state::<Arc<ShowSignal>>() {
                            signal.notify();
                        }
                    } else if event.id == "quit" {
                        // Gracefully stop the sampler before exiting; its
                        // thread commits the in-flight segment and flushes
                        // the file.
                        if let Some(sampler) = app.try_state::<Arc<SamplerService>>() {
                            sampler.stop();
                        }
                        if let Some(handle_state) = app.try_state::<SamplerHandle>() {
                            if let Ok(mut guard) = handle_state.0.lock() {
                                if let Some(handle) = guard.take() {
                                    let _ = handle.join();
                                }
                            }
                        }
                        app.exit(0);
                    }
                });
            if let Some(icon) = tray_icon() {
                tray = tray.icon(icon);
            }
            let _tray = tray.build(app)?;

            Ok(())
        })
        .on_window_event(|window, event| {
            // Closing hides: the single window instance stays around for
            // the next "Show".
            if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                let _ = window.hide();
                api.prevent_close();
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_app_totals,
            commands::get_activity_snapshot,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|_app, event| {
            // Tray-only app: the process must survive all windows closing
            if let RunEvent::ExitRequested { api, .. } = event {
                api.prevent_exit();
            }
        });
}
