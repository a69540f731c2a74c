use crate::ledger::{AppUsage, Ledger};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tauri::State;

#[derive(Serialize)]
pub struct AppTotal {
    pub app_name: String,
    #[serde(with = "crate::ledger::nanos")]
    pub total: Duration,
}

/// One row per application with its accumulated total.
#[tauri::command]
pub fn get_app_totals(ledger: State<Arc<Ledger>>) -> Vec<AppTotal> {
    ledger
        .totals()
        .into_iter()
        .map(|(app_name, total)| AppTotal { app_name, total })
        .collect()
}

/// The full per-title breakdown, for the detail view.
#[tauri::command]
pub fn get_activity_snapshot(ledger: State<Arc<Ledger>>) -> Vec<AppUsage> {
    ledger.snapshot()
}
