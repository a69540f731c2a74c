use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One window title held in the foreground for `duration`. Immutable once
/// appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabEntry {
    pub title: String,
    #[serde(with = "nanos")]
    pub duration: Duration,
}

/// Everything observed for one application, in observation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsage {
    pub app_name: String,
    pub tabs: Vec<TabEntry>,
}

impl AppUsage {
    pub fn total(&self) -> Duration {
        self.tabs.iter().map(|tab| tab.duration).sum()
    }
}

/// Shared record of accumulated foreground time.
///
/// The sampler is the only writer. The UI and the persister read through
/// value snapshots taken under the same lock as appends, so a reader never
/// observes a partially appended entry.
#[derive(Default)]
pub struct Ledger {
    apps: Mutex<BTreeMap<String, AppUsage>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, AppUsage>> {
        match self.apps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Ledger mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Record `duration` against (`app_name`, `title`).
    ///
    /// Zero durations are dropped: sampling clocks can tie.
    pub fn append(&self, app_name: &str, title: &str, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let mut apps = self.lock();
        let usage = apps.entry(app_name.to_string()).or_insert_with(|| AppUsage {
            app_name: app_name.to_string(),
            tabs: Vec::new(),
        });
        usage.tabs.push(TabEntry {
            title: title.to_string(),
            duration,
        });
    }

    /// Consistent deep copy of every app record, ordered by app name.
    pub fn snapshot(&self) -> Vec<AppUsage> {
        self.lock().values().cloned().collect()
    }

    /// Accumulated total per application, ordered by app name.
    pub fn totals(&self) -> Vec<(String, Duration)> {
        self.lock()
            .values()
            .map(|usage| (usage.app_name.clone(), usage.total()))
            .collect()
    }
}

/// On disk (and over IPC), `duration` is an integer count of nanoseconds.
pub mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
