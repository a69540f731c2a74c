use crate::ledger::Ledger;
use crate::persist::Persister;
use crate::platform::{ActiveWindow, ForegroundProbe};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct SamplerConfig {
    pub poll_interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            // The only knob; constant for a given process lifetime.
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// The sampler's memory of the last committed context.
///
/// Turns the raw sample stream into committed segments: a segment is
/// produced exactly when the context changes and the elapsed time since
/// the previous change is positive. Durations come from a monotonic
/// clock; an apparent backwards step yields a zero duration and the
/// segment is dropped, but tracking re-anchors at the new instant.
struct Transitions {
    last: ActiveWindow,
    since: Instant,
}

impl Transitions {
    fn new(first: ActiveWindow, now: Instant) -> Self {
        Self { last: first, since: now }
    }

    fn observe(&mut self, ctx: ActiveWindow, now: Instant) -> Option<(ActiveWindow, Duration)> {
        if ctx == self.last {
            return None;
        }

        let duration = now.checked_duration_since(self.since).unwrap_or_default();
        let committed = std::mem::replace(&mut self.last, ctx);
        self.since = now;

        (!duration.is_zero()).then_some((committed, duration))
    }

    /// Commit the in-flight segment on shutdown.
    fn flush(self, now: Instant) -> Option<(ActiveWindow, Duration)> {
        let duration = now.checked_duration_since(self.since).unwrap_or_default();
        (!duration.is_zero()).then_some((self.last, duration))
    }
}

/// Owns the sampling loop: probe on a fixed cadence, commit entries to
/// the ledger on transition, persist after every commit.
pub struct SamplerService {
    config: SamplerConfig,
    running: Arc<AtomicBool>,
    ledger: Arc<Ledger>,
    persister: Arc<Persister>,
    probe: Arc<dyn ForegroundProbe>,
}

impl SamplerService {
    pub fn new(
        ledger: Arc<Ledger>,
        persister: Arc<Persister>,
        probe: Arc<dyn ForegroundProbe>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            ledger,
            persister,
            probe,
        }
    }

    pub fn start(&self) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let ledger = Arc::clone(&self.ledger);
        let persister = Arc::clone(&self.persister);
        let probe = Arc::clone(&self.probe);
        let poll_interval = self.config.poll_interval;

        thread::spawn(move || {
            let mut transitions = Transitions::new(probe.sample(), Instant::now());

            while running.load(Ordering::SeqCst) {
                thread::sleep(poll_interval);

                let ctx = probe.sample();
                if let Some((committed, duration)) = transitions.observe(ctx, Instant::now()) {
                    commit(&ledger, &persister, &committed, duration);
                }
            }

            // Graceful shutdown: the in-flight segment still counts.
            if let Some((committed, duration)) = transitions.flush(Instant::now()) {
                commit(&ledger, &persister, &committed, duration);
            } else if let Err(e) = persister.save(&ledger.snapshot()) {
                error!("Final activity save failed: {}", e);
            }
            info!("Sampler stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn commit(ledger: &Ledger, persister: &Persister, ctx: &ActiveWindow, duration: Duration) {
    ledger.append(&ctx.app_name, &ctx.title, duration);
    // The entry is already in the ledger; a failed save is retried in
    // full by the next transition's rewrite.
    if let Err(e) = persister.save(&ledger.snapshot()) {
        error!("Failed to save activity snapshot: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AppUsage;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn win(app_name: &str, title: &str) -> ActiveWindow {
        ActiveWindow {
            app_name: app_name.to_string(),
            title: title.to_string(),
        }
    }

    fn sec(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn identical_samples_produce_nothing() {
        let t0 = Instant::now();
        let mut transitions = Transitions::new(win("A.exe", "Doc1"), t0);

        assert!(transitions.observe(win("A.exe", "Doc1"), t0 + sec(1)).is_none());
        assert!(transitions.observe(win("A.exe", "Doc1"), t0 + sec(2)).is_none());
    }

    #[test]
    fn single_switch_commits_the_previous_context() {
        let t0 = Instant::now();
        let mut transitions = Transitions::new(win("A.exe", "Doc1"), t0);

        assert!(transitions.observe(win("A.exe", "Doc1"), t0 + sec(1)).is_none());
        let (ctx, duration) = transitions.observe(win("A.exe", "Doc2"), t0 + sec(2)).unwrap();
        assert_eq!(ctx, win("A.exe", "Doc1"));
        assert_eq!(duration, sec(2));
    }

    #[test]
    fn title_change_within_the_same_app_is_a_transition() {
        let t0 = Instant::now();
        let mut transitions = Transitions::new(win("A", "x"), t0);

        let (ctx, duration) = transitions.observe(win("A", "y"), t0 + sec(1)).unwrap();
        assert_eq!(ctx, win("A", "x"));
        assert_eq!(duration, sec(1));
    }

    #[test]
    fn multi_app_session_accumulates_per_app() {
        let t0 = Instant::now();
        let ledger = Ledger::new();
        let mut transitions = Transitions::new(win("A", "x"), t0);

        let observations = [
            (win("B", "y"), 3),
            (win("A", "z"), 5),
            (win("C", "w"), 8),
        ];
        for (ctx, at) in observations {
            if let Some((committed, duration)) = transitions.observe(ctx, t0 + sec(at)) {
                ledger.append(&committed.app_name, &committed.title, duration);
            }
        }

        let totals = ledger.totals();
        assert_eq!(
            totals,
            vec![
                ("A".to_string(), sec(6)),
                ("B".to_string(), sec(2)),
            ]
        );

        // C is the live context: nothing committed for it yet.
        let snapshot = ledger.snapshot();
        assert!(snapshot.iter().all(|u| u.app_name != "C"));

        let titles: Vec<String> = snapshot[0].tabs.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, ["x", "z"]);
    }

    #[test]
    fn empty_context_is_tracked_like_any_other() {
        let t0 = Instant::now();
        let ledger = Ledger::new();
        let mut transitions = Transitions::new(win("", ""), t0);

        let (committed, duration) = transitions.observe(win("A", "x"), t0 + sec(1)).unwrap();
        ledger.append(&committed.app_name, &committed.title, duration);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].app_name, "");
        assert_eq!(snapshot[0].tabs[0].title, "");
        assert_eq!(snapshot[0].tabs[0].duration, sec(1));
    }

    #[test]
    fn zero_elapsed_transition_is_dropped_but_reanchors() {
        let t0 = Instant::now();
        let mut transitions = Transitions::new(win("A", "x"), t0);

        // Two samples at the same monotonic instant.
        assert!(transitions.observe(win("B", "y"), t0).is_none());

        // The dropped context still became the tracked one.
        let (ctx, duration) = transitions.observe(win("A", "x"), t0 + sec(2)).unwrap();
        assert_eq!(ctx, win("B", "y"));
        assert_eq!(duration, sec(2));
    }

    #[test]
    fn backwards_clock_drops_the_segment_and_reanchors() {
        let t0 = Instant::now() + sec(10);
        let mut transitions = Transitions::new(win("A", "x"), t0);

        assert!(transitions.observe(win("B", "y"), t0 - sec(1)).is_none());

        let (ctx, duration) = transitions.observe(win("C", "z"), t0 + sec(4)).unwrap();
        assert_eq!(ctx, win("B", "y"));
        assert_eq!(duration, sec(5));
    }

    #[test]
    fn flush_commits_the_in_flight_segment() {
        let t0 = Instant::now();
        let transitions = Transitions::new(win("A", "x"), t0);

        let (ctx, duration) = transitions.flush(t0 + sec(3)).unwrap();
        assert_eq!(ctx, win("A", "x"));
        assert_eq!(duration, sec(3));
    }

    #[test]
    fn flush_at_the_same_instant_commits_nothing() {
        let t0 = Instant::now();
        let transitions = Transitions::new(win("A", "x"), t0);

        assert!(transitions.flush(t0).is_none());
    }

    /// Probe that replays a fixed script, repeating the last sample once
    /// exhausted.
    struct ScriptedProbe {
        samples: Mutex<Vec<ActiveWindow>>,
        index: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(samples: Vec<ActiveWindow>) -> Self {
            Self {
                samples: Mutex::new(samples),
                index: AtomicUsize::new(0),
            }
        }
    }

    impl ForegroundProbe for ScriptedProbe {
        fn sample(&self) -> ActiveWindow {
            let samples = self.samples.lock().unwrap();
            let i = self.index.fetch_add(1, Ordering::SeqCst).min(samples.len() - 1);
            samples[i].clone()
        }
    }

    #[test]
    fn service_starts_and_stops() {
        let dir = tempdir().unwrap();
        let service = SamplerService::new(
            Arc::new(Ledger::new()),
            Arc::new(Persister::new(dir.path().join("activity.json"))),
            Arc::new(ScriptedProbe::new(vec![win("A.exe", "Doc1")])),
            SamplerConfig {
                poll_interval: Duration::from_millis(5),
            },
        );

        assert!(!service.is_running());

        let handle = service.start();
        assert!(service.is_running());

        thread::sleep(Duration::from_millis(20));

        service.stop();
        handle.join().unwrap();

        assert!(!service.is_running());
    }

    #[test]
    fn service_commits_transitions_and_flushes_on_stop() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::new());
        let persister = Arc::new(Persister::new(dir.path().join("activity.json")));
        let service = SamplerService::new(
            Arc::clone(&ledger),
            Arc::clone(&persister),
            Arc::new(ScriptedProbe::new(vec![
                win("A.exe", "Doc1"),
                win("B.exe", "inbox"),
            ])),
            SamplerConfig {
                poll_interval: Duration::from_millis(5),
            },
        );

        let handle = service.start();
        thread::sleep(Duration::from_millis(50));
        service.stop();
        handle.join().unwrap();

        // A.exe was committed on the observed transition, B.exe by the
        // shutdown flush.
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].app_name, "A.exe");
        assert_eq!(snapshot[0].tabs.len(), 1);
        assert_eq!(snapshot[0].tabs[0].title, "Doc1");
        assert!(!snapshot[0].tabs[0].duration.is_zero());
        assert_eq!(snapshot[1].app_name, "B.exe");
        assert_eq!(snapshot[1].tabs.len(), 1);
        assert_eq!(snapshot[1].tabs[0].title, "inbox");

        // The file is the same snapshot the ledger holds.
        let on_disk: Vec<AppUsage> =
            serde_json::from_slice(&fs::read(persister.path()).unwrap()).unwrap();
        assert_eq!(on_disk, snapshot);
    }

    #[test]
    fn single_context_run_flushes_exactly_one_entry() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::new());
        let persister = Arc::new(Persister::new(dir.path().join("activity.json")));
        let service = SamplerService::new(
            Arc::clone(&ledger),
            Arc::clone(&persister),
            Arc::new(ScriptedProbe::new(vec![win("A.exe", "Doc1")])),
            SamplerConfig {
                poll_interval: Duration::from_millis(5),
            },
        );

        let handle = service.start();
        thread::sleep(Duration::from_millis(30));
        service.stop();
        handle.join().unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].app_name, "A.exe");
        assert_eq!(snapshot[0].tabs.len(), 1);
        assert!(snapshot[0].tabs[0].duration >= Duration::from_millis(30));
        assert!(persister.path().exists());
    }
}
