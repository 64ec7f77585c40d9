use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

/// Per-phase timing for the computations run on this thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub phases: Vec<PhaseTiming>,
}

/// Accumulated timing for one named phase (e.g. `retention.replay`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTiming {
    pub name: String,
    /// Sum of all recorded runs of this phase.
    pub total: Duration,
    /// Slowest single run.
    pub max: Duration,
    pub count: usize,
}

thread_local! {
    static SAMPLES: RefCell<Vec<(&'static str, Duration)>> = const { RefCell::new(Vec::new()) };
}

/// Process-wide switch. Only decides whether samples are recorded; retention
/// results never depend on it.
static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `RETAIN_TIMING` enables timing collection.
///
/// Supported truthy values: `1`, `true`, `yes`, `on` (case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("RETAIN_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(value.as_str()))
}

/// Enable or disable timing collection.
///
/// Samples accumulate on each thread until [`collect_report`] drains them,
/// so long-running callers that enable timing must collect periodically.
/// Disabling clears the current thread's samples.
pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

/// Clears all recorded timings for the current thread.
pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its duration under `phase` when timing is enabled.
pub fn timed<R>(phase: &'static str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed();
    SAMPLES.with(|samples| samples.borrow_mut().push((phase, elapsed)));
    result
}

/// Drain this thread's samples into a report, phases sorted by name.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<&'static str, PhaseTiming> = BTreeMap::new();
    for (phase, elapsed) in samples {
        let timing = grouped.entry(phase).or_insert_with(|| PhaseTiming {
            name: phase.to_string(),
            total: Duration::ZERO,
            max: Duration::ZERO,
            count: 0,
        });
        timing.total += elapsed;
        timing.max = timing.max.max(elapsed);
        timing.count += 1;
    }

    TimingReport {
        phases: grouped.into_values().collect(),
    }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Sum of every phase's total.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.phases.iter().map(|phase| phase.total).sum()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let phases = self
            .phases
            .iter()
            .map(|phase| {
                json!({
                    "name": phase.name,
                    "count": phase.count,
                    "total_us": phase.total.as_micros(),
                    "max_us": phase.max.as_micros(),
                })
            })
            .collect::<Vec<_>>();

        json!({ "phases": phases, "total_us": self.total().as_micros() })
    }

    /// Render the report as a simple table for terminal output.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.phases.is_empty() {
            return "No timing samples recorded.".to_string();
        }

        let mut out = String::new();
        out.push_str("phase                        count      total        max\n");
        out.push_str("--------------------------------------------------------\n");

        for phase in &self.phases {
            out.push_str(&format!(
                "{:<28} {:>5} {:>10} {:>10}\n",
                phase.name,
                phase.count,
                format_duration(phase.total),
                format_duration(phase.max)
            ));
        }

        out
    }
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        let secs = micros / 1_000_000;
        let millis = (micros % 1_000_000) / 1_000;
        format!("{secs}.{millis:03}s")
    } else if micros >= 1_000 {
        let millis = micros / 1_000;
        let rem = micros % 1_000;
        format!("{millis}.{rem:03}ms")
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn timed_does_not_record_when_disabled() {
        let _guard = TEST_GUARD.lock().expect("test guard lock");
        set_timing_enabled(false);

        assert_eq!(timed("retention.sort", || 7_u8), 7);
        assert!(collect_report().is_empty());
    }

    #[test]
    fn repeated_phases_accumulate() {
        let _guard = TEST_GUARD.lock().expect("test guard lock");
        set_timing_enabled(true);
        clear_timings();

        timed("retention.replay", || std::thread::sleep(Duration::from_millis(1)));
        timed("retention.replay", || ());
        timed("retention.collect", || ());

        let report = collect_report();
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.phases[0].name, "retention.collect");
        assert_eq!(report.phases[1].name, "retention.replay");
        assert_eq!(report.phases[1].count, 2);
        assert!(report.phases[1].max >= Duration::from_millis(1));
        assert!(report.phases[1].total >= report.phases[1].max);
        assert!(collect_report().is_empty(), "collect drains samples");

        set_timing_enabled(false);
    }

    #[test]
    fn disabling_discards_pending_samples() {
        let _guard = TEST_GUARD.lock().expect("test guard lock");
        set_timing_enabled(true);
        clear_timings();

        timed("retention.sort", || ());
        timed("retention.sort", || ());
        set_timing_enabled(false);
        set_timing_enabled(true);

        assert!(collect_report().is_empty());
        set_timing_enabled(false);
    }

    #[test]
    fn json_and_table_render() {
        let report = TimingReport {
            phases: vec![PhaseTiming {
                name: "retention.sort".into(),
                total: Duration::from_micros(1_500),
                max: Duration::from_micros(900),
                count: 2,
            }],
        };

        let json = report.to_json();
        assert_eq!(json["phases"][0]["total_us"], 1_500);
        assert_eq!(json["total_us"], 1_500);

        let table = report.display_table();
        assert!(table.contains("retention.sort"));
        assert!(table.contains("1.500ms"));
        assert!(table.contains("900µs"));
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "TRUE", "yes", "On"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["0", "false", "", "enabled"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
