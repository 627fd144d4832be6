use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Cross-cutting logger for per-frame worker events.
///
/// Lets the frame use case report stage timings and metrics without knowing
/// whether anyone aggregates them.
pub trait WorkerLogger: Send {
    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. detection count).
    fn metric(&mut self, name: &str, value: f64);

    /// Count one fully served frame.
    fn frame_done(&mut self);

    /// Emit a shutdown summary. `selections` maps resolution to frames served.
    fn summary(&self, _selections: &BTreeMap<u32, u64>) {}
}

/// Discards all events. Used by tests where logger output is irrelevant.
pub struct NullWorkerLogger;

impl WorkerLogger for NullWorkerLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn frame_done(&mut self) {}
}

/// Aggregates stage timings and metrics and logs a summary on shutdown.
///
/// Output goes through the `log` facade, so it lands wherever the binary
/// pointed the logger (stderr).
pub struct StderrWorkerLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: u64,
}

impl StderrWorkerLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Returns the formatted summary, or `None` if no frame was served.
    pub fn summary_string(&self, selections: &BTreeMap<u32, u64>) -> Option<String> {
        if self.frames == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Worker summary ({frames} frames, {:.1}s uptime):",
            elapsed_ms / 1000.0
        )];

        for (resolution, count) in selections {
            lines.push(format!("  model {resolution}x{resolution}: {count} frames"));
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = average(durations);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", average(&self.metrics[name])));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for StderrWorkerLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl WorkerLogger for StderrWorkerLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn frame_done(&mut self) {
        self.frames += 1;
    }

    fn summary(&self, selections: &BTreeMap<u32, u64>) {
        match self.summary_string(selections) {
            Some(text) => log::info!("{text}"),
            None => log::info!("Worker summary: no frames served"),
        }
    }
}
