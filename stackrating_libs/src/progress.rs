use std::time::{Duration, Instant};

/// Throttled progress logging for long running loops.
///
/// A line is logged at most once per interval, and always when the maximum is reached.
#[derive(Debug)]
pub struct Progress {
    message: String,
    progress: u64,
    max: u64,
    started_at: Instant,
    interval: Duration,
    last_logged_at: Option<Instant>,
    last_logged_progress: u64,
}

impl Progress {
    pub fn new(message: impl Into<String>, max: u64) -> Self {
        Self {
            message: message.into(),
            progress: 0,
            max,
            started_at: Instant::now(),
            interval: Duration::from_secs(30),
            last_logged_at: None,
            last_logged_progress: 0,
        }
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn inc(&mut self, steps: u64) {
        self.set(self.progress.saturating_add(steps), "");
    }

    /// Sets the absolute progress. `extra` is appended to the log line when not empty.
    pub fn set(&mut self, progress: u64, extra: &str) {
        self.progress = progress.min(self.max);
        let now = Instant::now();

        let due = match self.last_logged_at {
            Some(at) => now.duration_since(at) >= self.interval,
            None => true,
        };
        if !due && self.progress < self.max {
            return;
        }

        let since = self.last_logged_at.unwrap_or(self.started_at);
        let elapsed = now.duration_since(since).as_secs_f64();
        let speed = if elapsed > 0.0 {
            (self.progress - self.last_logged_progress.min(self.progress)) as f64 / elapsed
        } else {
            0.0
        };

        tracing::debug!(
            "{} @ {:.0}/s, {:3.0}%, est. time left: {}{}{}",
            self.message,
            speed,
            self.percentage(),
            self.time_left(now),
            if extra.is_empty() { "" } else { ", " },
            extra
        );

        self.last_logged_at = Some(now);
        self.last_logged_progress = self.progress;
    }

    pub fn percentage(&self) -> f64 {
        if self.max == 0 {
            100.0
        } else {
            100.0 * self.progress as f64 / self.max as f64
        }
    }

    fn time_left(&self, now: Instant) -> String {
        let elapsed = now.duration_since(self.started_at);
        if self.progress == 0 || elapsed < Duration::from_millis(100) {
            return String::from("n/a");
        }

        let total = elapsed.as_secs_f64() * self.max as f64 / self.progress as f64;
        let left = (total - elapsed.as_secs_f64()).max(0.0);
        format_duration(left)
    }
}

fn format_duration(seconds: f64) -> String {
    if seconds > 3600.0 {
        format!("{:.0} hrs", seconds / 3600.0)
    } else if seconds > 60.0 {
        format!("{:.0} min", seconds / 60.0)
    } else {
        format!("{:.0} sec", seconds)
    }
}
