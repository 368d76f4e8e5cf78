use crate::sink::Sink;
use quanta::Instant;
use std::time::Duration;

/// A single recorded lap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lap {
    /// Name of the lap; empty for anonymous laps.
    pub name: String,
    pub time: Duration,
}

/// A stopwatch that reports to histograms.
///
/// Timers start running as soon as they're created.  Stopping a timer sends the elapsed time,
/// in whole milliseconds, to the histogram named at `stop` or, failing that, to the histogram
/// named when the timer was created.  Named laps are sent the same way.
///
/// Stopping is idempotent: only the first `stop` after a `start` measures or sends anything.
pub struct Timer {
    sink: Sink,
    name: Option<String>,
    start_time: Instant,
    lap_start_time: Instant,
    laps: Vec<Lap>,
    stop_time: Option<Instant>,
}

impl Timer {
    /// Creates a timer and starts it.
    ///
    /// An empty name is the same as no name.
    pub fn new(sink: Sink, name: Option<&str>) -> Timer {
        let now = sink.clock().now();
        let mut timer = Timer {
            name: name.filter(|n| !n.is_empty()).map(str::to_owned),
            sink,
            start_time: now,
            lap_start_time: now,
            laps: Vec::new(),
            stop_time: None,
        };
        timer.start();
        timer
    }

    pub fn name(&self) -> Option<&str> { self.name.as_deref() }

    /// Starts, or restarts, the timer.
    ///
    /// Recorded laps are kept.
    pub fn start(&mut self) {
        self.start_time = self.sink.clock().now();
        self.lap_start_time = self.start_time;
        self.stop_time = None;
    }

    /// Restarts the current lap without recording anything.
    pub fn reset_lap_timer(&mut self) { self.lap_start_time = self.sink.clock().now(); }

    /// Records a lap, returning its duration.
    ///
    /// If the lap is named, its duration is also sent to the histogram of that name.
    pub fn lap(&mut self, name: Option<&str>) -> Duration {
        let now = self.sink.clock().now();
        let time = now.saturating_duration_since(self.lap_start_time);
        self.lap_start_time = now;

        let name = name.unwrap_or("");
        self.laps.push(Lap {
            name: name.to_owned(),
            time,
        });

        if !name.is_empty() {
            self.sink.update_histogram(name, time.as_millis());
        }

        time
    }

    /// Stops the timer, returning the total elapsed time.
    ///
    /// Returns `None`, and sends nothing, if the timer was already stopped.  With neither a name
    /// given here nor one given at creation, the elapsed time is returned but not sent.
    pub fn stop(&mut self, name: Option<&str>) -> Option<Duration> {
        if self.stopped() {
            return None;
        }

        let now = self.sink.clock().now();
        self.stop_time = Some(now);
        let elapsed = now.saturating_duration_since(self.start_time);

        let name = name.filter(|n| !n.is_empty()).or_else(|| self.name());
        if let Some(name) = name {
            self.sink.update_histogram(name, elapsed.as_millis());
        }

        Some(elapsed)
    }

    /// Time since the timer was last started.
    pub fn elapsed(&self) -> Duration { self.sink.clock().now().saturating_duration_since(self.start_time) }

    pub fn running(&self) -> bool { self.stop_time.is_none() }

    pub fn stopped(&self) -> bool { self.stop_time.is_some() }

    pub fn laps(&self) -> &[Lap] { &self.laps }

    pub fn start_time(&self) -> Instant { self.start_time }

    pub fn lap_start_time(&self) -> Instant { self.lap_start_time }

    pub fn stop_time(&self) -> Option<Instant> { self.stop_time }

    /// Wraps a callback so that the timer stops right before the callback runs.
    ///
    /// The wrapped callback can be called any number of times; only the first call stops the
    /// timer.
    pub fn wrap<F, A, R>(mut self, mut callback: F) -> impl FnMut(A) -> R
    where
        F: FnMut(A) -> R,
    {
        move |args| {
            self.stop(None);
            callback(args)
        }
    }
}
