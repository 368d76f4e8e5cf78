use crate::{
    configuration::Settings,
    data::{encode, terminate, Counter, Gauge, Histogram, Kind, Meter, Sample, Timer},
    dispatcher::Frame,
    error::Error,
    middleware::Middleware,
};
use crossbeam_channel::{Sender, TrySendError};
use log::trace;
use quanta::Clock;
use std::{
    fmt::Display,
    sync::{atomic::Ordering, Arc},
};

/// Handle for sending metrics to the dispatcher.
///
/// `Sink` is cloneable and can be moved across threads freely.  Every method is fire-and-forget:
/// nothing here ever reports a network problem or waits on the dispatcher.  Lines written while
/// the dispatcher's queue is full are dropped, and while the dispatcher is disabled, nothing is
/// even encoded.
pub struct Sink {
    data_tx: Sender<Frame>,
    settings: Arc<Settings>,
    clock: Clock,
}

impl Sink {
    pub(crate) fn new(data_tx: Sender<Frame>, settings: Arc<Settings>, clock: Clock) -> Sink {
        Sink {
            data_tx,
            settings,
            clock,
        }
    }

    /// Reference to the clock timers are measured with.
    pub fn clock(&self) -> &Clock { &self.clock }

    /// Whether metrics are currently being sent.
    pub fn enabled(&self) -> bool { self.settings.enabled.load(Ordering::Acquire) }

    /// The prefix prepended to every metric name, if any.
    pub fn prefix(&self) -> Option<&str> { self.settings.prefix.as_deref() }

    /// Writes a raw metricsd line, appending a trailing newline if it's missing.
    pub fn write(&self, line: &str) {
        if !self.enabled() {
            return;
        }

        self.send(terminate(line.to_owned()));
    }

    pub fn update_counter<V: Display>(&self, name: &str, value: V) { self.emit(name, Sample::Count(value)); }

    pub fn update_gauge<V: Display>(&self, name: &str, value: V) { self.emit(name, Sample::Gauge(value)); }

    pub fn update_histogram<V: Display>(&self, name: &str, value: V) { self.emit(name, Sample::Histogram(value)); }

    pub fn delete_counter(&self, name: &str) { self.delete(name, Kind::Counter); }

    pub fn delete_gauge(&self, name: &str) { self.delete(name, Kind::Gauge); }

    pub fn delete_histogram(&self, name: &str) { self.delete(name, Kind::Histogram); }

    pub fn delete_meter(&self, name: &str) { self.delete(name, Kind::Meter); }

    /// Marks an occurrence of the named event.  Does nothing for an empty name.
    pub fn mark(&self, name: &str) {
        if !name.is_empty() {
            self.emit::<u8>(name, Sample::Mark);
        }
    }

    /// Increments the named counter by one.  Does nothing for an empty name.
    pub fn inc(&self, name: &str) { self.inc_by(name, 1); }

    /// Increments the named counter.  Does nothing for an empty name.
    pub fn inc_by(&self, name: &str, delta: i64) {
        if !name.is_empty() {
            self.update_counter(name, delta);
        }
    }

    /// Decrements the named counter by one.  Does nothing for an empty name.
    pub fn dec(&self, name: &str) { self.dec_by(name, 1); }

    /// Decrements the named counter.  Does nothing for an empty name.
    pub fn dec_by(&self, name: &str, delta: i64) {
        if !name.is_empty() {
            self.update_counter(name, delta.saturating_neg());
        }
    }

    /// Creates a named counter, or `None` if the name is empty.
    pub fn count(&self, name: &str) -> Option<Counter> { Counter::new(self.clone(), name).ok() }

    /// Creates a named gauge, or `None` if the name is empty.
    pub fn gauge(&self, name: &str) -> Option<Gauge> { Gauge::new(self.clone(), name).ok() }

    /// Creates a named histogram, or `None` if the name is empty.
    pub fn histogram(&self, name: &str) -> Option<Histogram> { Histogram::new(self.clone(), name).ok() }

    /// Creates a named meter, or `None` if the name is empty.
    pub fn meter(&self, name: &str) -> Option<Meter> { Meter::new(self.clone(), name).ok() }

    /// Creates and starts a timer.
    ///
    /// The name is optional; a timer without one only emits when given a name at `stop`.  The
    /// elapsed time can always be read off the timer instead.
    pub fn time(&self, name: Option<&str>) -> Timer { Timer::new(self.clone(), name) }

    /// Times from now until the returned callback is first called.
    ///
    /// The elapsed time is sent to the named histogram right before `callback` runs.
    pub fn time_callback<F, A, R>(&self, name: &str, callback: F) -> Result<impl FnMut(A) -> R, Error>
    where
        F: FnMut(A) -> R,
    {
        if name.is_empty() {
            return Err(Error::MissingName);
        }

        let mut timer = self.time(Some(name));
        timer.start();
        Ok(timer.wrap(callback))
    }

    /// Creates the request instrumentation adapters bound to this sink.
    pub fn middleware(&self) -> Middleware { Middleware::new(self.clone()) }

    fn delete(&self, name: &str, kind: Kind) { self.emit::<u8>(name, Sample::Delete(kind)); }

    fn emit<V: Display>(&self, name: &str, sample: Sample<V>) {
        if !self.enabled() {
            return;
        }

        self.send(encode(self.prefix(), name, &sample));
    }

    /// Hands a line to the dispatcher without ever waiting on it.
    fn send(&self, line: String) {
        match self.data_tx.try_send(Frame::Write(line)) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => trace!("metrics dispatcher is behind, dropping line"),
            Err(TrySendError::Disconnected(_)) => trace!("metrics dispatcher is gone, dropping line"),
        }
    }
}

impl Clone for Sink {
    fn clone(&self) -> Sink {
        Sink {
            data_tx: self.data_tx.clone(),
            settings: self.settings.clone(),
            clock: self.clock.clone(),
        }
    }
}
