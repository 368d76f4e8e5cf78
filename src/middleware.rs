use crate::{data::Timer, sink::Sink};
use std::{fmt, sync::Arc, time::Duration};

/// A one-shot lifecycle listener.
pub type Listener<E> = Box<dyn FnOnce(&E) + Send>;

/// The request/response lifecycle of whatever HTTP framework is in use.
///
/// Implementations carry a slot for a per-request `Timer` and let listeners be registered for
/// named lifecycle events, such as the response finishing.
pub trait Exchange: Sized {
    /// The timer attached to this request, if any.
    fn timer(&self) -> Option<&Timer>;

    /// Attaches a timer to this request.
    fn set_timer(&mut self, timer: Timer);

    /// Registers a listener to be called the first time `event` fires, and never again.
    fn once(&mut self, event: &str, listener: Listener<Self>);
}

type Resolver<E> = dyn Fn(&E, &str, Duration) -> Vec<String> + Send + Sync;

/// Histogram name(s) a measurement is sent to.
pub enum MetricNames<E> {
    /// Fixed names.
    Literal(Vec<String>),

    /// Names computed when the event fires, from the request, the event name and the elapsed
    /// time.
    Resolver(Arc<Resolver<E>>),
}

impl<E> MetricNames<E> {
    /// Builds names that are looked up when the event fires.
    pub fn resolver<F>(f: F) -> MetricNames<E>
    where
        F: Fn(&E, &str, Duration) -> Vec<String> + Send + Sync + 'static,
    {
        MetricNames::Resolver(Arc::new(f))
    }

    /// Resolves the names for a fired event.
    pub fn resolve(&self, exchange: &E, event: &str, elapsed: Duration) -> Vec<String> {
        match self {
            MetricNames::Literal(names) => names.clone(),
            MetricNames::Resolver(f) => f(exchange, event, elapsed),
        }
    }
}

impl<E> Clone for MetricNames<E> {
    fn clone(&self) -> MetricNames<E> {
        match self {
            MetricNames::Literal(names) => MetricNames::Literal(names.clone()),
            MetricNames::Resolver(f) => MetricNames::Resolver(f.clone()),
        }
    }
}

impl<E> fmt::Debug for MetricNames<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricNames::Literal(names) => f.debug_tuple("Literal").field(names).finish(),
            MetricNames::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl<E> From<&str> for MetricNames<E> {
    fn from(name: &str) -> MetricNames<E> { MetricNames::Literal(vec![name.to_owned()]) }
}

impl<E> From<String> for MetricNames<E> {
    fn from(name: String) -> MetricNames<E> { MetricNames::Literal(vec![name]) }
}

impl<E> From<Vec<String>> for MetricNames<E> {
    fn from(names: Vec<String>) -> MetricNames<E> { MetricNames::Literal(names) }
}

impl<E> From<Vec<&str>> for MetricNames<E> {
    fn from(names: Vec<&str>) -> MetricNames<E> {
        MetricNames::Literal(names.into_iter().map(str::to_owned).collect())
    }
}

/// Request instrumentation bound to a `Sink`.
///
/// Created once through `Sink::middleware` and then shared with the HTTP layer.
#[derive(Clone)]
pub struct Middleware {
    sink: Sink,
}

impl Middleware {
    pub(crate) fn new(sink: Sink) -> Middleware { Middleware { sink } }

    /// Makes sure the request has a timer attached, leaving an existing one alone.
    ///
    /// Should run as early as possible for each request so that timings are accurate.
    pub fn timer<E: Exchange>(&self, exchange: &mut E) {
        if exchange.timer().is_none() {
            exchange.set_timer(self.sink.time(None));
        }
    }

    /// Measures the time from the request's timer start until `event` fires.
    ///
    /// The returned `Measure` should be run on every request.
    pub fn measure<E: Exchange, N: Into<MetricNames<E>>>(&self, event: &str, names: N) -> Measure<E> {
        Measure {
            middleware: self.clone(),
            event: event.to_owned(),
            names: names.into(),
        }
    }

    /// Runs `filter` and sends the time it took to the named histogram.
    pub fn time_filter<F, R>(&self, name: &str, filter: F) -> R
    where
        F: FnOnce() -> R,
    {
        let mut timer = self.sink.time(None);
        let result = filter();
        timer.stop(Some(name));
        result
    }
}

/// Measures the time until a lifecycle event fires.  See `Middleware::measure`.
pub struct Measure<E> {
    middleware: Middleware,
    event: String,
    names: MetricNames<E>,
}

impl<E> Measure<E> {
    pub fn event(&self) -> &str { &self.event }
}

impl<E: Exchange + 'static> Measure<E> {
    /// Attaches a timer to the request if needed, and listens for the event.
    pub fn handle(&self, exchange: &mut E) {
        self.middleware.timer(exchange);

        let sink = self.middleware.sink.clone();
        let names = self.names.clone();
        let event = self.event.clone();
        exchange.once(
            &self.event,
            Box::new(move |exchange: &E| {
                let elapsed = match exchange.timer() {
                    Some(timer) => timer.elapsed(),
                    None => return,
                };

                for name in names.resolve(exchange, &event, elapsed) {
                    sink.update_histogram(&name, elapsed.as_millis());
                }
            }),
        );
    }
}
