use std::fmt::{self, Display};

pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod timer;

pub use self::{
    counter::Counter,
    gauge::Gauge,
    histogram::Histogram,
    meter::Meter,
    timer::{Lap, Timer},
};

/// The kind of metric a line refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Counter,
    Gauge,
    Histogram,
    Meter,
}

impl Kind {
    /// Type marker appended after the value, if the kind has one.
    fn marker(self) -> Option<char> {
        match self {
            Kind::Counter => Some('c'),
            Kind::Gauge => Some('g'),
            Kind::Histogram => Some('h'),
            Kind::Meter => None,
        }
    }
}

/// A measurement.
///
/// Samples are the decoupled way of describing what should go on the wire for a given metric
/// name.  They carry no name themselves; see [`encode`].
#[derive(Debug)]
pub enum Sample<V> {
    /// A counter delta.
    ///
    /// Negative deltas decrement the counter on the server side.
    Count(V),

    /// A point-in-time value.
    Gauge(V),

    /// A single value to be added to a distribution.
    Histogram(V),

    /// An occurrence of a metered event.  Goes on the wire as the bare name.
    Mark,

    /// Asks the server to stop tracking the metric.
    Delete(Kind),
}

/// A metric name, optionally prefixed.
///
/// Displays as `prefix.name`, or just `name` with no prefix, with every whitespace character
/// replaced by an underscore.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MetricName<'a> {
    prefix: Option<&'a str>,
    name: &'a str,
}

impl<'a> MetricName<'a> {
    pub(crate) fn new(prefix: Option<&'a str>, name: &'a str) -> MetricName<'a> {
        MetricName { prefix, name }
    }
}

impl<'a> Display for MetricName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let scrub = |s: &str| s.replace(char::is_whitespace, "_");
        match self.prefix {
            Some(prefix) => write!(f, "{}.{}", scrub(prefix), scrub(self.name)),
            None => write!(f, "{}", scrub(self.name)),
        }
    }
}

/// Encodes a sample for the given metric name into a newline-terminated wire line.
pub fn encode<V: Display>(prefix: Option<&str>, name: &str, sample: &Sample<V>) -> String {
    let name = MetricName::new(prefix, name);
    let line = match sample {
        Sample::Count(value) => format!("{}:{}|c", name, value),
        Sample::Gauge(value) => format!("{}:{}|g", name, value),
        Sample::Histogram(value) => format!("{}:{}|h", name, value),
        Sample::Mark => name.to_string(),
        Sample::Delete(kind) => match kind.marker() {
            Some(marker) => format!("{}:delete|{}", name, marker),
            None => format!("{}:delete", name),
        },
    };

    terminate(line)
}

/// Appends a trailing newline unless the line already ends with one.
pub fn terminate(mut line: String) -> String {
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}
