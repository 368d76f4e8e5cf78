use crate::{error::Error, sink::Sink};

/// A named counter.
///
/// Can be incremented or decremented, which is handy when there's no absolute value at hand.
/// If there is one, a `Gauge` is usually the better fit.
#[derive(Clone)]
pub struct Counter {
    name: String,
    sink: Sink,
}

impl Counter {
    /// Creates a counter, failing if the name is empty.
    pub fn new(sink: Sink, name: &str) -> Result<Counter, Error> {
        if name.is_empty() {
            return Err(Error::MissingName);
        }

        Ok(Counter {
            name: name.to_owned(),
            sink,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn increment(&self) { self.increment_by(1); }

    pub fn increment_by(&self, delta: i64) { self.sink.update_counter(&self.name, delta); }

    pub fn decrement(&self) { self.decrement_by(1); }

    /// Decrements the counter, sending the negated delta.
    pub fn decrement_by(&self, delta: i64) { self.sink.update_counter(&self.name, delta.saturating_neg()); }

    /// Tells the server to stop tracking this counter.
    pub fn delete(&self) { self.sink.delete_counter(&self.name); }
}
