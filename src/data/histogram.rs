use crate::{error::Error, sink::Sink};
use std::fmt::Display;

/// A named histogram.
#[derive(Clone)]
pub struct Histogram {
    name: String,
    sink: Sink,
}

impl Histogram {
    /// Creates a histogram, failing if the name is empty.
    pub fn new(sink: Sink, name: &str) -> Result<Histogram, Error> {
        if name.is_empty() {
            return Err(Error::MissingName);
        }

        Ok(Histogram {
            name: name.to_owned(),
            sink,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    /// Adds a value to the distribution.
    pub fn update<V: Display>(&self, value: V) { self.sink.update_histogram(&self.name, value); }

    pub fn delete(&self) { self.sink.delete_histogram(&self.name); }
}
