use crate::{error::Error, sink::Sink};
use std::fmt::Display;

/// A named gauge, for continuous values such as a queue depth or a database size.
#[derive(Clone)]
pub struct Gauge {
    name: String,
    sink: Sink,
}

impl Gauge {
    /// Creates a gauge, failing if the name is empty.
    pub fn new(sink: Sink, name: &str) -> Result<Gauge, Error> {
        if name.is_empty() {
            return Err(Error::MissingName);
        }

        Ok(Gauge {
            name: name.to_owned(),
            sink,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn update<V: Display>(&self, value: V) { self.sink.update_gauge(&self.name, value); }

    pub fn delete(&self) { self.sink.delete_gauge(&self.name); }
}
