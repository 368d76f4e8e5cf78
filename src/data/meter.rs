use crate::{error::Error, sink::Sink};

/// A named meter, for measuring the rate at which an event happens.
#[derive(Clone)]
pub struct Meter {
    name: String,
    sink: Sink,
}

impl Meter {
    /// Creates a meter, failing if the name is empty.
    pub fn new(sink: Sink, name: &str) -> Result<Meter, Error> {
        if name.is_empty() {
            return Err(Error::MissingName);
        }

        Ok(Meter {
            name: name.to_owned(),
            sink,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    /// Marks one occurrence of the event.
    pub fn mark(&self) { self.sink.mark(&self.name); }

    pub fn delete(&self) { self.sink.delete_meter(&self.name); }
}

#[cfg(test)]
mod tests {
    use super::Meter;
    use crate::{configuration::Configuration, sink::testing::harness};

    #[test]
    fn test_meter_mark_and_delete() {
        let h = harness(Configuration::new().prefix("prod"));
        let meter = Meter::new(h.sink.clone(), "visitors").unwrap();
        assert!(Meter::new(h.sink.clone(), "").is_err());

        meter.mark();
        meter.mark();
        meter.delete();

        assert_eq!(h.lines(), vec!["prod.visitors\n", "prod.visitors\n", "prod.visitors:delete\n"]);
    }
}
