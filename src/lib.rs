mod batch;
mod configuration;
mod control;
mod data;
mod dispatcher;
mod error;
mod middleware;
mod sink;
mod transport;

pub use self::{
    configuration::{Configuration, Options},
    control::{Controller, Status},
    data::{encode, Counter, Gauge, Histogram, Kind, Lap, Meter, Sample, Timer},
    dispatcher::Dispatcher,
    error::Error,
    middleware::{Exchange, Listener, Measure, MetricNames, Middleware},
    sink::Sink,
};
pub use quanta::{Clock, Instant};
