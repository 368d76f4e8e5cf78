use crate::{
    control::Controller,
    dispatcher::Dispatcher,
    error::Error,
    sink::Sink,
};
use quanta::Clock;
use serde::{Deserialize, Serialize};
use std::{
    net::UdpSocket,
    sync::{atomic::AtomicBool, Arc, Mutex},
    thread,
    time::Duration,
};

/// Shortest batch interval or idle timeout accepted.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A configuration builder for `Dispatcher`.
#[derive(Clone)]
pub struct Configuration {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) prefix: Option<String>,
    pub(crate) batch: bool,
    pub(crate) batch_interval: Duration,
    pub(crate) enabled: bool,
    pub(crate) timeout: Duration,
    pub(crate) socket: Option<Arc<UdpSocket>>,
    pub(crate) capacity: usize,
    pub(crate) clock: Option<Clock>,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            host: "localhost".to_owned(),
            port: 8125,
            prefix: None,
            batch: false,
            batch_interval: Duration::from_millis(250),
            enabled: true,
            timeout: Duration::from_millis(1000),
            socket: None,
            capacity: 1024,
            clock: None,
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration { Default::default() }

    /// Sets the host metrics are sent to.
    ///
    /// Defaults to `localhost`.
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port metrics are sent to.
    ///
    /// Defaults to `8125`.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the prefix for all metric names.
    ///
    /// Names are sent as `<prefix>.<name>`.  An empty prefix is the same as no prefix, which is
    /// the default.
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Sets whether metrics are batched into larger datagrams.
    ///
    /// Defaults to `false`.  Can be toggled later through `Controller::set_batch`.
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Sets how often batched metrics are flushed.
    ///
    /// Defaults to `250ms`.  Clamped to at least `1ms`.
    pub fn batch_interval(mut self, batch_interval: Duration) -> Self {
        self.batch_interval = batch_interval.max(MIN_INTERVAL);
        self
    }

    /// Sets whether metrics are sent at all.
    ///
    /// Defaults to `true`.  While disabled, every write is dropped before it is encoded and no
    /// socket is ever opened.  Can be toggled later through `Controller::set_enabled`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the idle timeout for the internal socket.
    ///
    /// Defaults to `1s`.  Clamped to at least `1ms`.
    ///
    /// The internal socket is closed once it has gone unused for longer than this, and is always
    /// closed ten times this long after it was opened, whether idle or not, so that anything the
    /// socket holds on to gets released.  The next write opens a new one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(MIN_INTERVAL);
        self
    }

    /// Sends through the given socket instead of an internal one.
    ///
    /// A provided socket is never closed by the dispatcher.
    pub fn socket(mut self, socket: Arc<UdpSocket>) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Sets the frame channel capacity.
    ///
    /// Defaults to `1024`.
    ///
    /// This controls how many writes can be queued for the dispatcher.  Writes made while the
    /// queue is full are dropped rather than waiting for the dispatcher to catch up.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sets the clock used for timers and socket reclamation.
    ///
    /// Mostly useful for driving time by hand with `Clock::mock`.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Create a `Dispatcher` based on this configuration.
    pub fn build(self) -> Dispatcher { Dispatcher::from_config(self) }

    /// Create a `Dispatcher` based on this configuration and run it on a background thread.
    ///
    /// The dispatcher runs until every `Sink` and `Controller` tied to it has been dropped.
    pub fn spawn(self) -> Result<(Sink, Controller), Error> {
        let dispatcher = self.build();
        let sink = dispatcher.get_sink();
        let controller = dispatcher.get_controller();

        thread::Builder::new()
            .name("metricsd-dispatcher".to_owned())
            .spawn(move || dispatcher.run())
            .map_err(Error::Spawn)?;

        Ok((sink, controller))
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings {
            host: self.host.clone(),
            port: self.port,
            prefix: self.prefix.clone(),
            timeout: self.timeout,
            batch_interval: self.batch_interval,
            socket: self.socket.clone(),
            enabled: AtomicBool::new(self.enabled),
            batch: Mutex::new(self.batch),
        }
    }
}

/// Plain options, as read from a config file.
///
/// Every field is optional; missing, zero and empty values fall back to the defaults of
/// `Configuration`.  Intervals are in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub prefix: Option<String>,
    pub batch: Option<bool>,
    pub batch_interval: Option<u64>,
    pub enabled: Option<bool>,
    pub timeout: Option<u64>,
}

impl From<Options> for Configuration {
    fn from(options: Options) -> Configuration {
        let mut conf = Configuration::new();
        if let Some(host) = options.host.filter(|h| !h.is_empty()) {
            conf = conf.host(host);
        }
        if let Some(port) = options.port.filter(|p| *p != 0) {
            conf = conf.port(port);
        }
        if let Some(prefix) = options.prefix {
            conf = conf.prefix(prefix);
        }
        if let Some(batch) = options.batch {
            conf = conf.batch(batch);
        }
        if let Some(ms) = options.batch_interval.filter(|ms| *ms != 0) {
            conf = conf.batch_interval(Duration::from_millis(ms));
        }
        if let Some(enabled) = options.enabled {
            conf = conf.enabled(enabled);
        }
        if let Some(ms) = options.timeout.filter(|ms| *ms != 0) {
            conf = conf.timeout(Duration::from_millis(ms));
        }
        conf
    }
}

/// Settings shared between a dispatcher and its handles.
///
/// Everything is fixed at build time except for the two toggles.
pub(crate) struct Settings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) prefix: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) batch_interval: Duration,
    pub(crate) socket: Option<Arc<UdpSocket>>,
    pub(crate) enabled: AtomicBool,
    /// Held while a batch toggle is sent, so toggles reach the dispatcher in the order they were
    /// applied here.
    pub(crate) batch: Mutex<bool>,
}
