use crate::{
    batch::Batch,
    configuration::{Configuration, Settings},
    control::{Controller, Status},
    sink::Sink,
    transport::Transport,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace};
use quanta::{Clock, Instant};
use std::sync::Arc;

/// Unit of work sent from handles to the dispatcher.
///
/// Writes and control messages share a single channel so that they are handled in exactly the
/// order they were made: a write made right after turning batching off must not be buffered.
pub(crate) enum Frame {
    Write(String),
    Batch(bool),
    Flush,
    Close,
    Status(Sender<Status>),
}

/// Metrics dispatcher which batches encoded lines and sends them over the network.
///
/// All socket and batch state is owned by the dispatcher and only touched from `run`, so timers
/// and writes never interleave.
pub struct Dispatcher {
    data_tx: Sender<Frame>,
    settings: Arc<Settings>,
    clock: Clock,
    state: State,
}

/// The part of the dispatcher that `run` works on.
struct State {
    data_rx: Receiver<Frame>,
    clock: Clock,
    transport: Transport,
    batch: Batch,
}

impl Dispatcher {
    pub(crate) fn from_config(conf: Configuration) -> Dispatcher {
        let (data_tx, data_rx) = bounded(conf.capacity);
        let clock = conf.clock.clone().unwrap_or_else(Clock::new);
        let settings = Arc::new(conf.settings());

        let transport = Transport::new(
            conf.host.clone(),
            conf.port,
            conf.timeout,
            conf.socket.clone(),
            clock.clone(),
        );

        let mut batch = Batch::new(conf.batch_interval);
        if conf.batch {
            batch.start(clock.now());
        }

        Dispatcher {
            data_tx,
            settings,
            clock: clock.clone(),
            state: State {
                data_rx,
                clock,
                transport,
                batch,
            },
        }
    }

    /// Gets a builder to configure a `Dispatcher` instance with.
    pub fn builder() -> Configuration { Configuration::default() }

    /// Creates a `Sink` bound to this dispatcher.
    pub fn get_sink(&self) -> Sink { Sink::new(self.data_tx.clone(), self.settings.clone(), self.clock.clone()) }

    /// Creates a `Controller` bound to this dispatcher.
    pub fn get_controller(&self) -> Controller { Controller::new(self.data_tx.clone(), self.settings.clone()) }

    /// Run the dispatcher.
    ///
    /// Returns once every `Sink` and `Controller` created from this dispatcher has been dropped.
    /// Lines still sitting in the batch buffer at that point are dropped, and the internal
    /// socket is closed.
    pub fn run(self) {
        let Dispatcher { data_tx, mut state, .. } = self;
        drop(data_tx);

        debug!("metrics dispatcher started");
        state.run();
        debug!("metrics dispatcher stopped");
    }
}

impl State {
    fn run(&mut self) {
        loop {
            let frame = match self.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(self.clock.now());
                    self.data_rx.recv_timeout(wait)
                },
                None => self.data_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match frame {
                Ok(frame) => self.process_frame(frame),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.upkeep();
        }

        if self.batch.len() > 0 {
            debug!("dropping {} batched lines on shutdown", self.batch.len());
        }
        self.transport.close();
    }

    fn process_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Write(line) => self.write(line),
            Frame::Batch(true) => self.batch.start(self.clock.now()),
            Frame::Batch(false) => self.batch.stop(),
            Frame::Flush => self.flush(),
            Frame::Close => {
                self.transport.close();
                self.batch.disarm();
            },
            Frame::Status(tx) => {
                let _ = tx.send(self.status());
            },
        }
    }

    fn write(&mut self, line: String) {
        if self.batch.is_active() {
            if let Some(payload) = self.batch.push(line, self.clock.now()) {
                trace!("batch full, flushing {} bytes", payload.len());
                self.transport.send(payload.as_bytes());
            }
        } else {
            self.transport.send(line.as_bytes());
        }
    }

    fn flush(&mut self) {
        if let Some(payload) = self.batch.take() {
            trace!("flushing {} batched bytes", payload.len());
            self.transport.send(payload.as_bytes());
        }
    }

    /// Fires whichever timers have come due.
    fn upkeep(&mut self) {
        let now = self.clock.now();
        if let Some(payload) = self.batch.upkeep(now) {
            trace!("flush timer fired, flushing {} bytes", payload.len());
            self.transport.send(payload.as_bytes());
        }
        self.transport.upkeep(now);
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.batch.next_deadline(), self.transport.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn status(&self) -> Status {
        Status {
            socket_open: self.transport.is_open(),
            batch: self.batch.is_active(),
            buffered_lines: self.batch.len(),
            buffered_bytes: self.batch.bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Dispatcher;
    use crossbeam_channel::unbounded;
    use std::{net::UdpSocket, thread, time::Duration};

    fn listener() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv(socket: &UdpSocket) -> Option<String> {
        let mut buf = [0u8; 9000];
        socket
            .recv(&mut buf)
            .ok()
            .map(|n| String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    #[test]
    fn test_dispatcher_stops_when_handles_drop() {
        let dispatcher = Dispatcher::builder().build();
        let sink = dispatcher.get_sink();
        let controller = dispatcher.get_controller();

        let handle = thread::spawn(move || dispatcher.run());
        drop(sink);
        drop(controller);

        handle.join().unwrap();
    }

    #[test]
    fn test_sink_never_waits_on_full_queue() {
        let (rx, port) = listener();
        let dispatcher = Dispatcher::builder().host("127.0.0.1").port(port).capacity(1).build();
        let sink = dispatcher.get_sink();

        // Nothing is draining the queue yet, so the second write has to be dropped.
        let (done_tx, done_rx) = unbounded();
        thread::spawn(move || {
            sink.inc("a");
            sink.inc("b");
            let _ = done_tx.send(sink);
        });
        let sink = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("writes blocked on a full queue");

        let controller = dispatcher.get_controller();
        thread::spawn(move || dispatcher.run());
        assert_eq!(recv(&rx).as_deref(), Some("a:1|c\n"));

        sink.inc("c");
        assert_eq!(recv(&rx).as_deref(), Some("c:1|c\n"));
        assert_eq!(controller.status().unwrap().buffered_lines, 0);
    }

    #[test]
    fn test_dispatcher_close_keeps_batch_mode() {
        let (rx, port) = listener();
        let dispatcher = Dispatcher::builder()
            .host("127.0.0.1")
            .port(port)
            .batch(true)
            .batch_interval(Duration::from_millis(20))
            .build();
        let sink = dispatcher.get_sink();
        let controller = dispatcher.get_controller();
        thread::spawn(move || dispatcher.run());

        sink.write("a:1|c");
        assert_eq!(recv(&rx).as_deref(), Some("a:1|c\n"));
        assert!(controller.status().unwrap().socket_open);

        controller.close();
        let status = controller.status().unwrap();
        assert!(!status.socket_open);
        assert!(status.batch);

        // The flush timer comes back with the next buffered line.
        sink.write("b:1|c");
        assert_eq!(recv(&rx).as_deref(), Some("b:1|c\n"));
    }

    #[test]
    fn test_dispatcher_reclaims_idle_socket() {
        let (rx, port) = listener();
        let (sink, controller) = Dispatcher::builder()
            .host("127.0.0.1")
            .port(port)
            .timeout(Duration::from_millis(50))
            .spawn()
            .unwrap();

        sink.update_gauge("g", 1);
        assert_eq!(recv(&rx).as_deref(), Some("g:1|g\n"));
        assert!(controller.status().unwrap().socket_open);

        // One reclamation tick past the idle timeout.
        thread::sleep(Duration::from_millis(600));
        assert!(!controller.status().unwrap().socket_open);
    }
}
