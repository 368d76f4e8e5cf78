use crate::{configuration::Settings, dispatcher::Frame, error::Error};
use crossbeam_channel::{bounded, Sender};
use std::{
    net::UdpSocket,
    sync::{atomic::Ordering, Arc, PoisonError},
    time::Duration,
};

/// Point-in-time view of the dispatcher's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// Whether the dispatcher holds a socket it opened itself.
    pub socket_open: bool,
    /// Whether writes are being batched.
    pub batch: bool,
    /// Number of lines waiting for the next batch flush.
    pub buffered_lines: usize,
    /// Combined byte length of the lines waiting for the next batch flush.
    pub buffered_bytes: usize,
}

/// Handle for adjusting and inspecting a running dispatcher.
#[derive(Clone)]
pub struct Controller {
    data_tx: Sender<Frame>,
    settings: Arc<Settings>,
}

impl Controller {
    pub(crate) fn new(data_tx: Sender<Frame>, settings: Arc<Settings>) -> Controller {
        Controller { data_tx, settings }
    }

    pub fn host(&self) -> &str { &self.settings.host }

    pub fn port(&self) -> u16 { self.settings.port }

    pub fn prefix(&self) -> Option<&str> { self.settings.prefix.as_deref() }

    pub fn timeout(&self) -> Duration { self.settings.timeout }

    pub fn batch_interval(&self) -> Duration { self.settings.batch_interval }

    /// The caller-provided socket, if one was configured.
    pub fn socket(&self) -> Option<&Arc<UdpSocket>> { self.settings.socket.as_ref() }

    pub fn enabled(&self) -> bool { self.settings.enabled.load(Ordering::Acquire) }

    /// Enables or disables sending.
    ///
    /// Takes effect immediately for every `Sink`: writes made while disabled are dropped on the
    /// spot.
    pub fn set_enabled(&self, enabled: bool) { self.settings.enabled.store(enabled, Ordering::Release); }

    pub fn batch(&self) -> bool { *self.settings.batch.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Turns batching on or off.
    ///
    /// Turning it off stops the flush timer and sends every later write as its own datagram.
    /// Lines already buffered are not flushed; they go out with the first flush after batching
    /// is turned back on, or with an explicit `flush`.
    pub fn set_batch(&self, batch: bool) {
        let mut current = self.settings.batch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != batch {
            *current = batch;
            let _ = self.data_tx.send(Frame::Batch(batch));
        }
    }

    /// Sends any batched lines right away.
    pub fn flush(&self) { let _ = self.data_tx.send(Frame::Flush); }

    /// Closes the internal socket and cancels its timers, along with the batch flush timer.
    ///
    /// Safe to call at any time.  A later write simply opens a new socket.
    pub fn close(&self) { let _ = self.data_tx.send(Frame::Close); }

    /// Gets the current status of the dispatcher.
    ///
    /// Frames are handled in order, so the status reflects every write and toggle made before
    /// this call.
    pub fn status(&self) -> Result<Status, Error> {
        let (tx, rx) = bounded(1);
        self.data_tx.send(Frame::Status(tx)).map_err(|_| Error::Disconnected)?;
        rx.recv().map_err(|_| Error::Disconnected)
    }
}
