use quanta::Instant;
use std::time::Duration;

/// Byte length at which a batch is flushed without waiting for the flush timer.
///
/// UDP sends start failing somewhere past 9k on some platforms, so this stays comfortably below
/// that.
pub(crate) const MAX_BATCH_BYTES: usize = 8164;

/// Buffer of encoded lines waiting to go out as a single datagram.
///
/// While batching is active, a recurring flush timer is armed every `interval`.  Turning
/// batching off disarms the timer but leaves anything already buffered in place; it goes out
/// with the next flush.
pub(crate) struct Batch {
    lines: Vec<String>,
    bytes: usize,
    interval: Duration,
    active: bool,
    next_flush: Option<Instant>,
}

impl Batch {
    pub(crate) fn new(interval: Duration) -> Batch {
        Batch {
            lines: Vec::new(),
            bytes: 0,
            interval,
            active: false,
            next_flush: None,
        }
    }

    /// Whether incoming lines are currently being buffered.
    pub(crate) fn is_active(&self) -> bool { self.active }

    /// Turns batching on and arms the flush timer.  Does nothing if already on.
    pub(crate) fn start(&mut self, now: Instant) {
        if !self.active {
            self.active = true;
            self.next_flush = Some(now + self.interval);
        }
    }

    /// Turns batching off and disarms the flush timer.
    pub(crate) fn stop(&mut self) {
        self.active = false;
        self.next_flush = None;
    }

    /// Disarms the flush timer without leaving batch mode.
    ///
    /// The timer is armed again by the next buffered line.
    pub(crate) fn disarm(&mut self) { self.next_flush = None; }

    /// Number of buffered lines.
    pub(crate) fn len(&self) -> usize { self.lines.len() }

    /// Combined byte length of the buffered lines.
    pub(crate) fn bytes(&self) -> usize { self.bytes }

    /// Buffers a line.
    ///
    /// If the buffer has reached `MAX_BATCH_BYTES` with this line, the whole buffer is handed
    /// back as a payload to send right away.
    pub(crate) fn push(&mut self, line: String, now: Instant) -> Option<String> {
        if self.active && self.next_flush.is_none() {
            self.next_flush = Some(now + self.interval);
        }

        self.bytes += line.len();
        self.lines.push(line);

        if self.bytes >= MAX_BATCH_BYTES {
            self.take()
        } else {
            None
        }
    }

    /// Drains the buffer into a single payload, if there is anything buffered.
    pub(crate) fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }

        let payload = self.lines.concat();
        self.lines.clear();
        self.bytes = 0;
        Some(payload)
    }

    /// Runs the flush timer if it has come due, rearming it for the next interval.
    pub(crate) fn upkeep(&mut self, now: Instant) -> Option<String> {
        match self.next_flush {
            Some(deadline) if now >= deadline => {
                self.next_flush = Some(now + self.interval);
                self.take()
            },
            _ => None,
        }
    }

    /// The next point in time at which the flush timer fires, if armed.
    pub(crate) fn next_deadline(&self) -> Option<Instant> { self.next_flush }
}
