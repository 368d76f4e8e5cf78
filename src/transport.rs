use log::debug;
use quanta::{Clock, Instant};
use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
    time::Duration,
};

/// How often an owned socket is checked for idleness.
pub(crate) const RECLAIM_INTERVAL: Duration = Duration::from_millis(250);

/// Multiple of the idle timeout after which an owned socket is closed regardless of activity.
pub(crate) const FORCED_CLOSE_FACTOR: u32 = 10;

/// A socket opened by the transport, along with its reclamation schedule.
///
/// The socket and both of its timers live and die together.
struct Owned {
    socket: UdpSocket,
    last_use: Instant,
    next_reclaim: Instant,
    close_at: Instant,
}

/// Datagram transport for encoded metric lines.
///
/// Sends through a caller-supplied socket if one was configured, never opening or closing
/// anything of its own in that case.  Otherwise, a socket is opened on first use, closed once it
/// has been idle for longer than `timeout`, and unconditionally closed `10 * timeout` after it
/// was opened.  The next send after a close opens a fresh socket.
///
/// Send errors of any kind are dropped.
pub(crate) struct Transport {
    host: String,
    port: u16,
    timeout: Duration,
    provided: Option<Arc<UdpSocket>>,
    owned: Option<Owned>,
    clock: Clock,
}

impl Transport {
    pub(crate) fn new(
        host: String, port: u16, timeout: Duration, provided: Option<Arc<UdpSocket>>, clock: Clock,
    ) -> Transport {
        Transport {
            host,
            port,
            timeout,
            provided,
            owned: None,
            clock,
        }
    }

    /// Whether the transport currently holds a socket it opened itself.
    pub(crate) fn is_open(&self) -> bool { self.owned.is_some() }

    /// Sends a single datagram to the configured target.
    pub(crate) fn send(&mut self, payload: &[u8]) {
        let target = match self.resolve() {
            Ok(target) => target,
            Err(e) => {
                debug!("dropping {} byte datagram, could not resolve {}:{}: {}", payload.len(), self.host, self.port, e);
                return;
            },
        };

        let result = match self.provided {
            Some(ref socket) => socket.send_to(payload, target),
            None => match self.acquire(target) {
                Ok(socket) => socket.send_to(payload, target),
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            debug!("dropping {} byte datagram to {}: {}", payload.len(), target, e);
        }
    }

    /// Runs any reclamation that has come due.
    pub(crate) fn upkeep(&mut self, now: Instant) {
        let expired = match self.owned {
            Some(ref mut owned) => {
                if now >= owned.close_at {
                    debug!("force closing metrics socket after {:?}", self.timeout * FORCED_CLOSE_FACTOR);
                    true
                } else if now >= owned.next_reclaim {
                    if now.saturating_duration_since(owned.last_use) > self.timeout {
                        debug!("closing idle metrics socket");
                        true
                    } else {
                        owned.next_reclaim = now + RECLAIM_INTERVAL;
                        false
                    }
                } else {
                    false
                }
            },
            None => false,
        };

        if expired {
            self.owned = None;
        }
    }

    /// The next point in time at which `upkeep` has work to do, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.owned
            .as_ref()
            .map(|owned| std::cmp::min(owned.next_reclaim, owned.close_at))
    }

    /// Closes the owned socket, if any, and cancels its timers.
    pub(crate) fn close(&mut self) {
        if self.owned.take().is_some() {
            debug!("closed metrics socket");
        }
    }

    fn acquire(&mut self, target: SocketAddr) -> io::Result<&UdpSocket> {
        let now = self.clock.now();
        let owned = match self.owned.take() {
            Some(owned) => owned,
            None => {
                let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(bind_addr)?;
                debug!("opened metrics socket on {}", socket.local_addr()?);

                Owned {
                    socket,
                    last_use: now,
                    next_reclaim: now + RECLAIM_INTERVAL,
                    close_at: now + self.timeout * FORCED_CLOSE_FACTOR,
                }
            },
        };

        // The last use is stamped before the datagram goes out.
        let owned = self.owned.insert(owned);
        owned.last_use = now;
        Ok(&owned.socket)
    }

    /// Resolves the target, preferring an IPv4 address when the host has several.
    fn resolve(&self) -> io::Result<SocketAddr> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses for host"))
    }
}
