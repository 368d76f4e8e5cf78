use std::io;
use thiserror::Error;

/// Errors surfaced by the metrics client.
///
/// Anything that goes wrong on the network is dropped instead, as metrics are best-effort.
#[derive(Debug, Error)]
pub enum Error {
    /// A metric handle was created without a name.
    #[error("a name is required")]
    MissingName,

    /// The dispatcher has stopped and can no longer answer queries.
    #[error("metrics dispatcher is not running")]
    Disconnected,

    /// The dispatcher thread could not be started.
    #[error("failed to spawn metrics dispatcher: {0}")]
    Spawn(#[source] io::Error),
}
