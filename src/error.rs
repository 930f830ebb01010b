use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds of the capture API.
#[derive(Debug, Error)]
pub enum Error {
    /// The process-default instance was used before [`init`][crate::global::init]
    /// or after [`shutdown`][crate::global::shutdown].
    #[error("input capture is not initialized")]
    NotInitialized,

    /// An option or buffer did not pass validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The OS denied access to the input device namespace.
    #[error("input device namespace denied: {0}")]
    Permission(#[source] io::Error),

    /// The multiplexer, notifier or a worker thread could not be created.
    #[error("capture resource setup failed: {0}")]
    Resource(#[source] io::Error),

    /// The feature is unavailable on this platform or build, e.g. the
    /// keymap layer without the `xkb` feature.
    #[error("not supported on this platform or build")]
    Unsupported,

    /// A registered endpoint returned a terminal read error.
    ///
    /// Never returned from a call: the endpoint is quietly dropped once the
    /// device manager deletes its node, and the condition is observable
    /// only as the subsequent absence of events from that `device_id`.
    #[error("input endpoint is gone: {0}")]
    DeviceGone(#[source] io::Error),
}

impl Error {
    /// Classifies an I/O error from capture setup.
    pub(crate) fn resource(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => Self::Permission(e),
            io::ErrorKind::Unsupported => Self::Unsupported,
            _ => Self::Resource(e),
        }
    }
}
