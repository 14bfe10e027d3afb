//! Unified error type for the provisioning peripheral.
//!
//! Each subsystem keeps its own small error enum next to the code that
//! raises it. They all convert into [`Error`], which is what the binary's
//! start-up path propagates.

use core::fmt;

use crate::adapters::wifi::ConnectivityError;
use crate::app::ports::{AuthError, BleError, ConfigError, StorageError};
use crate::protocol::codec::{EncodeError, FrameError};
use crate::protocol::session::SessionFull;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An inbound frame failed validation.
    Frame(FrameError),
    /// An outbound frame could not be built.
    Encode(EncodeError),
    /// A fragment arrived after the session filled.
    Session(SessionFull),
    /// The authorization collaborator failed.
    Auth(AuthError),
    /// A journal append failed.
    Storage(StorageError),
    /// Configuration could not be loaded, validated or saved.
    Config(ConfigError),
    /// The BLE stack failed.
    Ble(BleError),
    /// Wi-Fi join failed.
    Connectivity(ConnectivityError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Ble(e) => write!(f, "ble: {e}"),
            Self::Connectivity(e) => write!(f, "wifi: {e}"),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! funnel {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Error {
                fn from(e: $source) -> Self {
                    Self::$variant(e)
                }
            }
        )*
    };
}

funnel! {
    FrameError => Frame,
    EncodeError => Encode,
    SessionFull => Session,
    AuthError => Auth,
    StorageError => Storage,
    ConfigError => Config,
    BleError => Ble,
    ConnectivityError => Connectivity,
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
