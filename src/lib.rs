//! Driver for the Tektronix 371 curve tracer.
//!
//! The 371 is programmed over GPIB. A sweep is configured with a sequence of ASCII commands,
//! started with `MEA SWE`, and signals completion by asserting SRQ, a service request line that
//! is shared by every device on the bus. [`Device`] turns that shared signal into a completion
//! event for one instrument by serial polling and querying the event code before it trusts
//! the captured curve.
//!
//! Only one controller may listen for SRQ on a given bus. Another controller servicing the line
//! will make sweeps on this one fail with [`Error::SignalTimeout`].

mod config;
mod command;
mod status;
mod curve;
mod device;
pub mod sys;

use std::time::Duration;

#[derive(Debug)]
pub enum Error {
    InvalidConfiguration(String),
    Protocol(String),
    SignalTimeout(Duration),
    Instrument(InstrumentStatus),
    MalformedCurveData(String),
    ControllerBusy(State),
    InvalidState { operation: &'static str, state: State },
    Cancelled,
    Bus(std::io::Error),
}

/// Fieldless discriminant of [`Error`], recorded in [`State::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    Protocol,
    SignalTimeout,
    Instrument,
    MalformedCurveData,
    ControllerBusy,
    InvalidState,
    Cancelled,
    Bus,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::SignalTimeout(_) => ErrorKind::SignalTimeout,
            Self::Instrument(_) => ErrorKind::Instrument,
            Self::MalformedCurveData(_) => ErrorKind::MalformedCurveData,
            Self::ControllerBusy(_) => ErrorKind::ControllerBusy,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Bus(_) => ErrorKind::Bus,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration(reason) =>
                write!(f, "invalid sweep configuration: {}", reason),
            Self::Protocol(reason) =>
                write!(f, "protocol error: {}", reason),
            Self::SignalTimeout(timeout) =>
                write!(f, "no service request within {:?} (is another controller on the bus?)",
                       timeout),
            Self::Instrument(status) =>
                write!(f, "instrument reported {:?}", status),
            Self::MalformedCurveData(reason) =>
                write!(f, "malformed curve data: {}", reason),
            Self::ControllerBusy(state) =>
                write!(f, "controller busy (state {:?})", state),
            Self::InvalidState { operation, state } =>
                write!(f, "cannot {} in state {:?}", operation, state),
            Self::Cancelled =>
                write!(f, "sweep cancelled"),
            Self::Bus(io_error) =>
                write!(f, "bus I/O error: {}", io_error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::Bus(ref io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Bus(io_error) =>
                io_error,
            Error::SignalTimeout(_) =>
                Self::new(std::io::ErrorKind::TimedOut, error),
            Error::InvalidConfiguration(_) =>
                Self::new(std::io::ErrorKind::InvalidInput, error),
            Error::Protocol(_) | Error::MalformedCurveData(_) =>
                Self::new(std::io::ErrorKind::InvalidData, error),
            _ =>
                Self::other(error),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::Bus(error),
        }
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use config::{
    StepSource,
    Polarity,
    PeakPower,
    SweepMode,
    ChannelScale,
    SweepConfiguration,
};

pub use command::{
    Command,
    Query,
    Preamble,
    Identity,
    SelfTest,
    encode,
    decode_preamble,
    decode_identity,
    decode_self_test,
};

pub use status::{
    StatusByte,
    InstrumentStatus,
    decode_status,
};

pub use curve::{
    CurveBuffer,
    CurvePoint,
    decode,
    frame_len,
    write_csv,
};

pub use device::{
    Device,
    State,
    DEFAULT_SIGNAL_TIMEOUT,
};

pub use sys::Transport;

#[cfg(feature = "hardware")]
pub type VisaDevice =
    device::Device<sys::visa::VisaTransport>;
