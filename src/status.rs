//! Instrument status: the serial poll status byte and the `EVE?` event code.

use bitflags::bitflags;

use crate::{Error, Result};

bitflags! {
    /// Serial poll status byte. The low nibble identifies the event class, the high bits are
    /// shared with every Tektronix Codes and Formats instrument.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusByte: u8 {
        /// The instrument is asserting SRQ.
        const RQS      = 1<<6;
        /// The pending event is an error or warning.
        const ABNORMAL = 1<<5;
        /// An operation is in progress.
        const BUSY     = 1<<4;

        const _ = 0x0f;
    }
}

impl StatusByte {
    pub fn requested_service(self) -> bool {
        self.contains(Self::RQS)
    }

    pub fn class(self) -> u8 {
        self.bits() & 0x0f
    }
}

/// Event code of operation complete.
const EVENT_OPERATION_COMPLETE: u16 = 402;

/// Most recent event reported by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentStatus {
    /// No event is pending.
    NoEvent,
    /// Operation complete; the sweep has finished and the curve is in the display memory.
    SweepComplete,
    /// Device dependent event (7xx), e.g. a collector supply breaker trip or an open interlock;
    /// the sweep did not finish.
    SweepAborted { code: u16 },
    CommandError { code: u16 },
    ExecutionError { code: u16 },
    InternalError { code: u16 },
    /// Power on, user request and other system events.
    SystemEvent { code: u16 },
    Warning { code: u16 },
}

impl InstrumentStatus {
    pub fn code(&self) -> u16 {
        match *self {
            Self::NoEvent => 0,
            Self::SweepComplete => EVENT_OPERATION_COMPLETE,
            Self::SweepAborted { code } |
            Self::CommandError { code } |
            Self::ExecutionError { code } |
            Self::InternalError { code } |
            Self::SystemEvent { code } |
            Self::Warning { code } => code,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::SweepComplete)
    }

    /// Whether the instrument itself reports that the sweep could not be carried out.
    pub fn is_fault(&self) -> bool {
        matches!(self,
            Self::SweepAborted { .. } |
            Self::CommandError { .. } |
            Self::ExecutionError { .. } |
            Self::InternalError { .. })
    }

    fn from_code(code: u16) -> Option<Self> {
        Some(match (code / 100, code) {
            (_, 0) => Self::NoEvent,
            (_, EVENT_OPERATION_COMPLETE) => Self::SweepComplete,
            (1, code) => Self::CommandError { code },
            (2, code) => Self::ExecutionError { code },
            (3, code) => Self::InternalError { code },
            (4, code) => Self::SystemEvent { code },
            (5 | 6, code) => Self::Warning { code },
            (7, code) => Self::SweepAborted { code },
            _ => return None,
        })
    }
}

/// Decode an `EVE?` response, `EVENT <code>` with a code of up to three digits.
pub fn decode_status(response: &str) -> Result<InstrumentStatus> {
    let response = response.trim();
    let code = match response.strip_prefix("EVENT") {
        Some(rest) => rest.trim_start(),
        None => response,
    };
    let valid = !code.is_empty() && code.len() <= 3 && code.bytes().all(|b| b.is_ascii_digit());
    valid.then(|| code.parse().ok()).flatten()
        .and_then(InstrumentStatus::from_code)
        .ok_or_else(|| Error::Protocol(format!("unrecognized status {:?}", response)))
}
